//! Demo binary: open a camera, grab a few frames and report.

use std::path::Path;
use std::time::Duration;

use usb_cam_capture::controls::DoubleAttrib;
use usb_cam_capture::{
    AccessMode, CamInfo, CameraInterface, Frame, FrameMode, FrameSettings, FrameSize, GrabMode,
    UsbCamera,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Usage: usb-cam-capture [device] [frame-count] [output-file]
fn run() -> usb_cam_capture::Result<()> {
    let mut args = std::env::args().skip(1);
    let device = args.next().unwrap_or_else(|| "/dev/video0".to_owned());
    let count: u32 = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(5);
    let output = args.next();

    let mut camera: UsbCamera = UsbCamera::new(&device);
    let mut cameras = Vec::new();
    camera.list_cameras(&mut cameras);
    for cam in &cameras {
        println!("camera {}: {}", cam.unique_id, cam.device);
    }

    camera.open(&CamInfo::new(&device), AccessMode::Master)?;
    if let Some(info) = camera.camera_info() {
        println!(
            "opened {} ({})",
            info.device,
            info.display_name.as_deref().unwrap_or("unnamed")
        );
    }

    camera.set_frame_settings(FrameSettings::new(
        FrameSize::new(640, 480),
        FrameMode::Jpeg,
        3,
    ))?;
    let settings = camera.frame_settings();
    println!(
        "capturing {}x{}",
        settings.size.width, settings.size.height
    );

    camera.grab(GrabMode::SingleFrame, 4)?;
    let mut frame = Frame::new();
    let mut last = Frame::new();
    for index in 0..count {
        if camera.retrieve_frame(&mut frame, Duration::from_secs(2)) {
            println!("frame {index}: {} bytes", frame.len());
            last = frame.clone();
        } else {
            println!("frame {index}: retrieve failed");
        }
    }
    if let Ok(rate) = camera.double_attrib(DoubleAttrib::StatFrameRate) {
        println!("measured rate: {rate:.1} fps");
    }
    camera.grab(GrabMode::Stop, 0)?;

    if let Some(report) = camera.camera_information() {
        println!("{report}");
    }
    if let Some(path) = output {
        if camera.store_frame(&last, Path::new(&path)) {
            println!("stored the last frame to {path}");
        }
    }
    camera.close();
    Ok(())
}
