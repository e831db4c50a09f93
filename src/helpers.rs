//! Frame post-processing helpers.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::frame::{Frame, FrameMode};

const MARKER: u8 = 0xff;
/// Start of image.
const SOI: u8 = 0xd8;
/// End of image.
const EOI: u8 = 0xd9;
/// Start of scan; entropy-coded data follows.
const SOS: u8 = 0xda;
/// Comment segment.
const COM: u8 = 0xfe;
/// Temporary marker, standalone.
const TEM: u8 = 0x01;

/// Strip comment segments and trailing bytes from a JPEG frame.
///
/// Some cameras append a comment block or padding behind the image
/// data. This walks the segment markers up to the start of scan,
/// removes COM segments and truncates everything after the end of
/// image marker. Frames that are not JPEG or whose bytes do not parse
/// as JPEG are left unchanged.
pub fn remove_jpeg_comment_block(frame: &mut Frame) {
    if frame.mode != FrameMode::Jpeg {
        return;
    }
    if frame.image.get(..2) != Some([MARKER, SOI].as_slice()) {
        return;
    }
    let mut pos = 2_usize;
    loop {
        let Some(&marker) = frame.image.get(pos) else {
            return;
        };
        if marker != MARKER {
            // lost marker sync, leave the frame as it is
            return;
        }
        let Some(&kind) = frame.image.get(pos + 1) else {
            return;
        };
        match kind {
            SOS => break,
            EOI => {
                frame.image.truncate(pos + 2);
                return;
            }
            COM => {
                let Some(len) = segment_length(&frame.image, pos + 2) else {
                    return;
                };
                let end = pos + 2 + len;
                if end > frame.image.len() {
                    return;
                }
                frame.image.drain(pos..end);
            }
            TEM | 0xd0..=0xd7 => pos += 2,
            _ => {
                let Some(len) = segment_length(&frame.image, pos + 2) else {
                    return;
                };
                pos = pos + 2 + len;
            }
        }
    }
    // past the start of scan: drop anything after the end of image marker
    if let Some(end) = find_past_eoi(&frame.image, pos + 2) {
        frame.image.truncate(end);
    }
}

/// Write a frame's raw image bytes to `path`.
pub fn store_frame_to_file(frame: &Frame, path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(&frame.image)
}

/// Big-endian segment length at `pos`, as encoded in JPEG headers.
fn segment_length(data: &[u8], pos: usize) -> Option<usize> {
    let hi = *data.get(pos)?;
    let lo = *data.get(pos + 1)?;
    let len = usize::from(hi) << 8 | usize::from(lo);
    // the length field includes its own two bytes
    (len >= 2).then_some(len)
}

/// Byte offset just past the EOI marker, scanning from `from`.
fn find_past_eoi(data: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while pos + 1 < data.len() {
        if data.get(pos) == Some(&MARKER) && data.get(pos + 1) == Some(&EOI) {
            return Some(pos + 2);
        }
        pos += 1;
    }
    None
}
