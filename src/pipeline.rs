//! Placeholder for the streaming pipeline backend.

use std::os::unix::io::RawFd;

/// Handle to a streaming pipeline serving the pipeline camera mode.
///
/// No pipeline is wired up in this revision; the type keeps the dual
/// backend shape of the controller and answers the descriptor query for
/// consumers that poll.
#[derive(Debug)]
pub struct PipelineBackend {
    device: String,
    fd: Option<RawFd>,
}

impl PipelineBackend {
    /// Create a pipeline handle for `device` with no descriptor exposed.
    #[must_use]
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_owned(),
            fd: None,
        }
    }

    /// Device node the pipeline reads from.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Descriptor a consumer can poll for ready frames, when exposed.
    #[must_use]
    pub const fn file_descriptor(&self) -> Option<RawFd> {
        self.fd
    }
}
