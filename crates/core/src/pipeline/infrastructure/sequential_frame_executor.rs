use std::path::PathBuf;

use crate::pipeline::frame_executor::{FrameExecutor, FrameTask, SendError};

/// Runs every frame in order on the calling thread.
pub struct SequentialFrameExecutor;

impl SequentialFrameExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SequentialFrameExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameExecutor for SequentialFrameExecutor {
    fn execute(&self, frame_paths: &[PathBuf], task: &FrameTask<'_>) -> Result<(), SendError> {
        for (position, path) in frame_paths.iter().enumerate() {
            task(position, path)?;
        }
        Ok(())
    }
}
