use std::path::{Path, PathBuf};

/// Error type that can cross worker threads.
pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Work run for each frame: `(position, path)`.
pub type FrameTask<'a> = dyn Fn(usize, &Path) -> Result<(), SendError> + Sync + 'a;

/// Decides how the per-frame task is scheduled over a frame sequence.
///
/// Implementations call `task` exactly once per path until the first error,
/// and return that error.
pub trait FrameExecutor: Send + Sync {
    fn execute(&self, frame_paths: &[PathBuf], task: &FrameTask<'_>) -> Result<(), SendError>;
}
