use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::pipeline::frame_executor::{FrameExecutor, FrameTask, SendError};

/// Jobs buffered per worker.
const QUEUE_DEPTH_PER_THREAD: usize = 2;

/// Spreads frames over `threads` scoped workers fed by a bounded queue.
///
/// Frames finish in no particular order. On the first error the queue stops
/// being fed, workers drop what is left, and that error is returned once
/// every worker has exited.
pub struct ThreadedFrameExecutor {
    threads: usize,
}

impl ThreadedFrameExecutor {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl FrameExecutor for ThreadedFrameExecutor {
    fn execute(&self, frame_paths: &[PathBuf], task: &FrameTask<'_>) -> Result<(), SendError> {
        let workers = self.threads.min(frame_paths.len());
        if workers == 0 {
            return Ok(());
        }

        let (job_tx, job_rx) =
            crossbeam_channel::bounded::<(usize, &PathBuf)>(workers * QUEUE_DEPTH_PER_THREAD);
        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<SendError>> = Mutex::new(None);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let failed = &failed;
                let first_error = &first_error;
                scope.spawn(move || {
                    for (position, path) in job_rx {
                        if failed.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = task(position, path) {
                            failed.store(true, Ordering::Relaxed);
                            let mut slot = first_error
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                            slot.get_or_insert(e);
                            break;
                        }
                    }
                });
            }
            drop(job_rx);

            for job in frame_paths.iter().enumerate() {
                if failed.load(Ordering::Relaxed) || job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);
        });

        match first_error
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
        {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
