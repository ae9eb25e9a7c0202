use crate::generation::GenerationError;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc,
};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<(), GenerationError> {
        if self.is_cancelled() {
            return Err(GenerationError::Cancelled(stage));
        }
        Ok(())
    }

    /// Run `job` on a worker thread and wait for it unless cancelled first.
    ///
    /// Cancellation abandons the job: the worker keeps running to completion
    /// and its result is dropped.
    pub fn run_abandonable<T, F>(&self, stage: &'static str, job: F) -> Result<T, GenerationError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.check_cancelled(stage)?;
        let (tx, rx) = mpsc::channel::<T>();
        thread::Builder::new()
            .name(format!("kotonoha-{stage}"))
            .spawn(move || {
                let _ = tx.send(job());
            })
            .map_err(|err| GenerationError::Transport(format!("failed to spawn worker: {err}")))?;

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(value) => return Ok(value),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if self.is_cancelled() {
                        debug!(stage, "Abandoning in-flight request");
                        return Err(GenerationError::Cancelled(stage));
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    warn!(stage, "Worker exited without a result");
                    return Err(GenerationError::Transport(format!(
                        "worker for {stage} exited without a result"
                    )));
                }
            }
        }
    }
}
