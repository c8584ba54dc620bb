//! Host affinity executor
//!
//! Work that touches host-owned state runs on one dedicated thread, one job
//! at a time. Callers submit a closure and await its result, so from the
//! dispatcher's point of view the call is synchronous.

use crate::error::{McpError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-worker job queue standing in for the host's main thread
pub struct AffinityExecutor {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AffinityExecutor {
    /// Start the worker thread
    pub fn start(name: &str) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("Affinity worker started");
                while let Some(job) = receiver.blocking_recv() {
                    job();
                }
                debug!("Affinity worker stopped");
            })?;

        info!(thread = name, "Affinity executor started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Run `f` on the worker thread and wait for it to finish
    ///
    /// A panic inside `f` is caught on the worker and reported as
    /// [`McpError::Handler`]; the worker keeps serving later jobs.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();

        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f));
            // The caller may have gone away; nothing to report to then.
            let _ = reply.send(outcome);
        });

        {
            let sender = self
                .sender
                .lock()
                .map_err(|_| McpError::Internal("affinity executor lock poisoned".to_string()))?;
            let sender = sender
                .as_ref()
                .ok_or_else(|| McpError::Internal("affinity executor is shut down".to_string()))?;
            sender
                .send(job)
                .map_err(|_| McpError::Internal("affinity worker has exited".to_string()))?;
        }

        match result.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Host job panicked");
                Err(McpError::Handler(message))
            }
            Err(_) => Err(McpError::Internal(
                "affinity worker dropped the job".to_string(),
            )),
        }
    }

    /// Stop accepting work, drain the queue and join the worker
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("Affinity worker terminated abnormally");
            }
            info!("Affinity executor stopped");
        }
    }
}

impl Drop for AffinityExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_on_dedicated_thread() {
        let executor = AffinityExecutor::start("host-test").unwrap();

        let name = executor
            .run(|| thread::current().name().map(String::from))
            .await
            .unwrap();

        assert_eq!(name.as_deref(), Some("host-test"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_never_overlap() {
        let executor = Arc::new(AffinityExecutor::start("host-serial").unwrap());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let executor = executor.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            tasks.push(tokio::spawn(async move {
                executor
                    .run(move || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(2));
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_worker_survives() {
        let executor = AffinityExecutor::start("host-panic").unwrap();

        let err = executor
            .run(|| -> u32 { panic!("document vanished") })
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Handler(msg) if msg == "document vanished"));

        assert_eq!(executor.run(|| 41 + 1).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_run_after_shutdown_fails() {
        let executor = AffinityExecutor::start("host-stopped").unwrap();
        executor.shutdown();

        let err = executor.run(|| ()).await.unwrap_err();
        assert!(matches!(err, McpError::Internal(_)));
    }
}
