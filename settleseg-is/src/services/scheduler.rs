//! Background job scheduler
//!
//! Bounds how many inference jobs run at once with a semaphore. Each job is
//! spawned onto the runtime and its handle is retained so tests (and
//! shutdown paths) can wait for a specific job instead of sleeping.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct JobScheduler {
    permits: Arc<Semaphore>,
    handles: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl JobScheduler {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a job. The concurrency permit is acquired inside the task, so
    /// intake never blocks; excess jobs queue in Pending until a slot frees.
    pub fn spawn<F>(&self, job_id: Uuid, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handles = Arc::clone(&self.handles);
        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(job_id = %job_id, "Scheduler closed, dropping job");
                    return;
                }
            };
            debug!(job_id = %job_id, "Job slot acquired");
            work.await;
            handles.lock().expect("scheduler lock poisoned").remove(&job_id);
        });
        self.handles
            .lock()
            .expect("scheduler lock poisoned")
            .insert(job_id, handle);
    }

    /// Wait for one job's task to finish. Returns immediately when the job
    /// is unknown or already reaped.
    pub async fn wait(&self, job_id: Uuid) {
        let handle = self
            .handles
            .lock()
            .expect("scheduler lock poisoned")
            .remove(&job_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(job_id = %job_id, error = %e, "Job task aborted");
            }
        }
    }

    /// Number of tasks not yet reaped
    pub fn in_flight(&self) -> usize {
        self.handles.lock().expect("scheduler lock poisoned").len()
    }
}
