//! In-memory job registry
//!
//! Map from job id to progress record behind one lock; the background
//! runner is the sole writer for a job, polling clients read snapshots.
//! `update` and `read` exclude each other so clients never observe a torn
//! record. The guard is never held across an await.
//!
//! Known gap, kept deliberately: there is no job expiry, so a long-running
//! process accumulates terminal job records. Inventing a retention policy
//! would change observable polling semantics.

use crate::models::{Job, JobStatus};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;
use uuid::Uuid;

/// Shared registry of job progress records
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job
    pub fn create(&self, job_id: Uuid) {
        let mut jobs = self.jobs.write().expect("job registry lock poisoned");
        jobs.insert(job_id, Job::new(job_id));
    }

    /// Apply a mutation to a job record.
    ///
    /// Silently ignores unknown ids (the job may never have been created if
    /// intake failed late). Terminal records are frozen: a mutation against
    /// one is dropped with a warning. Progress never decreases.
    pub fn update<F>(&self, job_id: Uuid, mutate: F)
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().expect("job registry lock poisoned");
        let Some(job) = jobs.get_mut(&job_id) else {
            warn!(job_id = %job_id, "Update for unknown job dropped");
            return;
        };
        if job.is_terminal() {
            warn!(job_id = %job_id, status = ?job.status, "Update to terminal job dropped");
            return;
        }

        let floor = job.progress;
        mutate(job);
        if job.progress < floor {
            job.progress = floor;
        }
        job.progress = job.progress.clamp(0.0, 1.0);
        if job.is_terminal() {
            job.progress = 1.0;
            job.ended_at = Some(chrono::Utc::now());
        }
    }

    /// Snapshot a job record for a polling client
    pub fn snapshot(&self, job_id: Uuid) -> Option<Job> {
        let jobs = self.jobs.read().expect("job registry lock poisoned");
        jobs.get(&job_id).cloned()
    }

    /// Number of jobs currently tracked
    pub fn len(&self) -> usize {
        self.jobs.read().expect("job registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_snapshot() {
        let registry = JobRegistry::new();
        let id = Uuid::new_v4();
        registry.create(id);

        let job = registry.snapshot(id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(registry.snapshot(Uuid::new_v4()).is_none());
    }

    #[test]
    fn progress_is_monotonic() {
        let registry = JobRegistry::new();
        let id = Uuid::new_v4();
        registry.create(id);

        registry.update(id, |job| job.progress = 0.5);
        // An attempted regression is clamped to the floor
        registry.update(id, |job| job.progress = 0.2);
        assert_eq!(registry.snapshot(id).unwrap().progress, 0.5);

        registry.update(id, |job| job.progress = 0.9);
        assert_eq!(registry.snapshot(id).unwrap().progress, 0.9);
    }

    #[test]
    fn terminal_jobs_are_frozen() {
        let registry = JobRegistry::new();
        let id = Uuid::new_v4();
        registry.create(id);

        registry.update(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some("boom".to_string());
        });
        let failed = registry.snapshot(id).unwrap();
        assert_eq!(failed.progress, 1.0);
        assert!(failed.ended_at.is_some());

        // Any later mutation is dropped
        registry.update(id, |job| {
            job.status = JobStatus::Completed;
            job.message = "resurrected".to_string();
        });
        let still_failed = registry.snapshot(id).unwrap();
        assert_eq!(still_failed.status, JobStatus::Failed);
        assert_eq!(still_failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn terminal_progress_jumps_to_one() {
        let registry = JobRegistry::new();
        let id = Uuid::new_v4();
        registry.create(id);
        registry.update(id, |job| {
            job.progress = 0.92;
            job.status = JobStatus::Completed;
        });
        assert_eq!(registry.snapshot(id).unwrap().progress, 1.0);
    }
}
