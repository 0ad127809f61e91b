//! Bounded analysis job queue with a status table and per-job cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use swinglab_models::{JobStatus, JobStatusEntry};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};
use crate::job::{AnalysisJob, JobRequest};
use crate::metrics::record_enqueued;

struct JobRecord {
    entry: JobStatusEntry,
    cancel: watch::Sender<bool>,
}

/// Status of every job seen by this process.
#[derive(Clone, Default)]
pub struct JobTable {
    jobs: Arc<Mutex<HashMap<String, JobRecord>>>,
}

impl JobTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, entry: JobStatusEntry) {
        let (cancel, _) = watch::channel(false);
        self.lock().insert(entry.id.clone(), JobRecord { entry, cancel });
    }

    fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    pub fn get(&self, id: &str) -> Option<JobStatusEntry> {
        self.lock().get(id).map(|r| r.entry.clone())
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<JobStatusEntry> {
        let mut entries: Vec<JobStatusEntry> = self.lock().values().map(|r| r.entry.clone()).collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    /// Move a job to `status`. Terminal jobs are left alone; returns whether
    /// the transition happened.
    pub fn set_status(&self, id: &str, status: JobStatus, error: Option<String>) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(record) if !record.entry.status.is_terminal() => {
                record.entry.transition(status, error);
                debug!(job_id = %id, status = %status, "Job status changed");
                true
            }
            _ => false,
        }
    }

    /// Request cancellation. Running jobs observe it through [`Self::cancel_signal`].
    pub fn cancel(&self, id: &str) -> WorkerResult<JobStatusEntry> {
        let mut jobs = self.lock();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| WorkerError::JobNotFound(id.to_string()))?;

        if !record.entry.status.is_terminal() {
            record.cancel.send_replace(true);
            record.entry.transition(JobStatus::Cancelled, None);
            info!(job_id = %id, "Job cancelled");
        }
        Ok(record.entry.clone())
    }

    pub fn cancel_signal(&self, id: &str) -> Option<watch::Receiver<bool>> {
        self.lock().get(id).map(|r| r.cancel.subscribe())
    }

    pub fn is_cancelled(&self, id: &str) -> bool {
        self.lock()
            .get(id)
            .map_or(false, |r| r.entry.status == JobStatus::Cancelled)
    }
}

/// Producer side. The executor stops once every `JobQueue` clone is dropped
/// and the backlog is drained.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<AnalysisJob>,
    table: JobTable,
}

/// Consumer side, owned by the executor.
pub struct JobReceiver {
    inner: mpsc::Receiver<AnalysisJob>,
}

impl JobReceiver {
    pub async fn recv(&mut self) -> Option<AnalysisJob> {
        self.inner.recv().await
    }
}

impl JobQueue {
    pub fn new(capacity: usize) -> (Self, JobReceiver) {
        let (sender, inner) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                table: JobTable::default(),
            },
            JobReceiver { inner },
        )
    }

    pub fn table(&self) -> JobTable {
        self.table.clone()
    }

    /// Validate and enqueue. Fails fast with `QueueFull` instead of waiting.
    pub fn enqueue(&self, request: JobRequest) -> WorkerResult<JobStatusEntry> {
        request.validate()?;

        let id = Uuid::new_v4().to_string();
        let entry = JobStatusEntry::new(
            id.clone(),
            request.session_id.clone(),
            request.video_url.clone(),
            request.video_path.clone(),
        );
        self.table.insert(entry.clone());

        let job = AnalysisJob {
            id: id.clone(),
            request,
        };
        if let Err(e) = self.sender.try_send(job) {
            self.table.remove(&id);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => WorkerError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => WorkerError::QueueClosed,
            });
        }

        record_enqueued();
        info!(job_id = %id, session_id = ?entry.session_id, "Job queued");
        Ok(entry)
    }

    pub fn status(&self, id: &str) -> Option<JobStatusEntry> {
        self.table.get(id)
    }

    pub fn list(&self) -> Vec<JobStatusEntry> {
        self.table.list()
    }

    pub fn cancel(&self, id: &str) -> WorkerResult<JobStatusEntry> {
        self.table.cancel(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest {
            session_id: Some("s1".to_string()),
            video_path: Some("u/a.mp4".to_string()),
            callback_url: "http://cb".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_receive() {
        let (queue, mut rx) = JobQueue::new(4);
        let entry = queue.enqueue(request()).unwrap();
        assert_eq!(entry.status, JobStatus::Queued);
        assert_eq!(entry.session_id.as_deref(), Some("s1"));

        let job = rx.recv().await.unwrap();
        assert_eq!(job.id, entry.id);
        assert_eq!(queue.status(&entry.id).unwrap().status, JobStatus::Queued);
    }

    #[test]
    fn test_invalid_request_not_recorded() {
        let (queue, _rx) = JobQueue::new(4);
        let err = queue.enqueue(JobRequest::default()).unwrap_err();
        assert!(matches!(err, WorkerError::InvalidJob(_)));
        assert!(queue.list().is_empty());
    }

    #[test]
    fn test_full_queue_rejects() {
        let (queue, _rx) = JobQueue::new(1);
        queue.enqueue(request()).unwrap();
        assert!(matches!(queue.enqueue(request()), Err(WorkerError::QueueFull)));
        assert_eq!(queue.list().len(), 1);
    }

    #[test]
    fn test_closed_queue_rejects() {
        let (queue, rx) = JobQueue::new(1);
        drop(rx);
        assert!(matches!(queue.enqueue(request()), Err(WorkerError::QueueClosed)));
    }

    #[test]
    fn test_status_transitions_stop_at_terminal() {
        let (queue, _rx) = JobQueue::new(4);
        let id = queue.enqueue(request()).unwrap().id;
        let table = queue.table();

        assert!(table.set_status(&id, JobStatus::Downloading, None));
        assert!(table.set_status(&id, JobStatus::Failed, Some("boom".to_string())));
        assert!(!table.set_status(&id, JobStatus::Completed, None));

        let entry = queue.status(&id).unwrap();
        assert_eq!(entry.status, JobStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some("boom"));
        assert!(!table.set_status("nope", JobStatus::Processing, None));
    }

    #[test]
    fn test_cancel_signals_and_is_idempotent() {
        let (queue, _rx) = JobQueue::new(4);
        let id = queue.enqueue(request()).unwrap().id;
        let table = queue.table();
        let signal = table.cancel_signal(&id).unwrap();

        let entry = queue.cancel(&id).unwrap();
        assert_eq!(entry.status, JobStatus::Cancelled);
        assert!(*signal.borrow());
        assert!(table.is_cancelled(&id));

        assert_eq!(queue.cancel(&id).unwrap().status, JobStatus::Cancelled);
        assert!(matches!(queue.cancel("missing"), Err(WorkerError::JobNotFound(_))));
    }

    #[test]
    fn test_list_oldest_first() {
        let (queue, _rx) = JobQueue::new(4);
        let a = queue.enqueue(request()).unwrap();
        let b = queue.enqueue(request()).unwrap();
        let listed = queue.list();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at <= listed[1].created_at);
        assert!(listed.iter().any(|e| e.id == a.id));
        assert!(listed.iter().any(|e| e.id == b.id));
    }
}
