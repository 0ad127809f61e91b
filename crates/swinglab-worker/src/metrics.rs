//! Worker metrics.

use metrics::{counter, histogram};

pub mod names {
    pub const JOBS_ENQUEUED: &str = "swinglab_jobs_enqueued_total";
    pub const JOBS_COMPLETED: &str = "swinglab_jobs_completed_total";
    pub const JOBS_FAILED: &str = "swinglab_jobs_failed_total";
    pub const JOB_DURATION: &str = "swinglab_job_duration_seconds";
    pub const DOWNLOAD_BYTES: &str = "swinglab_download_bytes";
}

pub fn record_enqueued() {
    counter!(names::JOBS_ENQUEUED).increment(1);
}

pub fn record_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED).increment(1);
    histogram!(names::JOB_DURATION).record(duration_secs);
}

/// `reason` is a short label such as `timeout` or `callback`.
pub fn record_failed(reason: &'static str) {
    counter!(names::JOBS_FAILED, "reason" => reason).increment(1);
}

pub fn record_download(bytes: usize) {
    histogram!(names::DOWNLOAD_BYTES).record(bytes as f64);
}
