//! Line-delimited JSON control commands.
//!
//! Each stdin line is one command; each reply is one JSON line on stdout.
//!
//! ```text
//! {"command":"enqueue","callbackUrl":"...","videoPath":"u1/a.mp4","authHeader":"Bearer ..."}
//! {"command":"status","jobId":"..."}
//! {"command":"cancel","jobId":"..."}
//! {"command":"list"}
//! ```

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::WorkerError;
use crate::job::JobRequest;
use crate::queue::JobQueue;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WorkerCommand {
    Enqueue(JobRequest),
    Cancel {
        #[serde(rename = "jobId")]
        job_id: String,
    },
    Status {
        #[serde(rename = "jobId")]
        job_id: String,
    },
    List,
}

/// Parse and run one command line.
pub fn handle_line(queue: &JobQueue, line: &str) -> Value {
    match serde_json::from_str::<WorkerCommand>(line) {
        Ok(command) => handle_command(queue, command),
        Err(e) => {
            warn!(error = %e, "Unparseable command");
            error_response(format!("Invalid command: {e}"))
        }
    }
}

pub fn handle_command(queue: &JobQueue, command: WorkerCommand) -> Value {
    match command {
        WorkerCommand::Enqueue(request) => match queue.enqueue(request) {
            Ok(entry) => json!({ "ok": true, "job": entry }),
            Err(e) => error_response(e.to_string()),
        },
        WorkerCommand::Cancel { job_id } => match queue.cancel(&job_id) {
            Ok(entry) => json!({ "ok": true, "job": entry }),
            Err(e) => error_response(e.to_string()),
        },
        WorkerCommand::Status { job_id } => match queue.status(&job_id) {
            Some(entry) => json!({ "ok": true, "job": entry }),
            None => error_response(WorkerError::JobNotFound(job_id).to_string()),
        },
        WorkerCommand::List => json!({ "ok": true, "jobs": queue.list() }),
    }
}

fn error_response(error: String) -> Value {
    json!({ "ok": false, "error": error })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENQUEUE: &str =
        r#"{"command":"enqueue","sessionId":"s1","videoPath":"u1/a.mp4","callbackUrl":"http://localhost/cb"}"#;

    #[test]
    fn test_enqueue_then_status() {
        let (queue, _rx) = JobQueue::new(4);
        let reply = handle_line(&queue, ENQUEUE);
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["job"]["status"], "queued");
        assert_eq!(reply["job"]["sessionId"], "s1");

        let id = reply["job"]["id"].as_str().unwrap().to_string();
        let status = handle_line(&queue, &format!(r#"{{"command":"status","jobId":"{id}"}}"#));
        assert_eq!(status["job"]["id"], id.as_str());

        let list = handle_line(&queue, r#"{"command":"list"}"#);
        assert_eq!(list["jobs"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_command() {
        let (queue, _rx) = JobQueue::new(4);
        let id = handle_line(&queue, ENQUEUE)["job"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let reply = handle_line(&queue, &format!(r#"{{"command":"cancel","jobId":"{id}"}}"#));
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["job"]["status"], "cancelled");
    }

    #[test]
    fn test_errors_are_reported() {
        let (queue, _rx) = JobQueue::new(4);

        let missing = handle_line(&queue, r#"{"command":"status","jobId":"nope"}"#);
        assert_eq!(missing["ok"], false);
        assert_eq!(missing["error"], "Job not found: nope");

        let invalid = handle_line(&queue, r#"{"command":"enqueue","videoPath":"a.mp4"}"#);
        assert_eq!(invalid["ok"], false);

        let garbage = handle_line(&queue, "not json");
        assert!(garbage["error"].as_str().unwrap().starts_with("Invalid command"));

        let unknown = handle_line(&queue, r#"{"command":"restart"}"#);
        assert_eq!(unknown["ok"], false);
    }
}
