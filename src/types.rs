//! Wire types shared by every command.
//!
//! These are the only response shapes the client itself needs to
//! understand: the error body, the async-job status record and the
//! acknowledgement returned when a command starts a job.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of a non-2xx response.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub errorcode: i64,
    #[serde(default)]
    pub cserrorcode: i64,
    #[serde(default)]
    pub errortext: String,
}

/// State of a server-side async job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

impl JobStatus {
    /// Map the numeric `jobstatus` field: 1 succeeded, 2 failed, anything
    /// else is still running.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => JobStatus::Success,
            2 => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(JobStatus::from_code(i64::deserialize(deserializer)?))
    }
}

/// How `jobresult` should be read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobResultKind {
    Text,
    #[default]
    Object,
    Other(String),
}

impl<'de> Deserialize<'de> for JobResultKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = String::deserialize(deserializer)?;
        Ok(match kind.as_str() {
            "text" => JobResultKind::Text,
            "object" => JobResultKind::Object,
            _ => JobResultKind::Other(kind),
        })
    }
}

/// Payload of `queryAsyncJobResult` / `queryExAsyncJobResult`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AsyncJob {
    #[serde(default)]
    pub jobid: String,
    #[serde(rename = "jobstatus")]
    pub status: JobStatus,
    #[serde(rename = "jobresulttype", default)]
    pub result_kind: JobResultKind,
    #[serde(rename = "jobresult", default)]
    pub result: Value,
    #[serde(default)]
    pub jobresultcode: Option<i64>,
    #[serde(default)]
    pub jobprocstatus: Option<i64>,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

/// Acknowledgement returned by a command that started an async job.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct JobAccepted {
    pub jobid: String,
    /// Id of the resource the job acts on, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_status_codes() {
        assert_eq!(JobStatus::from_code(0), JobStatus::Pending);
        assert_eq!(JobStatus::from_code(1), JobStatus::Success);
        assert_eq!(JobStatus::from_code(2), JobStatus::Failed);
        assert_eq!(JobStatus::from_code(7), JobStatus::Pending);
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_async_job_deserialization() {
        let job: AsyncJob = serde_json::from_value(json!({
            "jobid": "a1",
            "jobstatus": 2,
            "jobresulttype": "text",
            "jobresult": "volume is busy",
            "jobresultcode": 530
        }))
        .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.result_kind, JobResultKind::Text);
        assert_eq!(job.result, json!("volume is busy"));
        assert_eq!(job.jobresultcode, Some(530));
    }

    #[test]
    fn test_pending_job_without_result() {
        let job: AsyncJob = serde_json::from_value(json!({"jobid": "a1", "jobstatus": 0})).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.result, Value::Null);
    }

    #[test]
    fn test_error_body_defaults() {
        let body: ApiErrorBody = serde_json::from_value(json!({"errortext": "boom"})).unwrap();
        assert_eq!(body.errorcode, 0);
        assert_eq!(body.errortext, "boom");
    }
}
