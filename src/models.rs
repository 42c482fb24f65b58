// src/models.rs

use crate::schema::{job_executions, scheduled_jobs};
use chrono::NaiveDateTime;

/// A persisted job definition.
///
/// `job_state` is an opaque payload owned by the serializer; the store never
/// looks inside it. `next_run_time` is NULL exactly while the job is paused
/// or has no remaining fire time.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = scheduled_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobRecord {
    pub id: String,
    pub alias: String,
    pub next_run_time: Option<NaiveDateTime>,
    pub job_state: String,
}

#[derive(Insertable)]
#[diesel(table_name = scheduled_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewJobRecord<'a> {
    pub id: &'a str,
    pub alias: &'a str,
    pub next_run_time: Option<NaiveDateTime>,
    pub job_state: &'a str,
}

/// One row per scheduled fire of a job, keyed by `(job_id, run_time)`.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = job_executions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExecutionRecord {
    pub id: String,
    pub job_id: String,
    pub run_time: NaiveDateTime,
    pub status: String,
    pub finished_at: Option<NaiveDateTime>,
    pub duration_secs: Option<f64>,
    pub exception: Option<String>,
    pub traceback: Option<String>,
}

/// Outcome reported for one scheduled fire of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Handed to the executor.
    Sent,
    /// Skipped because the maximum number of concurrent instances was reached.
    MaxInstances,
    /// The scheduled time passed before the scheduler could dispatch the job.
    Missed,
    /// The callable finished successfully.
    Success,
    /// The callable returned an error.
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Sent => "sent",
            ExecutionStatus::MaxInstances => "max_instances",
            ExecutionStatus::Missed => "missed",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
        }
    }

    /// Terminal statuses carry a finish time and duration.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Error)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(ExecutionStatus::Sent),
            "max_instances" => Ok(ExecutionStatus::MaxInstances),
            "missed" => Ok(ExecutionStatus::Missed),
            "success" => Ok(ExecutionStatus::Success),
            "error" => Ok(ExecutionStatus::Error),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_status_round_trips_through_strings() {
        let statuses = [
            ExecutionStatus::Sent,
            ExecutionStatus::MaxInstances,
            ExecutionStatus::Missed,
            ExecutionStatus::Success,
            ExecutionStatus::Error,
        ];

        for status in statuses {
            assert_eq!(status.as_str().parse::<ExecutionStatus>(), Ok(status));
        }
    }

    #[test]
    fn only_success_and_error_are_terminal() {
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Error.is_terminal());
        assert!(!ExecutionStatus::Sent.is_terminal());
        assert!(!ExecutionStatus::MaxInstances.is_terminal());
        assert!(!ExecutionStatus::Missed.is_terminal());
    }
}
