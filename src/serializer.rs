use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StoreError};
use crate::registry::TaskRegistry;

/// Version tag written into every stored payload.
const FORMAT_VERSION: u32 = 1;

/// Defines when the scheduler should fire a job.
///
/// Next-fire computation belongs to the scheduler; the store only persists
/// the definition and round-trips it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Cron expression, evaluated by the scheduler.
    Cron { expression: String },

    /// Repeat with a fixed interval in seconds.
    Interval { every_secs: u64 },

    /// Single fire at an absolute UTC instant.
    Date { run_at: NaiveDateTime },
}

/// A schedulable job as the scheduler sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Caller-assigned identifier, immutable once created.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Registry name of the callable to run.
    pub task: String,
    /// Arbitrary JSON payload forwarded to the callable.
    pub args: serde_json::Value,
    pub trigger: Trigger,
    /// Seconds a late fire still counts as valid; None fires no matter how late.
    pub misfire_grace_secs: Option<u32>,
    /// Maximum concurrently running instances of this job.
    pub max_instances: u32,
    /// Next planned fire. None while the job is paused.
    pub next_run_time: Option<NaiveDateTime>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    v: u32,
    job: JobSpec,
}

/// Converts job specifications to and from the stored payload format.
///
/// The payload is a versioned JSON envelope. Everything between the envelope
/// and the scheduler is opaque to the record store.
#[derive(Clone)]
pub struct JobSerializer {
    registry: Arc<TaskRegistry>,
}

impl JobSerializer {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    pub fn serialize(&self, spec: &JobSpec) -> Result<String> {
        let envelope = Envelope {
            v: FORMAT_VERSION,
            job: spec.clone(),
        };

        serde_json::to_string(&envelope).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Turns a stored payload back into a runnable job.
    ///
    /// Fails when the payload is malformed, carries an unknown envelope
    /// version, or names a task that is no longer registered.
    pub fn deserialize(&self, raw: &str) -> Result<JobSpec> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|e| StoreError::Deserialization(e.to_string()))?;

        if envelope.v != FORMAT_VERSION {
            return Err(StoreError::Deserialization(format!(
                "unsupported payload version {}",
                envelope.v
            )));
        }

        let job = envelope.job;

        if !self.registry.contains(&job.task) {
            return Err(StoreError::Deserialization(format!(
                "task {:?} is not registered",
                job.task
            )));
        }

        Ok(job)
    }
}
