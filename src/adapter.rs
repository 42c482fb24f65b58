use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use diesel::sqlite::SqliteConnection;

use crate::errors::{Result, StoreError};
use crate::executions;
use crate::job_store;
use crate::models::{ExecutionRecord, ExecutionStatus, JobRecord, NewJobRecord};
use crate::serializer::{JobSerializer, JobSpec};

/// The scheduler-facing job store contract.
pub trait JobStore {
    /// Persists a new job. `Conflict` if the id already exists in this alias.
    fn add_job(&self, spec: &JobSpec) -> Result<()>;

    /// Replaces a job's payload and next run time. `NotFound` if absent.
    fn update_job(&self, spec: &JobSpec) -> Result<()>;

    /// Removes a job and its execution history. `NotFound` if absent, which
    /// the scheduler tolerates during shutdown races.
    fn remove_job(&self, id: &str) -> Result<()>;

    /// Removes every job in this store's alias.
    fn remove_all_jobs(&self) -> Result<()>;

    fn lookup_job(&self, id: &str) -> Result<JobSpec>;

    fn get_all_jobs(&self) -> Result<Vec<JobSpec>>;

    /// Jobs whose `next_run_time` has arrived, soonest first. Records whose
    /// payload no longer deserializes are skipped with a warning instead of
    /// aborting the scheduler tick.
    fn get_due_jobs(&self, now: NaiveDateTime) -> Result<Vec<JobSpec>>;

    /// The earliest planned fire across this alias, if any job is scheduled.
    fn get_next_run_time(&self) -> Result<Option<NaiveDateTime>>;
}

/// SQLite-backed job store for one alias partition.
///
/// Holds its own connection behind a mutex so the scheduler thread, worker
/// threads reporting lifecycle events, and admin handlers can all call into
/// it; each method performs one logical read or write.
pub struct DatabaseJobStore {
    connection: Arc<Mutex<SqliteConnection>>,
    alias: String,
    serializer: JobSerializer,
}

impl DatabaseJobStore {
    pub fn new(connection: SqliteConnection, alias: &str, serializer: JobSerializer) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
            alias: alias.to_string(),
            serializer,
        }
    }

    /// Record-level existence check; does not touch the payload.
    pub fn contains_job(&self, id: &str) -> Result<bool> {
        let connection = &mut *self.connection.lock().unwrap();

        match job_store::find_job(connection, id, &self.alias) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn executions_for_job(&self, job_id: &str) -> Result<Vec<ExecutionRecord>> {
        let connection = &mut *self.connection.lock().unwrap();
        executions::executions_for_job(connection, job_id)
    }

    /// Retention sweep over the execution log. Returns the number of records
    /// removed.
    pub fn cleanup_executions(&self, max_age_secs: u64, now: NaiveDateTime) -> Result<usize> {
        let connection = &mut *self.connection.lock().unwrap();
        executions::delete_older_than(connection, max_age_secs, now)
    }

    // --- lifecycle event hooks --------------------------------------------
    //
    // Invoked by the scheduler as jobs move through dispatch. A persistence
    // failure here is logged and dropped: the execution log must never take
    // down the job it is describing.

    pub fn notify_submitted(
        &self,
        job_id: &str,
        run_time: NaiveDateTime,
        timestamp: NaiveDateTime,
    ) {
        self.record_lifecycle_event(ExecutionStatus::Sent, job_id, run_time, timestamp, None, None);
    }

    pub fn notify_max_instances(
        &self,
        job_id: &str,
        run_time: NaiveDateTime,
        timestamp: NaiveDateTime,
    ) {
        self.record_lifecycle_event(
            ExecutionStatus::MaxInstances,
            job_id,
            run_time,
            timestamp,
            None,
            None,
        );
    }

    pub fn notify_missed(&self, job_id: &str, run_time: NaiveDateTime, timestamp: NaiveDateTime) {
        self.record_lifecycle_event(
            ExecutionStatus::Missed,
            job_id,
            run_time,
            timestamp,
            None,
            None,
        );
    }

    pub fn notify_executed(
        &self,
        job_id: &str,
        run_time: NaiveDateTime,
        timestamp: NaiveDateTime,
    ) {
        self.record_lifecycle_event(
            ExecutionStatus::Success,
            job_id,
            run_time,
            timestamp,
            None,
            None,
        );
    }

    pub fn notify_error(
        &self,
        job_id: &str,
        run_time: NaiveDateTime,
        timestamp: NaiveDateTime,
        exception: &str,
        traceback: Option<&str>,
    ) {
        self.record_lifecycle_event(
            ExecutionStatus::Error,
            job_id,
            run_time,
            timestamp,
            Some(exception),
            traceback,
        );
    }

    fn record_lifecycle_event(
        &self,
        status: ExecutionStatus,
        job_id: &str,
        run_time: NaiveDateTime,
        timestamp: NaiveDateTime,
        exception: Option<&str>,
        traceback: Option<&str>,
    ) {
        let connection = &mut *self.connection.lock().unwrap();

        if let Err(e) = executions::record_event(
            connection,
            job_id,
            run_time,
            status,
            timestamp,
            exception,
            traceback,
        ) {
            log::error!("Failed to record {} event for job {}. {}", status, job_id, e);
        }
    }

    fn deserialize_surviving(&self, records: Vec<JobRecord>) -> Vec<JobSpec> {
        records
            .into_iter()
            .filter_map(|record| match self.serializer.deserialize(&record.job_state) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    log::warn!("Skipping job {} with unreadable payload. {}", record.id, e);
                    None
                }
            })
            .collect()
    }
}

impl JobStore for DatabaseJobStore {
    fn add_job(&self, spec: &JobSpec) -> Result<()> {
        let job_state = self.serializer.serialize(spec)?;
        let connection = &mut *self.connection.lock().unwrap();

        job_store::insert_job(
            connection,
            &NewJobRecord {
                id: &spec.id,
                alias: &self.alias,
                next_run_time: spec.next_run_time,
                job_state: &job_state,
            },
        )
    }

    fn update_job(&self, spec: &JobSpec) -> Result<()> {
        let job_state = self.serializer.serialize(spec)?;
        let connection = &mut *self.connection.lock().unwrap();

        job_store::update_job(
            connection,
            &spec.id,
            &self.alias,
            spec.next_run_time,
            &job_state,
        )
    }

    fn remove_job(&self, id: &str) -> Result<()> {
        let connection = &mut *self.connection.lock().unwrap();
        job_store::delete_job(connection, id, &self.alias)
    }

    fn remove_all_jobs(&self) -> Result<()> {
        let connection = &mut *self.connection.lock().unwrap();
        let removed = job_store::delete_all_jobs(connection, &self.alias)?;

        log::info!("Removed all {} jobs from alias {}.", removed, self.alias);

        Ok(())
    }

    fn lookup_job(&self, id: &str) -> Result<JobSpec> {
        let record = {
            let connection = &mut *self.connection.lock().unwrap();
            job_store::find_job(connection, id, &self.alias)?
        };

        self.serializer.deserialize(&record.job_state)
    }

    fn get_all_jobs(&self) -> Result<Vec<JobSpec>> {
        let records = {
            let connection = &mut *self.connection.lock().unwrap();
            job_store::all_jobs(connection, &self.alias)?
        };

        Ok(self.deserialize_surviving(records))
    }

    fn get_due_jobs(&self, now: NaiveDateTime) -> Result<Vec<JobSpec>> {
        let records = {
            let connection = &mut *self.connection.lock().unwrap();
            job_store::due_before(connection, &self.alias, now)?
        };

        Ok(self.deserialize_surviving(records))
    }

    fn get_next_run_time(&self) -> Result<Option<NaiveDateTime>> {
        let connection = &mut *self.connection.lock().unwrap();
        job_store::min_next_run_time(connection, &self.alias)
    }
}
