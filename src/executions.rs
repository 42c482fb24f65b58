use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::{Double, Nullable, Text, Timestamp};
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{ExecutionRecord, ExecutionStatus};
use crate::schema::job_executions;

/// Records a lifecycle event for one scheduled fire of a job.
///
/// One row exists per `(job_id, run_time)` pair. Insert and update are a
/// single statement, so concurrent workers reporting the same fire cannot
/// create duplicates. Status is last-write-wins; finish time, duration and
/// failure detail are only ever filled in, never cleared, which keeps
/// out-of-order event delivery from erasing a completed run.
pub fn record_event(
    connection: &mut SqliteConnection,
    job_id: &str,
    run_time: NaiveDateTime,
    status: ExecutionStatus,
    timestamp: NaiveDateTime,
    exception: Option<&str>,
    traceback: Option<&str>,
) -> Result<()> {
    let (finished_at, duration_secs) = if status.is_terminal() {
        let elapsed = timestamp.signed_duration_since(run_time);
        (
            Some(timestamp),
            Some(elapsed.num_milliseconds() as f64 / 1000.0),
        )
    } else {
        (None, None)
    };

    diesel::sql_query(
        "INSERT INTO job_executions \
           (id, job_id, run_time, status, finished_at, duration_secs, exception, traceback) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (job_id, run_time) DO UPDATE SET \
           status = excluded.status, \
           finished_at = COALESCE(job_executions.finished_at, excluded.finished_at), \
           duration_secs = COALESCE(job_executions.duration_secs, excluded.duration_secs), \
           exception = COALESCE(excluded.exception, job_executions.exception), \
           traceback = COALESCE(excluded.traceback, job_executions.traceback)",
    )
    .bind::<Text, _>(Uuid::new_v4().to_string())
    .bind::<Text, _>(job_id)
    .bind::<Timestamp, _>(run_time)
    .bind::<Text, _>(status.as_str())
    .bind::<Nullable<Timestamp>, _>(finished_at)
    .bind::<Nullable<Double>, _>(duration_secs)
    .bind::<Nullable<Text>, _>(exception)
    .bind::<Nullable<Text>, _>(traceback)
    .execute(connection)?;

    Ok(())
}

/// Deletes execution records whose `run_time` is older than `max_age_secs`
/// before `now`. Job records are never touched. Returns the number of rows
/// removed.
pub fn delete_older_than(
    connection: &mut SqliteConnection,
    max_age_secs: u64,
    now: NaiveDateTime,
) -> Result<usize> {
    let cutoff = now - chrono::Duration::seconds(max_age_secs as i64);

    diesel::delete(job_executions::table.filter(job_executions::run_time.lt(cutoff)))
        .execute(connection)
        .map_err(Into::into)
}

/// Execution history for one job, newest fire first.
pub fn executions_for_job(
    connection: &mut SqliteConnection,
    job_id: &str,
) -> Result<Vec<ExecutionRecord>> {
    job_executions::table
        .filter(job_executions::job_id.eq(job_id))
        .order(job_executions::run_time.desc())
        .select(ExecutionRecord::as_select())
        .load(connection)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;
    use chrono::{Duration, NaiveDate};

    fn base_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn sent_then_success_collapses_into_one_finished_record() {
        let connection = &mut test_connection();
        let fire_time = base_time();

        record_event(
            connection,
            "job-a",
            fire_time,
            ExecutionStatus::Sent,
            fire_time,
            None,
            None,
        )
        .unwrap();
        record_event(
            connection,
            "job-a",
            fire_time,
            ExecutionStatus::Success,
            fire_time + Duration::seconds(2),
            None,
            None,
        )
        .unwrap();

        let history = executions_for_job(connection, "job-a").unwrap();
        assert_eq!(history.len(), 1);

        let record = &history[0];
        assert_eq!(record.status, "success");
        assert_eq!(record.finished_at, Some(fire_time + Duration::seconds(2)));
        assert_eq!(record.duration_secs, Some(2.0));
        assert_eq!(record.exception, None);
    }

    #[test]
    fn a_late_missed_event_keeps_completion_times() {
        let connection = &mut test_connection();
        let fire_time = base_time();

        record_event(
            connection,
            "job-a",
            fire_time,
            ExecutionStatus::Success,
            fire_time + Duration::seconds(2),
            None,
            None,
        )
        .unwrap();
        record_event(
            connection,
            "job-a",
            fire_time,
            ExecutionStatus::Missed,
            fire_time + Duration::seconds(5),
            None,
            None,
        )
        .unwrap();

        let history = executions_for_job(connection, "job-a").unwrap();
        assert_eq!(history.len(), 1);

        // Status is last-write-wins, but the completion timestamps survive.
        let record = &history[0];
        assert_eq!(record.status, "missed");
        assert_eq!(record.finished_at, Some(fire_time + Duration::seconds(2)));
        assert_eq!(record.duration_secs, Some(2.0));
    }

    #[test]
    fn error_events_capture_failure_detail() {
        let connection = &mut test_connection();
        let fire_time = base_time();

        record_event(
            connection,
            "job-a",
            fire_time,
            ExecutionStatus::Sent,
            fire_time,
            None,
            None,
        )
        .unwrap();
        record_event(
            connection,
            "job-a",
            fire_time,
            ExecutionStatus::Error,
            fire_time + Duration::seconds(1),
            Some("connection refused"),
            Some("task send_report: connection refused"),
        )
        .unwrap();

        let history = executions_for_job(connection, "job-a").unwrap();
        assert_eq!(history.len(), 1);

        let record = &history[0];
        assert_eq!(record.status, "error");
        assert_eq!(record.exception.as_deref(), Some("connection refused"));
        assert_eq!(
            record.traceback.as_deref(),
            Some("task send_report: connection refused")
        );
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn distinct_fire_times_get_distinct_records() {
        let connection = &mut test_connection();

        record_event(
            connection,
            "job-a",
            base_time(),
            ExecutionStatus::Success,
            base_time() + Duration::seconds(1),
            None,
            None,
        )
        .unwrap();
        record_event(
            connection,
            "job-a",
            base_time() + Duration::hours(1),
            ExecutionStatus::Sent,
            base_time() + Duration::hours(1),
            None,
            None,
        )
        .unwrap();

        let history = executions_for_job(connection, "job-a").unwrap();
        assert_eq!(history.len(), 2);
        // Newest first.
        assert_eq!(history[0].run_time, base_time() + Duration::hours(1));
        assert_eq!(history[1].run_time, base_time());
    }

    #[test]
    fn delete_older_than_honors_the_boundary() {
        let connection = &mut test_connection();
        let now = base_time();
        let week = 604_800;

        let ancient = now - Duration::seconds(week as i64 + 1);
        let at_cutoff = now - Duration::seconds(week as i64);
        let recent = now - Duration::hours(1);

        for (job_id, run_time) in [("old", ancient), ("cutoff", at_cutoff), ("new", recent)] {
            record_event(
                connection,
                job_id,
                run_time,
                ExecutionStatus::Success,
                run_time + Duration::seconds(1),
                None,
                None,
            )
            .unwrap();
        }

        let deleted = delete_older_than(connection, week, now).unwrap();

        assert_eq!(deleted, 1);
        assert!(executions_for_job(connection, "old").unwrap().is_empty());
        assert_eq!(executions_for_job(connection, "cutoff").unwrap().len(), 1);
        assert_eq!(executions_for_job(connection, "new").unwrap().len(), 1);
    }

    #[test]
    fn delete_older_than_leaves_job_records_alone() {
        let connection = &mut test_connection();
        let now = base_time();

        crate::job_store::insert_job(
            connection,
            &crate::models::NewJobRecord {
                id: "job-a",
                alias: "default",
                next_run_time: Some(now),
                job_state: "{}",
            },
        )
        .unwrap();
        record_event(
            connection,
            "job-a",
            now - Duration::days(30),
            ExecutionStatus::Success,
            now - Duration::days(30),
            None,
            None,
        )
        .unwrap();

        let deleted = delete_older_than(connection, 604_800, now).unwrap();

        assert_eq!(deleted, 1);
        assert!(crate::job_store::find_job(connection, "job-a", "default").is_ok());
    }
}
