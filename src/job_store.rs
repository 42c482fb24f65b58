use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::errors::{Result, StoreError};
use crate::models::{JobRecord, NewJobRecord};
use crate::schema::{job_executions, scheduled_jobs};

pub fn insert_job(connection: &mut SqliteConnection, record: &NewJobRecord) -> Result<()> {
    let result = diesel::insert_into(scheduled_jobs::table)
        .values(record)
        .execute(connection);

    match result {
        Ok(_) => Ok(()),
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => Err(StoreError::Conflict {
            id: record.id.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

pub fn find_job(connection: &mut SqliteConnection, id: &str, alias: &str) -> Result<JobRecord> {
    scheduled_jobs::table
        .filter(scheduled_jobs::id.eq(id))
        .filter(scheduled_jobs::alias.eq(alias))
        .select(JobRecord::as_select())
        .first(connection)
        .optional()?
        .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

pub fn update_job(
    connection: &mut SqliteConnection,
    id: &str,
    alias: &str,
    next_run_time: Option<NaiveDateTime>,
    job_state: &str,
) -> Result<()> {
    let updated = diesel::update(
        scheduled_jobs::table
            .filter(scheduled_jobs::id.eq(id))
            .filter(scheduled_jobs::alias.eq(alias)),
    )
    .set((
        scheduled_jobs::next_run_time.eq(next_run_time),
        scheduled_jobs::job_state.eq(job_state),
    ))
    .execute(connection)?;

    if updated == 0 {
        return Err(StoreError::NotFound { id: id.to_string() });
    }

    Ok(())
}

/// Deletes a job and every execution record carrying its id, in one
/// transaction. History is only meaningful for live jobs.
pub fn delete_job(connection: &mut SqliteConnection, id: &str, alias: &str) -> Result<()> {
    let deleted = connection.transaction::<usize, diesel::result::Error, _>(|connection| {
        diesel::delete(job_executions::table.filter(job_executions::job_id.eq(id)))
            .execute(connection)?;

        diesel::delete(
            scheduled_jobs::table
                .filter(scheduled_jobs::id.eq(id))
                .filter(scheduled_jobs::alias.eq(alias)),
        )
        .execute(connection)
    })?;

    if deleted == 0 {
        return Err(StoreError::NotFound { id: id.to_string() });
    }

    Ok(())
}

/// Deletes every job in the alias, cascading to their execution records.
/// Returns the number of jobs removed.
pub fn delete_all_jobs(connection: &mut SqliteConnection, alias: &str) -> Result<usize> {
    connection
        .transaction::<usize, diesel::result::Error, _>(|connection| {
            let ids: Vec<String> = scheduled_jobs::table
                .filter(scheduled_jobs::alias.eq(alias))
                .select(scheduled_jobs::id)
                .load(connection)?;

            diesel::delete(job_executions::table.filter(job_executions::job_id.eq_any(&ids)))
                .execute(connection)?;

            diesel::delete(scheduled_jobs::table.filter(scheduled_jobs::alias.eq(alias)))
                .execute(connection)
        })
        .map_err(Into::into)
}

/// Jobs in the alias whose `next_run_time` has arrived, soonest first.
/// Paused jobs never show up here.
pub fn due_before(
    connection: &mut SqliteConnection,
    alias: &str,
    timestamp: NaiveDateTime,
) -> Result<Vec<JobRecord>> {
    scheduled_jobs::table
        .filter(scheduled_jobs::alias.eq(alias))
        .filter(scheduled_jobs::next_run_time.is_not_null())
        .filter(scheduled_jobs::next_run_time.le(timestamp))
        .order(scheduled_jobs::next_run_time.asc())
        .select(JobRecord::as_select())
        .load(connection)
        .map_err(Into::into)
}

/// All jobs in the alias ordered by `next_run_time` ascending, paused jobs
/// last.
pub fn all_jobs(connection: &mut SqliteConnection, alias: &str) -> Result<Vec<JobRecord>> {
    scheduled_jobs::table
        .filter(scheduled_jobs::alias.eq(alias))
        .order(scheduled_jobs::next_run_time.is_null().asc())
        .then_order_by(scheduled_jobs::next_run_time.asc())
        .select(JobRecord::as_select())
        .load(connection)
        .map_err(Into::into)
}

/// The earliest non-null `next_run_time` in the alias, if any.
pub fn min_next_run_time(
    connection: &mut SqliteConnection,
    alias: &str,
) -> Result<Option<NaiveDateTime>> {
    use diesel::dsl::min;

    scheduled_jobs::table
        .filter(scheduled_jobs::alias.eq(alias))
        .select(min(scheduled_jobs::next_run_time))
        .first(connection)
        .map_err(Into::into)
}
