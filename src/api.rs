use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::adapter::{DatabaseJobStore, JobStore};
use crate::errors::StoreError;
use crate::models::ExecutionRecord;
use crate::registry::TaskRegistry;
use crate::run_now::{RunNowCoordinator, RunOutcome};
use crate::serializer::{JobSpec, Trigger};
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DatabaseJobStore>,
    pub registry: Arc<TaskRegistry>,
    pub coordinator: Arc<RunNowCoordinator>,
    pub settings: Settings,
}

#[derive(Serialize)]
struct JobDto {
    id: String,
    name: String,
    task: String,
    args: serde_json::Value,
    trigger: Trigger,
    misfire_grace_secs: Option<u32>,
    max_instances: u32,
    next_run_time: Option<String>,
}

fn transform_job(spec: JobSpec, datetime_format: &str) -> JobDto {
    JobDto {
        id: spec.id,
        name: spec.name,
        task: spec.task,
        args: spec.args,
        trigger: spec.trigger,
        misfire_grace_secs: spec.misfire_grace_secs,
        max_instances: spec.max_instances,
        next_run_time: spec
            .next_run_time
            .map(|t| t.format(datetime_format).to_string()),
    }
}

#[derive(Serialize)]
struct ExecutionDto {
    id: String,
    job_id: String,
    status: String,
    run_time: String,
    finished_at: Option<String>,
    duration_secs: Option<f64>,
    exception: Option<String>,
    traceback: Option<String>,
}

fn transform_execution(record: ExecutionRecord, datetime_format: &str) -> ExecutionDto {
    ExecutionDto {
        id: record.id,
        job_id: record.job_id,
        status: record.status,
        run_time: record.run_time.format(datetime_format).to_string(),
        finished_at: record
            .finished_at
            .map(|t| t.format(datetime_format).to_string()),
        duration_secs: record.duration_secs,
        exception: record.exception,
        traceback: record.traceback,
    }
}

#[derive(Deserialize)]
pub struct NewJobInput {
    id: String,
    name: Option<String>,
    task: String,
    args: Option<serde_json::Value>,
    trigger: Trigger,
    next_run_time: Option<NaiveDateTime>,
    misfire_grace_secs: Option<u32>,
    max_instances: Option<u32>,
}

#[derive(Serialize)]
pub struct CreateJobResponse {
    job: JobDto,
}

pub async fn create_job_handler(
    State(state): State<AppState>,
    Json(new_job_input): Json<NewJobInput>,
) -> Result<Json<CreateJobResponse>, (StatusCode, String)> {
    let id = new_job_input.id.trim();
    let task = new_job_input.task.trim();
    let max_instances = new_job_input.max_instances.unwrap_or(1);

    if id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "id cannot be empty.".into()));
    }

    if !state.registry.contains(task) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("task {:?} is not registered.", task),
        ));
    }

    if max_instances < 1 {
        return Err((
            StatusCode::BAD_REQUEST,
            "max_instances must be greater than or equal to 1.".into(),
        ));
    }

    if max_instances > 64 {
        return Err((
            StatusCode::BAD_REQUEST,
            "max_instances must be less than or equal to 64.".into(),
        ));
    }

    let spec = JobSpec {
        id: id.to_string(),
        name: new_job_input.name.unwrap_or_else(|| id.to_string()),
        task: task.to_string(),
        args: new_job_input.args.unwrap_or(serde_json::Value::Null),
        trigger: new_job_input.trigger,
        misfire_grace_secs: new_job_input.misfire_grace_secs,
        max_instances,
        next_run_time: new_job_input.next_run_time,
    };

    match state.store.add_job(&spec) {
        Ok(()) => {
            log::info!("Created job {}.", spec.id);

            Ok(Json(CreateJobResponse {
                job: transform_job(spec, &state.settings.datetime_format),
            }))
        }
        Err(StoreError::Conflict { id }) => Err((
            StatusCode::CONFLICT,
            format!("A job with id {:?} already exists.", id),
        )),
        Err(e) => {
            log::error!("Failed to create job. {}", e);

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create job.".into(),
            ))
        }
    }
}

#[derive(Serialize)]
pub struct ListJobsResponse {
    jobs: Vec<JobDto>,
}

pub async fn list_jobs_handler(
    State(state): State<AppState>,
) -> Result<Json<ListJobsResponse>, (StatusCode, String)> {
    match state.store.get_all_jobs() {
        Ok(specs) => {
            let jobs = specs
                .into_iter()
                .map(|spec| transform_job(spec, &state.settings.datetime_format))
                .collect();

            Ok(Json(ListJobsResponse { jobs }))
        }
        Err(e) => {
            log::error!("Failed to fetch jobs. {}", e);

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch jobs.".into(),
            ))
        }
    }
}

pub async fn delete_job_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.store.remove_job(&id) {
        Ok(()) => {
            log::info!("Removed job {}.", id);

            Ok(StatusCode::NO_CONTENT)
        }
        Err(StoreError::NotFound { .. }) => {
            Err((StatusCode::NOT_FOUND, "Job does not exist.".into()))
        }
        Err(e) => {
            log::error!("Failed to remove job {}. {}", id, e);

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to remove job.".into(),
            ))
        }
    }
}

#[derive(Serialize)]
pub struct ListExecutionsResponse {
    executions: Vec<ExecutionDto>,
}

pub async fn list_executions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListExecutionsResponse>, (StatusCode, String)> {
    match state.store.contains_job(&id) {
        Ok(true) => {}
        Ok(false) => return Err((StatusCode::NOT_FOUND, "Job does not exist.".into())),
        Err(e) => {
            log::error!("Failed to look up job {}. {}", id, e);

            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch executions.".into(),
            ));
        }
    }

    match state.store.executions_for_job(&id) {
        Ok(records) => {
            let executions = records
                .into_iter()
                .map(|record| transform_execution(record, &state.settings.datetime_format))
                .collect();

            Ok(Json(ListExecutionsResponse { executions }))
        }
        Err(e) => {
            log::error!("Failed to fetch executions for job {}. {}", id, e);

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch executions.".into(),
            ))
        }
    }
}

#[derive(Serialize)]
pub struct RunJobResponse {
    status: String,
    duration_secs: Option<f64>,
    error: Option<String>,
}

pub async fn run_job_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunJobResponse>, (StatusCode, String)> {
    let spec = match state.store.lookup_job(&id) {
        Ok(spec) => spec,
        Err(StoreError::NotFound { .. }) => {
            return Err((StatusCode::NOT_FOUND, "Job does not exist.".into()));
        }
        Err(e) => {
            log::error!("Failed to look up job {}. {}", id, e);

            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to look up job.".into(),
            ));
        }
    };

    let Some(task) = state.registry.get(&spec.task) else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task {:?} is no longer registered.", spec.task),
        ));
    };

    let run_time = Utc::now().naive_utc();
    state.store.notify_submitted(&spec.id, run_time, run_time);

    log::info!("Manually triggering job {}.", spec.id);

    let store = Arc::clone(&state.store);
    let coordinator = Arc::clone(&state.coordinator);
    let job_id = spec.id.clone();
    let args = spec.args.clone();

    // The coordinator blocks its caller, so hand it a blocking-pool thread.
    // The closure owns the terminal event write: a run that outlives the
    // wait budget still records success or error when it finishes.
    let outcome = tokio::task::spawn_blocking(move || {
        coordinator.run(move || {
            let result = task(args);
            let finished = Utc::now().naive_utc();

            match &result {
                Ok(()) => store.notify_executed(&job_id, run_time, finished),
                Err(error) => store.notify_error(
                    &job_id,
                    run_time,
                    finished,
                    &error.to_string(),
                    Some(&format!("{:?}", error)),
                ),
            }

            result
        })
    })
    .await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Failed to run job {}. {}", id, e);

            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to run job.".into(),
            ));
        }
    };

    let response = match outcome {
        RunOutcome::Completed { duration } => {
            log::info!("Job {} completed in {:?}.", id, duration);

            RunJobResponse {
                status: "completed".into(),
                duration_secs: Some(duration.as_secs_f64()),
                error: None,
            }
        }
        RunOutcome::TimedOut => {
            let reason = StoreError::Timeout;
            log::warn!("Gave up waiting on job {}. {}", id, reason);

            RunJobResponse {
                status: "timeout".into(),
                duration_secs: None,
                error: Some(reason.to_string()),
            }
        }
        RunOutcome::Failed { error } => {
            log::warn!("Manual run of job {} failed. {}", id, error);

            RunJobResponse {
                status: "failed".into(),
                duration_secs: None,
                error: Some(error),
            }
        }
    };

    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct CleanupInput {
    max_age_seconds: Option<u64>,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    deleted: usize,
}

pub async fn cleanup_handler(
    State(state): State<AppState>,
    Json(cleanup_input): Json<CleanupInput>,
) -> Result<Json<CleanupResponse>, (StatusCode, String)> {
    let max_age = cleanup_input
        .max_age_seconds
        .unwrap_or(state.settings.retention_max_age_secs);

    match state
        .store
        .cleanup_executions(max_age, Utc::now().naive_utc())
    {
        Ok(deleted) => {
            log::info!(
                "Removed {} execution records older than {} seconds.",
                deleted,
                max_age
            );

            Ok(Json(CleanupResponse { deleted }))
        }
        Err(e) => {
            log::error!("Failed to clean up executions. {}", e);

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to clean up executions.".into(),
            ))
        }
    }
}
