use crate::entities;
use crate::errors::LavError;
use crate::hub::Hub;
use crate::mqtt;
use crate::settings::Jobs as JobsCfg;
use crate::storage;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

pub const MARK_STALE_DEVICES: &str = "mark_stale_devices_offline";
pub const PURGE_ACCESS_LOGS: &str = "purge_old_access_logs";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: String,
    pub description: String,
    pub schedule: String,
}

/// One recorded run of a background job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: i64,
    pub job_name: String,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    /// `None` while the job is still running
    pub success: Option<bool>,
    pub error_message: Option<String>,
    pub records_processed: Option<i64>,
}

impl From<entities::job_execution::Model> for JobRun {
    fn from(m: entities::job_execution::Model) -> Self {
        JobRun {
            id: m.id,
            job_name: m.job_name,
            started_at: m.started_at,
            completed_at: m.completed_at,
            success: m.success.map(|s| s != 0),
            error_message: m.error_message,
            records_processed: m.records_processed,
        }
    }
}

pub fn available_jobs(cfg: &JobsCfg) -> Vec<JobInfo> {
    vec![
        JobInfo {
            name: MARK_STALE_DEVICES.to_string(),
            description: "Mark devices offline when they stop reporting".to_string(),
            schedule: cfg.stale_devices_cron.clone(),
        },
        JobInfo {
            name: PURGE_ACCESS_LOGS.to_string(),
            description: "Delete access logs past the retention period".to_string(),
            schedule: cfg.purge_access_logs_cron.clone(),
        },
    ]
}

/// Online devices silent for longer than `device_offline_after_secs` go
/// offline through the same path as an MQTT report.
///
/// Controllers must repeat `{"online": true}` on `device/{id}/status` more
/// often than that window; a controller that only reports transitions is
/// marked offline (with an alert) one window after its last report.
pub async fn mark_stale_devices_offline(
    db: &DatabaseConnection,
    hub: &Hub,
) -> Result<u64, LavError> {
    let config = storage::get_system_config(db).await?;
    let cutoff = Utc::now()
        .timestamp()
        .saturating_sub(config.device_offline_after_secs);

    let mut count = 0;
    for device in storage::stale_online_devices(db, cutoff).await? {
        if mqtt::apply_device_status(db, hub, &device.id, false)
            .await?
            .is_some()
        {
            count += 1;
        }
    }
    Ok(count)
}

/// Zero retention keeps logs forever.
pub async fn purge_old_access_logs(db: &DatabaseConnection) -> Result<u64, LavError> {
    let config = storage::get_system_config(db).await?;
    if config.access_log_retention_days <= 0 {
        return Ok(0);
    }
    let Some(window) = config.access_log_retention_days.checked_mul(86_400) else {
        warn!(
            days = config.access_log_retention_days,
            "Retention period out of range, skipping purge"
        );
        return Ok(0);
    };
    let cutoff = Utc::now().timestamp().saturating_sub(window);
    storage::purge_access_logs_before(db, cutoff).await
}

async fn run_job(db: &DatabaseConnection, hub: &Hub, job_name: &str) -> Result<u64, LavError> {
    match job_name {
        MARK_STALE_DEVICES => mark_stale_devices_offline(db, hub).await,
        PURGE_ACCESS_LOGS => purge_old_access_logs(db).await,
        _ => Err(LavError::NotFound(format!("Unknown job name: {}", job_name))),
    }
}

/// Run a job and record it in `job_executions`.
async fn run_tracked(db: &DatabaseConnection, hub: &Hub, job_name: &str) -> Result<i64, LavError> {
    let execution_id = start_job_execution(db, job_name).await?;

    match run_job(db, hub, job_name).await {
        Ok(count) => {
            info!(job = job_name, records = count, "Job completed");
            complete_job_execution(db, execution_id, true, None, Some(count as i64)).await?;
        }
        Err(e) => {
            error!(job = job_name, error = %e, "Job failed");
            complete_job_execution(db, execution_id, false, Some(e.to_string()), None).await?;
        }
    }
    Ok(execution_id)
}

fn scheduled_job(
    cron: &str,
    job_name: &'static str,
    db: DatabaseConnection,
    hub: Hub,
) -> Result<Job, LavError> {
    Job::new_async(cron, move |_uuid, _l| {
        let db = db.clone();
        let hub = hub.clone();
        Box::pin(async move {
            info!("Running {} job", job_name);
            if let Err(e) = run_tracked(&db, &hub, job_name).await {
                error!(job = job_name, error = %e, "Failed to record job execution");
            }
        })
    })
    .map_err(|e| LavError::Other(format!("Failed to create {} job: {}", job_name, e)))
}

/// Initialize and start the job scheduler with all background tasks
pub async fn init_scheduler(
    cfg: &JobsCfg,
    db: DatabaseConnection,
    hub: Hub,
) -> Result<JobScheduler, LavError> {
    let sched = JobScheduler::new()
        .await
        .map_err(|e| LavError::Other(format!("Failed to create job scheduler: {}", e)))?;

    let jobs = [
        (cfg.stale_devices_cron.as_str(), MARK_STALE_DEVICES),
        (cfg.purge_access_logs_cron.as_str(), PURGE_ACCESS_LOGS),
    ];
    for (cron, name) in jobs {
        let job = scheduled_job(cron, name, db.clone(), hub.clone())?;
        sched
            .add(job)
            .await
            .map_err(|e| LavError::Other(format!("Failed to add {} job: {}", name, e)))?;
    }

    sched
        .start()
        .await
        .map_err(|e| LavError::Other(format!("Failed to start job scheduler: {}", e)))?;

    info!("Job scheduler started with {} jobs", jobs.len());

    Ok(sched)
}

/// Record the start of a job execution
pub async fn start_job_execution(db: &DatabaseConnection, job_name: &str) -> Result<i64, LavError> {
    let execution = entities::job_execution::ActiveModel {
        job_name: Set(job_name.to_string()),
        started_at: Set(Utc::now().timestamp()),
        completed_at: Set(None),
        success: Set(None),
        error_message: Set(None),
        records_processed: Set(None),
        ..Default::default()
    };

    let result = execution.insert(db).await?;
    Ok(result.id)
}

/// Record the completion of a job execution
pub async fn complete_job_execution(
    db: &DatabaseConnection,
    execution_id: i64,
    success: bool,
    error_message: Option<String>,
    records_processed: Option<i64>,
) -> Result<(), LavError> {
    if let Some(execution) = entities::JobExecution::find_by_id(execution_id)
        .one(db)
        .await?
    {
        let mut active = execution.into_active_model();
        active.completed_at = Set(Some(Utc::now().timestamp()));
        active.success = Set(Some(if success { 1 } else { 0 }));
        active.error_message = Set(error_message);
        active.records_processed = Set(records_processed);
        active.update(db).await?;
    }

    Ok(())
}

/// Run a job immediately and return its execution record.
pub async fn trigger_job_manually(
    db: &DatabaseConnection,
    hub: &Hub,
    job_name: &str,
) -> Result<JobRun, LavError> {
    if job_name != MARK_STALE_DEVICES && job_name != PURGE_ACCESS_LOGS {
        return Err(LavError::NotFound(format!("Unknown job name: {}", job_name)));
    }
    info!("Manually triggering job: {}", job_name);

    let execution_id = run_tracked(db, hub, job_name).await?;
    entities::JobExecution::find_by_id(execution_id)
        .one(db)
        .await?
        .map(JobRun::from)
        .ok_or_else(|| LavError::Other(format!("Job execution {} vanished", execution_id)))
}

/// Newest first.
pub async fn recent_executions(
    db: &DatabaseConnection,
    job_name: Option<&str>,
    only_failures: bool,
    limit: u64,
) -> Result<Vec<JobRun>, LavError> {
    use entities::job_execution::{Column, Entity};

    let mut query = Entity::find();
    if let Some(name) = job_name {
        query = query.filter(Column::JobName.eq(name));
    }
    if only_failures {
        query = query.filter(Column::Success.eq(0));
    }

    Ok(query
        .order_by_desc(Column::StartedAt)
        .order_by_desc(Column::Id)
        .limit(limit.clamp(1, 500))
        .all(db)
        .await?
        .into_iter()
        .map(JobRun::from)
        .collect())
}
