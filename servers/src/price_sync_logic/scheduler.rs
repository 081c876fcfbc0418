use std::sync::Arc;

use chrono_tz::Tz;
use tokio_cron_scheduler::{Job as CronJob, JobBuilder, JobScheduler, JobSchedulerError};
use tracing::{info, warn};

use lib_common::connections::LivenessProbe;
use lib_common::{Job, Orchestrator};

/// A pipeline job and the cron expression that triggers it.
pub struct Scheduled {
    pub job: Job,
    pub cron: String,
}

fn pipeline_cron_job(tz: Tz, orchestrator: Arc<Orchestrator>, scheduled: Scheduled) -> Result<CronJob, JobSchedulerError> {
    let Scheduled { job, cron } = scheduled;
    let job = Arc::new(job);

    JobBuilder::new()
        .with_timezone(tz)
        .with_cron_job_type()
        .with_schedule(cron.as_str())?
        .with_run_async(Box::new(move |uuid, mut l| {
            let orchestrator = orchestrator.clone();
            let job = job.clone();
            Box::pin(async move {
                orchestrator.run_job(&job).await;
                match l.next_tick_for_job(uuid).await {
                    Ok(Some(ts)) => info!(job = %job.name, next = %ts, "next run scheduled"),
                    _ => warn!(job = %job.name, "could not compute next run"),
                }
            })
        }))
        .build()
}

fn liveness_cron_job(tz: Tz, probe: Arc<LivenessProbe>, cron: &str) -> Result<CronJob, JobSchedulerError> {
    JobBuilder::new()
        .with_timezone(tz)
        .with_cron_job_type()
        .with_schedule(cron)?
        .with_run_async(Box::new(move |_uuid, _l| {
            let probe = probe.clone();
            Box::pin(async move {
                // Already logged by the probe.
                let _ = probe.ping().await;
            })
        }))
        .build()
}

/// Registers every job (and the liveness ping, when configured) on a new
/// scheduler. The scheduler is returned unstarted.
pub async fn build_scheduler(
    tz: Tz,
    orchestrator: Arc<Orchestrator>,
    jobs: Vec<Scheduled>,
    liveness: Option<(Arc<LivenessProbe>, String)>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    for scheduled in jobs {
        let name = scheduled.job.name.clone();
        let cron = scheduled.cron.clone();
        scheduler
            .add(pipeline_cron_job(tz, orchestrator.clone(), scheduled)?)
            .await?;
        info!(job = %name, cron = %cron, timezone = %tz, "job scheduled");
    }

    if let Some((probe, cron)) = liveness {
        scheduler.add(liveness_cron_job(tz, probe.clone(), &cron)?).await?;
        info!(url = %probe.url(), cron = %cron, "liveness ping scheduled");
    }

    Ok(scheduler)
}
