use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::time::sleep;

use outreachiq_engine::orchestrator::Orchestrator;
use outreachiq_engine::services::job_store::JobStore;
use outreachiq_engine::Config;

/// Process entry point for the Job Orchestrator (§4.5, §6's "operator
/// surface"). Claims runnable jobs with `SELECT ... FOR UPDATE SKIP
/// LOCKED` (the same pattern as the teacher's `claim_pending_jobs`),
/// drives each through the orchestrator, and leans on Postgres row
/// locking rather than in-process coordination to let multiple worker
/// processes share one queue.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to create database pool");

    sqlx::migrate!("./migrations").run(&pool).await.expect("failed to run migrations");

    tracing::info!("outreachiq-worker started");

    let store = Arc::new(JobStore::new(pool.clone()));
    let orchestrator = Orchestrator::new(store.clone(), pool.clone(), config.clone())
        .expect("failed to build orchestrator (check webhook client configuration)");

    let poll_interval = Duration::from_secs(config.job_poll_interval_secs);
    let mut iteration = 0u64;

    loop {
        iteration += 1;

        match store.claim_next(10).await {
            Ok(jobs) => {
                if !jobs.is_empty() {
                    tracing::info!(iteration, count = jobs.len(), "claimed jobs");
                }

                for job in jobs {
                    let job_id = job.id;
                    if let Err(e) = orchestrator.run_job(job_id).await {
                        // The job row itself is already flipped to
                        // `failed` by `run_job`; this log line is for
                        // whatever broker-level retry policy wraps
                        // the worker process (§7).
                        tracing::error!(job_id = %job_id, error = %e, "job run failed");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to claim jobs");
            }
        }

        sleep(poll_interval).await;
    }
}
