use std::fmt::Debug;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::notify::FanoutEngine;

mod countdown;
mod schedule;
pub use countdown::*;
pub use schedule::*;

/// A job that broadcasts on its own cadence. The job decides what the
/// notification says, the engine decides how it is delivered.
#[async_trait]
pub trait PeriodicJob: Debug + Send + Sync + 'static {
    fn schedule(&self) -> Schedule;

    async fn run_job(&self, engine: &FanoutEngine);
}

/// Runs the job forever in its own tokio task, sleeping until the next
/// scheduled fire time between runs.
pub fn spawn_periodic_job<J: PeriodicJob>(engine: FanoutEngine, job: J) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = chrono::Local::now().naive_local();
            let delay = job.schedule().delay_from(now);
            tracing::debug!("Next run of {:?} in {}s", job, delay.as_secs());
            tokio::time::sleep(delay).await;

            tracing::info!("Running job {:?}", job);
            job.run_job(&engine).await;
        }
    })
}
