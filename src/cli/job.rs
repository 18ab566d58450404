use anyhow::{Result, anyhow};

use crate::api::engine_from_config;
use crate::core::AppConfig;
use crate::jobs::{DailyCountdown, PeriodicJob};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum JobId {
    Countdown,
}

pub async fn run(id: JobId) -> Result<()> {
    let config = AppConfig::from_env()?;
    let engine = engine_from_config(&config).await?;

    let job: Box<dyn PeriodicJob> = match id {
        JobId::Countdown => Box::new(
            DailyCountdown::from_config(&config)
                .ok_or_else(|| anyhow!("Countdown job is disabled by PUSHD_COUNTDOWN_SCHEDULE"))?,
        ),
    };

    println!("Running job: {:?}", id);
    job.run_job(&engine).await;
    println!("Job completed");

    Ok(())
}
