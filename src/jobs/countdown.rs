use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{PeriodicJob, Schedule};
use crate::core::AppConfig;
use crate::notify::{FanoutEngine, PushNotificationPayload};

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Broadcasts how far along the configured countdown window is.
#[derive(Debug, Clone)]
pub struct DailyCountdown {
    pub start: NaiveDateTime,
    pub target: NaiveDateTime,
    pub schedule: Schedule,
}

impl DailyCountdown {
    /// Returns `None` when the countdown broadcast is switched off.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config.countdown_schedule.map(|schedule| Self {
            start: config.countdown_start,
            target: config.countdown_target,
            schedule,
        })
    }

    pub fn payload_at(&self, now: NaiveDateTime) -> PushNotificationPayload {
        let progress = progress_percent(self.start, self.target, now);
        let days = days_left(self.target, now);
        PushNotificationPayload::new(
            "Daily Countdown",
            &format!(
                "Progress is at {:.1}%, {} days left until the target date! 📅",
                progress, days
            ),
            None,
            Some("daily_countdown"),
        )
    }
}

/// Share of the window between `start` and `target` that has elapsed,
/// clamped to 0..=100.
pub fn progress_percent(start: NaiveDateTime, target: NaiveDateTime, now: NaiveDateTime) -> f64 {
    let total = (target - start).num_milliseconds() as f64;
    if total <= 0.0 {
        return 100.0;
    }
    let elapsed = (now - start).num_milliseconds() as f64;
    (elapsed / total * 100.0).clamp(0.0, 100.0)
}

/// Whole days remaining until `target`, rounding partial days up. Never
/// negative.
pub fn days_left(target: NaiveDateTime, now: NaiveDateTime) -> i64 {
    let diff = (target - now).num_milliseconds() as f64;
    ((diff / MILLIS_PER_DAY).ceil() as i64).max(0)
}

#[async_trait]
impl PeriodicJob for DailyCountdown {
    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run_job(&self, engine: &FanoutEngine) {
        let payload = self.payload_at(chrono::Local::now().naive_local());
        tracing::info!("Sending countdown notification: {}", payload.body);

        match engine.broadcast(&payload).await {
            Ok(report) => tracing::info!(
                "Countdown notification sent: {} delivered, {} removed, {} failed",
                report.delivered,
                report.removed,
                report.transient
            ),
            Err(e) => tracing::error!("Countdown notification failed: {}", e),
        }
    }
}
