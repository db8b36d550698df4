use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod reminders;

pub use reminders::{ReminderPeriod, ReminderPolicy, ReminderScheduler, RunOutcome, RunSummary};

/// Runs the reminder pass every `every`. The first tick fires immediately;
/// the period claim keeps restarts from sending twice.
pub fn spawn_reminder_job(
    scheduler: Arc<ReminderScheduler>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    info!("Starting reminder job, every {}s", every.as_secs());

    tokio::spawn(async move {
        let mut interval = interval(every);

        loop {
            interval.tick().await;
            let today = Utc::now().date_naive();

            match scheduler.run(today).await {
                Ok(RunOutcome::Completed(summary)) => {
                    info!("Reminder job finished: {:?}", summary);
                }
                Ok(RunOutcome::Skipped(reason)) => info!("Reminder job skipped: {}", reason),
                Err(e) => error!("Reminder job failed: {}", e),
            }
        }
    })
}
