//! Daily scheduler: fires a job once a day at a wall-clock time in a zone.
//!
//! The next fire instant is recomputed after every run, so DST shifts and
//! long runs never accumulate drift.

use std::future::Future;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ScheduleConfig;

/// The first instant strictly after `now` whose local time in `tz` is
/// `hour:minute`.
///
/// A local time skipped by a DST gap does not exist on that day, so the
/// next day that has it is used. A local time repeated by a DST overlap
/// resolves to its earlier occurrence.
pub fn next_fire_time(now: DateTime<Utc>, hour: u32, minute: u32, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();

    for offset in 0..=7 {
        if let Some(date) = today.checked_add_days(Days::new(offset))
            && let Some(candidate) = local_fire_time(date, hour, minute, tz)
            && candidate > now
        {
            return candidate;
        }
    }

    // Unreachable for a validated hour and minute.
    warn!(hour, minute, %tz, "No valid fire time found, retrying in a day");
    now + chrono::Duration::days(1)
}

/// The next fire time after a run that fired at `last_fire`.
///
/// Anchored on `last_fire` as well as `now`, so a wall clock stepped back
/// during the run cannot yield the same instant twice.
pub fn next_fire_after(
    now: DateTime<Utc>,
    last_fire: Option<DateTime<Utc>>,
    hour: u32,
    minute: u32,
    tz: Tz,
) -> DateTime<Utc> {
    let anchor = last_fire.map_or(now, |last| last.max(now));
    next_fire_time(anchor, hour, minute, tz)
}

fn local_fire_time(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Handle to a running scheduler. Dropping it also stops the scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for it. An in-flight job finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }
}

/// Spawn a background task that runs `job` every day at the configured time.
///
/// A failing job is the job's business to log; the scheduler keeps going.
pub fn spawn_daily_scheduler<F, Fut>(schedule: ScheduleConfig, job: F) -> SchedulerHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(
            hour = schedule.hour,
            minute = schedule.minute,
            timezone = %schedule.timezone,
            "Daily scheduler started"
        );

        let mut last_fire = None;

        loop {
            let now = Utc::now();
            let fire_at = next_fire_after(
                now,
                last_fire,
                schedule.hour,
                schedule.minute,
                schedule.timezone,
            );
            let wait = (fire_at - now).to_std().unwrap_or_default();

            info!(
                hours = %format!("{:.2}", wait.as_secs_f64() / 3600.0),
                at = %fire_at.with_timezone(&schedule.timezone).format("%Y-%m-%d %H:%M %Z"),
                "Next scheduled run"
            );

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Scheduler shutting down");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            debug!("Scheduled run starting");
            last_fire = Some(fire_at);
            job().await;

            if *shutdown_rx.borrow() {
                info!("Scheduler shutting down");
                return;
            }
        }
    });

    SchedulerHandle {
        shutdown_tx,
        handle,
    }
}
