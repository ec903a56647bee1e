//! Periodic reminder check.
//!
//! Every tick looks for unsent reminders due within the horizon and for
//! unsent reminders already past due. Each one is announced at most once
//! per device and flagged as sent on the remote store.

use super::store::{NotifiedCache, ReminderStore};
use crate::clock::Clock;
use crate::error::Result;
use crate::notify::Notifier;
use crate::shutdown::ShutdownSignal;
use pensebete_engine::{
    DedupeKey, DedupePolicy, Notice, Reminder, ReminderPhase, Timestamp, DEFAULT_HORIZON_MS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Scheduler timing and cache bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Period between two checks; the first check runs at start
    pub tick_interval: Duration,
    /// How far ahead a reminder counts as due soon
    pub horizon: Duration,
    /// Period between two compactions of the notified cache
    pub cleanup_interval: Duration,
    pub dedupe: DedupePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            horizon: Duration::from_millis(DEFAULT_HORIZON_MS),
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            dedupe: DedupePolicy::default(),
        }
    }
}

/// What one check did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Notifications are disabled; nothing was looked at
    pub skipped: bool,
    /// Due-soon reminders announced this tick
    pub due_soon: usize,
    /// Overdue reminders announced this tick
    pub overdue: usize,
    /// Announcements the delivery accepted
    pub delivered: usize,
    /// Reminders already announced on this device
    pub duplicates: usize,
    /// Reminders flagged as sent on the remote store
    pub marked_sent: usize,
    /// Failed queries and failed sent-flag updates
    pub failures: usize,
}

/// Announces due reminders.
pub struct ReminderScheduler {
    store: ReminderStore,
    notified: Mutex<NotifiedCache>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl ReminderScheduler {
    pub fn new(
        store: ReminderStore,
        notified: NotifiedCache,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            notified: Mutex::new(notified),
            notifier,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run one check.
    ///
    /// While notifications are disabled the whole check is skipped: nothing
    /// is announced and no reminder is flagged as sent. Remote failures are
    /// counted in the report and do not stop the check, and so is a failure
    /// to save the notified cache.
    pub async fn tick(&self) -> Result<TickReport> {
        let mut report = TickReport::default();
        if !self.notifier.is_enabled() {
            tracing::debug!("Notifications disabled, skipping reminder check");
            report.skipped = true;
            return Ok(report);
        }

        let now = self.clock.now();
        let horizon_ms = self.config.horizon.as_millis() as u64;
        let mut notified = self.notified.lock().await;

        match self.store.due_soon(now, horizon_ms).await {
            Ok(reminders) => {
                for reminder in reminders {
                    self.announce(&reminder, now, horizon_ms, &mut notified, &mut report)
                        .await;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to fetch due reminders: {}", e);
                report.failures += 1;
            }
        }

        match self.store.overdue(now).await {
            Ok(reminders) => {
                for reminder in reminders {
                    self.announce(&reminder, now, horizon_ms, &mut notified, &mut report)
                        .await;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to fetch overdue reminders: {}", e);
                report.failures += 1;
            }
        }

        if report.due_soon + report.overdue > 0 || report.failures > 0 {
            tracing::info!(
                due_soon = report.due_soon,
                overdue = report.overdue,
                delivered = report.delivered,
                failures = report.failures,
                "Reminder check finished"
            );
        }
        Ok(report)
    }

    /// Announce one fetched reminder according to its phase at `now`.
    async fn announce(
        &self,
        reminder: &Reminder,
        now: Timestamp,
        horizon_ms: u64,
        notified: &mut NotifiedCache,
        report: &mut TickReport,
    ) {
        let phase = reminder.phase(now, horizon_ms);
        let (key, notice) = match phase {
            ReminderPhase::DueSoon => (
                DedupeKey::DueSoon(reminder.id.clone()),
                Notice::due_soon(reminder, now),
            ),
            ReminderPhase::Overdue => (
                DedupeKey::Overdue(reminder.id.clone()),
                Notice::overdue(reminder),
            ),
            ReminderPhase::Pending | ReminderPhase::Sent => {
                tracing::debug!(reminder_id = %reminder.id, ?phase, "Reminder not announceable, skipping");
                return;
            }
        };
        if notified.contains(&key) {
            report.duplicates += 1;
            return;
        }

        if self.notifier.notify(&notice).await {
            report.delivered += 1;
        }
        if let Err(e) = notified.record(&key).await {
            tracing::warn!(reminder_id = %reminder.id, "Failed to save notified-reminder cache: {}", e);
            report.failures += 1;
        }
        match phase {
            ReminderPhase::Overdue => report.overdue += 1,
            _ => report.due_soon += 1,
        }

        match self.store.mark_sent(&reminder.id).await {
            Ok(_) => report.marked_sent += 1,
            Err(e) => {
                tracing::warn!(reminder_id = %reminder.id, "Failed to flag reminder as sent: {}", e);
                report.failures += 1;
            }
        }
    }

    /// Compact the notified cache. Returns the number of dropped keys.
    pub async fn cleanup(&self) -> Result<usize> {
        let dropped = self
            .notified
            .lock()
            .await
            .compact(self.config.dedupe)
            .await?;
        if dropped > 0 {
            tracing::debug!(dropped, "Compacted notified-reminder cache");
        }
        Ok(dropped)
    }

    /// Run checks and cleanups until shutdown.
    pub fn spawn(self: &Arc<Self>, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(scheduler.config.tick_interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let cleanup_period = scheduler.config.cleanup_interval;
            let mut cleanups =
                tokio::time::interval_at(tokio::time::Instant::now() + cleanup_period, cleanup_period);
            cleanups.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticks.tick() => {
                        if let Err(e) = scheduler.tick().await {
                            tracing::error!("Reminder check failed: {}", e);
                        }
                    }
                    _ = cleanups.tick() => {
                        if let Err(e) = scheduler.cleanup().await {
                            tracing::error!("Notified cache cleanup failed: {}", e);
                        }
                    }
                }
            }
            tracing::debug!("Reminder scheduler stopped");
        })
    }
}
