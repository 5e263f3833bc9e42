//! Run scheduling: one controller invocation per tick.
//!
//! Runs are awaited inline, so two invocations never overlap; a run that
//! overshoots its slot simply delays the next tick. Shutdown is observed
//! only between runs.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::pipeline::controller::RunController;

/// When to fire the controller.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fixed period; the first run happens one period after start.
    Interval(Duration),
    /// Cron expression (seconds field first, as the `cron` crate expects).
    Cron(Box<cron::Schedule>),
}

impl Schedule {
    pub fn cron(expr: &str) -> Result<Self, ConfigError> {
        let schedule = cron::Schedule::from_str(expr).map_err(|e| ConfigError::InvalidValue {
            key: "ORTOGRA_CRON".into(),
            message: format!("invalid cron '{expr}': {e}"),
        })?;
        Ok(Self::Cron(Box::new(schedule)))
    }

    /// Delay from `now` until the next cron fire. `None` for intervals or
    /// exhausted schedules.
    pub fn next_cron_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Interval(_) => None,
            Self::Cron(schedule) => schedule
                .after(&now)
                .next()
                .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO)),
        }
    }
}

/// Spawn the run loop. Call `notify_one()` on the returned handle to stop
/// it after the current run.
pub fn spawn_run_ticker(
    mut controller: RunController,
    schedule: Schedule,
) -> (JoinHandle<()>, Arc<Notify>) {
    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        match &schedule {
            Schedule::Interval(period) => {
                info!(minutes = period.as_secs() / 60, "Run ticker started");
                let mut ticker = tokio::time::interval(*period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // Skip immediate first tick
                ticker.tick().await;

                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown.notified() => break,
                        _ = ticker.tick() => {}
                    }
                    controller.run_once().await;
                }
            }
            Schedule::Cron(_) => {
                info!("Cron run ticker started");
                loop {
                    let Some(delay) = schedule.next_cron_delay(Utc::now()) else {
                        warn!("Cron schedule has no upcoming fire time, stopping");
                        break;
                    };
                    tokio::select! {
                        biased;
                        _ = shutdown.notified() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    controller.run_once().await;
                }
            }
        }
        info!("Run ticker stopped");
    });

    (handle, shutdown_signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::channels::StatusTransport;
    use crate::config::BotConfig;
    use crate::error::{ClassificationError, TransportError};
    use crate::lang::{Classification, LanguageClassifier};
    use crate::pipeline::controller::RunDeps;
    use crate::pipeline::rules::RuleCatalog;
    use crate::pipeline::types::{PostedStatus, SearchCandidate};
    use crate::store::LibSqlBackend;

    /// Transport whose search takes `latency` and counts overlapping calls.
    struct SlowSearch {
        latency: Duration,
        runs: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl StatusTransport for SlowSearch {
        fn name(&self) -> &str {
            "slow"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchCandidate>, TransportError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn post(
            &self,
            text: &str,
            _in_reply_to: Option<&str>,
        ) -> Result<PostedStatus, TransportError> {
            Ok(PostedStatus {
                id: "0".into(),
                text: text.into(),
            })
        }
    }

    struct Spanish;

    impl LanguageClassifier for Spanish {
        fn classify(&self, _text: &str) -> Result<Classification, ClassificationError> {
            Ok(Classification {
                language: "es".into(),
                confidence: 1.0,
            })
        }
    }

    async fn slow_controller(latency: Duration) -> (RunController, Arc<SlowSearch>) {
        let transport = Arc::new(SlowSearch {
            latency,
            runs: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let deps = RunDeps {
            transport: transport.clone(),
            classifier: Arc::new(Spanish),
            store: Arc::new(LibSqlBackend::new_memory().await.unwrap()),
        };
        let mut config = BotConfig::new("ortograbot");
        config.seed = Some(1);
        let controller = RunController::new(&config, RuleCatalog::default_rules(), deps).unwrap();
        (controller, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_never_overlaps_runs() {
        // Each run outlasts the period.
        let (controller, transport) = slow_controller(Duration::from_secs(90)).await;
        let (handle, shutdown) =
            spawn_run_ticker(controller, Schedule::Interval(Duration::from_secs(60)));

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        shutdown.notify_one();
        handle.await.unwrap();

        assert!(transport.runs.load(Ordering::SeqCst) >= 3);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(transport.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_ticker_between_runs() {
        let (controller, transport) = slow_controller(Duration::from_secs(1)).await;
        let (handle, shutdown) =
            spawn_run_ticker(controller, Schedule::Interval(Duration::from_secs(60)));

        // First run fires one period after start.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.runs.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(transport.runs.load(Ordering::SeqCst), 1);

        shutdown.notify_one();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert_eq!(transport.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cron_delay_until_next_quarter_hour() {
        let schedule = Schedule::cron("0 */15 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 5, 0).unwrap();
        assert_eq!(
            schedule.next_cron_delay(now),
            Some(Duration::from_secs(10 * 60))
        );
    }

    #[test]
    fn interval_has_no_cron_delay() {
        let schedule = Schedule::Interval(Duration::from_secs(60));
        assert!(schedule.next_cron_delay(Utc::now()).is_none());
    }

    #[test]
    fn invalid_cron_is_config_error() {
        assert!(matches!(
            Schedule::cron("every tuesday"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
