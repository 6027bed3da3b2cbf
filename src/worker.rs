use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time;

use crate::constants::{
    MAX_OBSERVATIONS, PROBE_SYMBOL, PROBE_WINDOW, REFRESH_DELAY_SECS, SYMBOL_PAUSE_MS,
};
use crate::logging;
use crate::model::{default_fetch_windows, FetchWindow, Instrument, RawHistory};
use crate::provider::{MarketDataProvider, ProviderError};
use crate::series::normalize;
use crate::store::QuoteStore;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub fallbacks: Vec<FetchWindow>,
    pub symbol_pause: Duration,
    pub refresh_delay: Duration,
    pub max_observations: usize,
    pub auto_refresh: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            fallbacks: default_fetch_windows(),
            symbol_pause: Duration::from_millis(SYMBOL_PAUSE_MS),
            refresh_delay: Duration::from_secs(REFRESH_DELAY_SECS),
            max_observations: MAX_OBSERVATIONS,
            auto_refresh: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Status(String),
    CycleFinished(CycleReport),
    CycleStopped,
    CycleFailed(String),
}

#[derive(Debug)]
struct WorkerFlags {
    in_progress: AtomicBool,
    active: AtomicBool,
    auto_refresh: AtomicBool,
    schedule_generation: AtomicU64,
}

/// Walks the roster, pulling recent history for each symbol into the store.
///
/// Cycles run on detached tokio tasks. A single `in_progress` flag keeps
/// manual and scheduled triggers from overlapping; `stop` is honoured between
/// symbols only, so a provider call already in flight always completes.
pub struct RefreshWorker<P> {
    provider: Arc<P>,
    store: QuoteStore,
    roster: Arc<Vec<Instrument>>,
    settings: Arc<WorkerSettings>,
    flags: Arc<WorkerFlags>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl<P> Clone for RefreshWorker<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            store: self.store.clone(),
            roster: Arc::clone(&self.roster),
            settings: Arc::clone(&self.settings),
            flags: Arc::clone(&self.flags),
            events: self.events.clone(),
        }
    }
}

impl<P: MarketDataProvider> RefreshWorker<P> {
    pub fn new(
        provider: P,
        store: QuoteStore,
        roster: Vec<Instrument>,
        settings: WorkerSettings,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let flags = WorkerFlags {
            in_progress: AtomicBool::new(false),
            active: AtomicBool::new(true),
            auto_refresh: AtomicBool::new(settings.auto_refresh),
            schedule_generation: AtomicU64::new(0),
        };
        let worker = Self {
            provider: Arc::new(provider),
            store,
            roster: Arc::new(roster),
            settings: Arc::new(settings),
            flags: Arc::new(flags),
            events,
        };
        (worker, rx)
    }

    pub fn store(&self) -> &QuoteStore {
        &self.store
    }

    pub fn roster(&self) -> &[Instrument] {
        &self.roster
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn is_active(&self) -> bool {
        self.flags.active.load(Ordering::SeqCst)
    }

    pub fn is_in_progress(&self) -> bool {
        self.flags.in_progress.load(Ordering::SeqCst)
    }

    pub fn auto_refresh(&self) -> bool {
        self.flags.auto_refresh.load(Ordering::SeqCst)
    }

    /// Enabling while idle arms the timer straight away; a running cycle
    /// arms it when it completes.
    pub fn set_auto_refresh(&self, enabled: bool) {
        self.flags.auto_refresh.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.flags.schedule_generation.fetch_add(1, Ordering::SeqCst);
        } else if !self.is_in_progress() {
            self.schedule_next();
        }
        logging::info(
            "refresh.auto_toggle",
            "Automatic refresh toggled",
            json!({ "enabled": enabled }),
        );
    }

    /// Cancel monitoring. A running cycle stops at the next symbol boundary
    /// and pending reschedules are dropped.
    pub fn stop(&self) {
        self.flags.active.store(false, Ordering::SeqCst);
        self.flags.schedule_generation.fetch_add(1, Ordering::SeqCst);
        logging::info_simple("refresh.stop", "Monitoring stopped");
        self.status("Monitoring stopped");
    }

    /// Spawn a detached refresh cycle. Returns `false` when one is already
    /// running.
    pub fn trigger(&self) -> bool {
        if self
            .flags
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            logging::debug(
                "refresh.busy",
                "Refresh already in progress, trigger ignored",
                json!({ "provider": self.provider.name() }),
            );
            return false;
        }
        self.flags.active.store(true, Ordering::SeqCst);

        let worker = self.clone();
        tokio::spawn(async move {
            let cycle = tokio::spawn({
                let worker = worker.clone();
                async move { worker.run_cycle().await }
            });
            let outcome = cycle.await;
            worker.flags.in_progress.store(false, Ordering::SeqCst);

            match outcome {
                Ok(Some(_)) => worker.schedule_next(),
                Ok(None) => {}
                Err(err) => {
                    logging::error(
                        "refresh.failed",
                        "Refresh cycle aborted unexpectedly",
                        json!({ "error": err.to_string() }),
                    );
                    worker.status(format!("Update error: {err}"));
                    worker.send(WorkerEvent::CycleFailed(err.to_string()));
                }
            }
        });
        true
    }

    fn schedule_next(&self) {
        if !self.auto_refresh() || !self.is_active() {
            return;
        }

        let generation = self.flags.schedule_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.settings.refresh_delay;
        logging::debug(
            "refresh.scheduled",
            "Next refresh scheduled",
            json!({ "delay_secs": delay.as_secs() }),
        );

        let worker = self.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            let current = worker.flags.schedule_generation.load(Ordering::SeqCst);
            if current == generation && worker.is_active() && worker.auto_refresh() {
                worker.trigger();
            }
        });
    }

    /// One pass over the roster. Returns `None` when the worker was stopped
    /// before the pass finished.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        let started_at = Utc::now();
        let total = self.roster.len();
        self.status("Starting data refresh...");
        logging::info(
            "refresh.start",
            "Refresh cycle started",
            json!({ "symbols": total, "provider": self.provider.name() }),
        );

        let mut updated = Vec::new();
        let mut skipped = Vec::new();

        for (idx, instrument) in self.roster.iter().enumerate() {
            if !self.is_active() {
                return self.cancelled(idx);
            }

            self.status(format!("Fetching {}...", instrument.name));
            if self.refresh_symbol(instrument).await {
                updated.push(instrument.symbol.clone());
            } else {
                skipped.push(instrument.symbol.clone());
            }

            let pause = self.settings.symbol_pause;
            if idx + 1 < total && !pause.is_zero() {
                time::sleep(pause).await;
            }
        }

        if !self.is_active() {
            return self.cancelled(total);
        }

        let completed_at = Utc::now();
        self.store.mark_refreshed(completed_at).await;
        logging::info(
            "refresh.complete",
            "Refresh cycle completed",
            json!({
                "updated": updated.len(),
                "skipped": skipped,
                "elapsed_ms": (completed_at - started_at).num_milliseconds(),
            }),
        );

        let report = CycleReport {
            started_at,
            completed_at,
            updated,
            skipped,
        };
        self.send(WorkerEvent::CycleFinished(report.clone()));
        Some(report)
    }

    fn cancelled(&self, processed: usize) -> Option<CycleReport> {
        logging::info(
            "refresh.cancelled",
            "Refresh cycle stopped before completion",
            json!({ "processed": processed, "symbols": self.roster.len() }),
        );
        self.send(WorkerEvent::CycleStopped);
        None
    }

    async fn refresh_symbol(&self, instrument: &Instrument) -> bool {
        let symbol = instrument.symbol.as_str();
        match self.fetch_with_fallback(symbol).await {
            Ok(Some(raw)) => match normalize(symbol, &raw, self.settings.max_observations) {
                Ok(series) => {
                    logging::debug(
                        "refresh.symbol_updated",
                        "Stored fresh series",
                        json!({ "symbol": symbol, "bars": series.len() }),
                    );
                    self.store.replace(series).await;
                    true
                }
                Err(err) => {
                    logging::warn(
                        "refresh.normalize_failed",
                        "Discarded unusable provider response",
                        json!({ "symbol": symbol, "error": err.to_string() }),
                    );
                    false
                }
            },
            Ok(None) => {
                logging::warn(
                    "refresh.no_data",
                    "No fallback window returned enough rows",
                    json!({ "symbol": symbol }),
                );
                false
            }
            Err(err) => {
                logging::warn(
                    "refresh.provider_error",
                    "Provider request failed, symbol skipped",
                    json!({ "symbol": symbol, "error": err.to_string() }),
                );
                false
            }
        }
    }

    /// Try each fallback window in order and return the first history with
    /// more than two rows. Errors on a window move on to the next one; the
    /// last error is returned only when no window produced any response.
    pub async fn fetch_with_fallback(
        &self,
        symbol: &str,
    ) -> Result<Option<RawHistory>, ProviderError> {
        let mut last_error = None;
        let mut answered = false;

        for window in &self.settings.fallbacks {
            match self.provider.fetch_history(symbol, window).await {
                Ok(history) if history.len() > 2 => return Ok(Some(history)),
                Ok(history) => {
                    answered = true;
                    logging::debug(
                        "provider.short_response",
                        "Window returned too few rows",
                        json!({
                            "symbol": symbol,
                            "window": window.to_string(),
                            "rows": history.len(),
                        }),
                    );
                }
                Err(err) => {
                    logging::debug(
                        "provider.window_failed",
                        "Window request failed",
                        json!({
                            "symbol": symbol,
                            "window": window.to_string(),
                            "error": err.to_string(),
                        }),
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if !answered => Err(err),
            _ => Ok(None),
        }
    }

    /// Connectivity check against a liquid symbol; returns the row count.
    pub async fn probe(&self) -> Result<usize, ProviderError> {
        let (interval, range) = PROBE_WINDOW;
        let history = self
            .provider
            .fetch_history(PROBE_SYMBOL, &FetchWindow::new(interval, range))
            .await?;
        Ok(history.len())
    }

    fn status(&self, message: impl Into<String>) {
        self.send(WorkerEvent::Status(message.into()));
    }

    fn send(&self, event: WorkerEvent) {
        let _ = self.events.send(event);
    }
}
