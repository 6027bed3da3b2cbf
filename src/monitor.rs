use std::io::BufRead;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::chart::{self, chart_series};
use crate::constants::MIN_CHART_POINTS;
use crate::logging;
use crate::model::{default_roster, Instrument, QuoteSeries};
use crate::provider::MarketDataProvider;
use crate::store::QuoteStore;
use crate::table;
use crate::worker::{CycleReport, RefreshWorker, WorkerEvent, WorkerSettings};

const CHART_TITLE: &str = "Price evolution - Brazilian equities";

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub roster: Vec<Instrument>,
    pub worker: WorkerSettings,
    pub chart_width: u32,
    pub chart_height: u32,
    pub min_chart_points: usize,
    pub interactive: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            roster: default_roster(),
            worker: WorkerSettings::default(),
            chart_width: 120,
            chart_height: 30,
            min_chart_points: MIN_CHART_POINTS,
            interactive: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Refresh,
    Stop,
    ToggleAutoRefresh,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Option<Control> {
    match line.trim().to_ascii_lowercase().as_str() {
        "r" | "refresh" | "g" | "start" => Some(Control::Refresh),
        "s" | "stop" => Some(Control::Stop),
        "a" | "auto" => Some(Control::ToggleAutoRefresh),
        "h" | "help" | "?" => Some(Control::Help),
        "q" | "quit" | "exit" => Some(Control::Quit),
        _ => None,
    }
}

pub fn print_status(message: &str) {
    println!("{} - {message}", Local::now().format("%H:%M:%S"));
}

fn print_help() {
    println!("Commands: [r]efresh now, [s]top, [a]uto-refresh toggle, [h]elp, [q]uit");
}

/// Continuous monitoring: refresh cycles on a timer, redraw on completion,
/// controlled from stdin and unix signals.
pub async fn watch<P: MarketDataProvider>(config: MonitorConfig, provider: P) -> Result<()> {
    let store = QuoteStore::new();
    let (worker, mut events) = RefreshWorker::new(
        provider,
        store.clone(),
        config.roster.clone(),
        config.worker.clone(),
    );

    print_status("Checking connection...");
    report_connectivity(&worker).await;

    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Control>();
    let signals_task = tokio::spawn(handle_signals(control_tx.clone()));
    if config.interactive {
        spawn_command_reader(control_tx.clone());
        print_help();
    }
    drop(control_tx);

    logging::info(
        "monitor.start",
        "Monitoring started",
        json!({
            "provider": worker.provider_name(),
            "symbols": config.roster.len(),
            "auto_refresh": worker.auto_refresh(),
            "refresh_delay_secs": config.worker.refresh_delay.as_secs(),
        }),
    );
    worker.trigger();

    let mut controls_open = true;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    WorkerEvent::Status(message) => print_status(&message),
                    WorkerEvent::CycleFinished(report) => {
                        redraw(&config, &store).await;
                        print_status(&format!(
                            "Data updated successfully! ({} updated, {} skipped)",
                            report.updated.len(),
                            report.skipped.len()
                        ));
                    }
                    WorkerEvent::CycleStopped => print_status("Refresh interrupted"),
                    WorkerEvent::CycleFailed(error) => {
                        print_status(&format!("Update error: {error}"));
                    }
                }
            }
            control = control_rx.recv(), if controls_open => {
                match control {
                    Some(Control::Refresh) => {
                        if !worker.trigger() {
                            print_status("Refresh already in progress");
                        }
                    }
                    Some(Control::Stop) => worker.stop(),
                    Some(Control::ToggleAutoRefresh) => {
                        let enabled = !worker.auto_refresh();
                        worker.set_auto_refresh(enabled);
                        let state = if enabled { "enabled" } else { "disabled" };
                        print_status(&format!("Automatic refresh {state}"));
                    }
                    Some(Control::Help) => print_help(),
                    Some(Control::Quit) => break,
                    None => controls_open = false,
                }
            }
        }
    }

    worker.stop();
    signals_task.abort();
    let _ = signals_task.await;
    logging::info_simple("monitor.stop", "Monitor shut down");
    Ok(())
}

async fn handle_signals(control_tx: mpsc::UnboundedSender<Control>) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("failed to register SIGHUP handler")?;

    loop {
        let (name, control) = tokio::select! {
            _ = sigterm.recv() => ("SIGTERM", Control::Quit),
            _ = sigint.recv() => ("SIGINT", Control::Quit),
            _ = sighup.recv() => ("SIGHUP", Control::Refresh),
        };
        logging::info(
            "signal.received",
            "Signal received",
            json!({ "signal": name }),
        );
        if control_tx.send(control).is_err() || control == Control::Quit {
            break;
        }
    }

    Ok(())
}

// A plain thread keeps a blocked stdin read from holding up runtime shutdown.
fn spawn_command_reader(control_tx: mpsc::UnboundedSender<Control>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let control = parse_command(&line).unwrap_or(Control::Help);
            if control_tx.send(control).is_err() {
                break;
            }
        }
    });
}

async fn report_connectivity<P: MarketDataProvider>(worker: &RefreshWorker<P>) -> bool {
    match worker.probe().await {
        Ok(rows) => {
            logging::info(
                "monitor.probe",
                "Provider reachable",
                json!({ "provider": worker.provider_name(), "rows": rows }),
            );
            print_status("Connected - ready to start");
            true
        }
        Err(err) => {
            logging::warn(
                "monitor.probe_failed",
                "Provider unreachable",
                json!({ "provider": worker.provider_name(), "error": err.to_string() }),
            );
            print_status("No connection - check your internet access");
            false
        }
    }
}

async fn redraw(config: &MonitorConfig, store: &QuoteStore) {
    let snapshot = store.snapshot().await;
    let rows = table::build_rows(&config.roster, &snapshot);
    println!();
    print!("{}", table::render(&rows));
    println!();
    let series = chart_series(&config.roster, &snapshot, config.min_chart_points);
    chart::print_chart(CHART_TITLE, &series, config.chart_width, config.chart_height);
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    last_refresh: Option<DateTime<Utc>>,
    report: &'a CycleReport,
    series: Vec<&'a QuoteSeries>,
}

/// Run one cycle in the foreground while statuses are echoed as they arrive.
/// Dropping the worker closes the channel, so every status sent before the
/// cycle returned is handled before this returns.
async fn run_echoed_cycle<P: MarketDataProvider>(
    worker: RefreshWorker<P>,
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    echo: bool,
) -> (Option<CycleReport>, Vec<String>) {
    let printer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            if let WorkerEvent::Status(message) = event {
                if echo {
                    print_status(&message);
                }
                seen.push(message);
            }
        }
        seen
    });

    let report = worker.run_cycle().await;
    drop(worker);
    let seen = printer.await.unwrap_or_default();
    (report, seen)
}

/// Run a single cycle, print the result and exit.
pub async fn snapshot<P: MarketDataProvider>(
    config: MonitorConfig,
    provider: P,
    as_json: bool,
) -> Result<()> {
    let store = QuoteStore::new();
    let (worker, events) = RefreshWorker::new(
        provider,
        store.clone(),
        config.roster.clone(),
        config.worker.clone(),
    );

    let (report, _) = run_echoed_cycle(worker, events, !as_json).await;
    let Some(report) = report else {
        bail!("refresh cycle did not complete");
    };

    if as_json {
        let snapshot = store.snapshot().await;
        let series = config
            .roster
            .iter()
            .filter_map(|instrument| snapshot.get(&instrument.symbol))
            .collect();
        let output = SnapshotOutput {
            last_refresh: snapshot.last_refresh,
            report: &report,
            series,
        };
        let payload =
            serde_json::to_string_pretty(&output).context("serialize snapshot output")?;
        println!("{payload}");
        return Ok(());
    }

    redraw(&config, &store).await;
    print_status(&format!(
        "Data updated successfully! ({} updated, {} skipped)",
        report.updated.len(),
        report.skipped.len()
    ));
    Ok(())
}

/// Fetch one symbol and plot its closes on a full-size chart.
pub async fn chart_symbol<P: MarketDataProvider>(
    mut config: MonitorConfig,
    provider: P,
    symbol: &str,
) -> Result<()> {
    let instrument = config
        .roster
        .iter()
        .chain(default_roster().iter())
        .find(|instrument| instrument.symbol.eq_ignore_ascii_case(symbol))
        .cloned()
        .unwrap_or_else(|| Instrument::from_symbol(symbol));
    config.roster = vec![instrument.clone()];

    let store = QuoteStore::new();
    let (worker, _events) = RefreshWorker::new(
        provider,
        store.clone(),
        config.roster.clone(),
        config.worker.clone(),
    );

    let series = worker
        .fetch_with_fallback(&instrument.symbol)
        .await
        .with_context(|| format!("failed to fetch history for {}", instrument.symbol))?;
    let Some(raw) = series else {
        bail!("no usable history for {}", instrument.symbol);
    };
    let normalized = crate::series::normalize(
        &instrument.symbol,
        &raw,
        config.worker.max_observations,
    )
    .with_context(|| format!("unusable history for {}", instrument.symbol))?;
    store.replace(normalized).await;

    let snapshot = store.snapshot().await;
    let plotted = chart_series(&config.roster, &snapshot, 1);
    chart::print_chart(
        &instrument.to_string(),
        &plotted,
        config.chart_width,
        config.chart_height,
    );
    Ok(())
}

/// Probe the provider once and fail when it is unreachable.
pub async fn check<P: MarketDataProvider>(config: MonitorConfig, provider: P) -> Result<()> {
    let (worker, _events) =
        RefreshWorker::new(provider, QuoteStore::new(), config.roster, config.worker);
    if !report_connectivity(&worker).await {
        bail!("provider {} is unreachable", worker.provider_name());
    }
    Ok(())
}
