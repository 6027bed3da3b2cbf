use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::constants::{REFRESH_DELAY_SECS, SYMBOL_PAUSE_MS};
use crate::logging::Level;
use crate::model::{default_fetch_windows, default_roster, FetchWindow, Instrument};
use crate::monitor::MonitorConfig;
use crate::provider::YahooConfig;

#[derive(Debug, Parser)]
#[command(author, version, about = "Brazilian equities quote monitor")]
pub struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn into_parts(self) -> (CommonArgs, Command) {
        (self.common, self.command.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Yahoo Finance chart API
    Yahoo,
    /// Offline random walk
    Simulated,
}

#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Market data source
    #[arg(long, value_enum, default_value_t = ProviderKind::Yahoo, global = true)]
    pub provider: ProviderKind,

    /// Seed for the simulated provider
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Monitor these symbols instead of the default roster (repeatable)
    #[arg(long = "symbol", global = true)]
    pub symbols: Vec<String>,

    /// Interval to try before the default fallbacks
    #[arg(long, global = true, value_parser = ["5m", "15m", "1h"])]
    pub interval: Option<String>,

    /// Pause between symbols in milliseconds
    #[arg(long, default_value_t = SYMBOL_PAUSE_MS, global = true)]
    pub pause_ms: u64,

    /// Override the Yahoo Finance base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Minimum level of the JSON log written to stderr
    #[arg(long, value_enum, default_value_t = Level::Info, global = true)]
    pub log_level: Level,
}

impl CommonArgs {
    pub fn yahoo_config(&self) -> YahooConfig {
        let mut config = YahooConfig::default();
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        config
    }

    pub fn roster(&self) -> Vec<Instrument> {
        if self.symbols.is_empty() {
            return default_roster();
        }
        let known = default_roster();
        self.symbols
            .iter()
            .map(|symbol| {
                let symbol = symbol.trim().to_ascii_uppercase();
                known
                    .iter()
                    .find(|instrument| instrument.symbol == symbol)
                    .cloned()
                    .unwrap_or_else(|| Instrument::from_symbol(&symbol))
            })
            .collect()
    }

    pub fn fetch_windows(&self) -> Vec<FetchWindow> {
        let mut windows = default_fetch_windows();
        let Some(interval) = &self.interval else {
            return windows;
        };
        if windows.first().map(|w| &w.interval) == Some(interval) {
            return windows;
        }
        let mut preferred = FetchWindow::new(interval.clone(), "1d");
        if preferred.interval_minutes().map_or(true, |minutes| minutes > 60) {
            preferred.range = "5d".to_string();
        }
        windows.insert(0, preferred);
        windows
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig {
            roster: self.roster(),
            ..MonitorConfig::default()
        };
        config.worker.fallbacks = self.fetch_windows();
        config.worker.symbol_pause = Duration::from_millis(self.pause_ms);
        config
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refresh continuously and redraw the table and chart after every cycle
    Watch(WatchArgs),
    /// Run one refresh cycle, print the table and chart, then exit
    Snapshot(SnapshotArgs),
    /// Plot the recent closes of a single symbol
    Chart(ChartArgs),
    /// Check that the market data provider is reachable
    Check,
}

impl Default for Command {
    fn default() -> Self {
        Command::Watch(WatchArgs::default())
    }
}

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    /// Disable the automatic refresh timer
    #[arg(long)]
    pub no_auto_refresh: bool,

    /// Seconds between automatic refresh cycles
    #[arg(long, default_value_t = REFRESH_DELAY_SECS)]
    pub refresh_secs: u64,

    /// Ignore commands on stdin
    #[arg(long)]
    pub no_input: bool,

    /// Chart width in characters
    #[arg(long, default_value_t = 120)]
    pub width: u32,

    /// Chart height in characters
    #[arg(long, default_value_t = 30)]
    pub height: u32,
}

impl Default for WatchArgs {
    fn default() -> Self {
        Self {
            no_auto_refresh: false,
            refresh_secs: REFRESH_DELAY_SECS,
            no_input: false,
            width: 120,
            height: 30,
        }
    }
}

impl WatchArgs {
    pub fn apply(&self, config: &mut MonitorConfig) {
        config.worker.auto_refresh = !self.no_auto_refresh;
        config.worker.refresh_delay = Duration::from_secs(self.refresh_secs.max(1));
        config.interactive = !self.no_input;
        config.chart_width = self.width;
        config.chart_height = self.height;
    }
}

#[derive(Debug, Args, Clone)]
pub struct SnapshotArgs {
    /// Print the stored series as JSON instead of the table and chart
    #[arg(long)]
    pub json: bool,

    /// Chart width in characters
    #[arg(long, default_value_t = 120)]
    pub width: u32,

    /// Chart height in characters
    #[arg(long, default_value_t = 30)]
    pub height: u32,
}

#[derive(Debug, Args, Clone)]
pub struct ChartArgs {
    /// Symbol to plot (e.g. PETR4.SA)
    pub symbol: String,

    /// Chart width in characters
    #[arg(long, default_value_t = 160)]
    pub width: u32,

    /// Chart height in characters
    #[arg(long, default_value_t = 40)]
    pub height: u32,
}
