use anyhow::Result;
use b3_quote_monitor::cli::{Cli, Command, CommonArgs, ProviderKind};
use b3_quote_monitor::logging;
use b3_quote_monitor::monitor;
use b3_quote_monitor::provider::{MarketDataProvider, SimulatedProvider, YahooProvider};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let (common, command) = Cli::parse().into_parts();
    logging::set_level(common.log_level);

    match common.provider {
        ProviderKind::Yahoo => {
            let provider = YahooProvider::new(common.yahoo_config())?;
            dispatch(&common, command, provider).await
        }
        ProviderKind::Simulated => {
            dispatch(&common, command, SimulatedProvider::new(common.seed)).await
        }
    }
}

async fn dispatch<P: MarketDataProvider>(
    common: &CommonArgs,
    command: Command,
    provider: P,
) -> Result<()> {
    let mut config = common.monitor_config();
    match command {
        Command::Watch(args) => {
            args.apply(&mut config);
            monitor::watch(config, provider).await
        }
        Command::Snapshot(args) => {
            config.worker.auto_refresh = false;
            config.chart_width = args.width;
            config.chart_height = args.height;
            monitor::snapshot(config, provider, args.json).await
        }
        Command::Chart(args) => {
            config.chart_width = args.width;
            config.chart_height = args.height;
            monitor::chart_symbol(config, provider, &args.symbol).await
        }
        Command::Check => monitor::check(config, provider).await,
    }
}
