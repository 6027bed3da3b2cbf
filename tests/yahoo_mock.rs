use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use b3_quote_monitor::{
    logging::{self, Level},
    model::{FetchWindow, Instrument},
    provider::{MarketDataProvider, ProviderError, YahooConfig, YahooProvider},
    store::QuoteStore,
    worker::{RefreshWorker, WorkerSettings},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn chart_body(rows: usize) -> serde_json::Value {
    let timestamps: Vec<i64> = (0..rows as i64).map(|i| 1_716_382_800 + i * 900).collect();
    let closes: Vec<Option<f64>> = (0..rows)
        .map(|i| if i == 1 { None } else { Some(38.0 + i as f64 * 0.1) })
        .collect();
    json!({
        "chart": {
            "result": [{
                "meta": { "currency": "BRL" },
                "timestamp": timestamps,
                "indicators": { "quote": [{
                    "open": closes,
                    "high": closes,
                    "low": closes,
                    "close": closes,
                    "volume": vec![1_000u64; rows],
                }]}
            }],
            "error": null
        }
    })
}

async fn chart(
    Path(symbol): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let interval = params.get("interval").map(String::as_str).unwrap_or_default();
    match (symbol.as_str(), interval) {
        ("BAD.SA", _) => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({
                "chart": {
                    "result": null,
                    "error": {
                        "code": "Not Found",
                        "description": "No data found, symbol may be delisted"
                    }
                }
            })),
        ),
        // Thin intraday data forces the worker onto the hourly window.
        (_, "15m") => (StatusCode::OK, axum::Json(chart_body(2))),
        (_, "1h") => (StatusCode::OK, axum::Json(chart_body(12))),
        _ => (StatusCode::OK, axum::Json(chart_body(5))),
    }
}

async fn start_mock() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    let app = Router::new().route("/v8/finance/chart/:symbol", get(chart));
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, handle)
}

fn provider(addr: SocketAddr) -> YahooProvider {
    YahooProvider::new(YahooConfig {
        base_url: format!("http://{addr}"),
        timeout: Duration::from_secs(5),
        ..YahooConfig::default()
    })
    .expect("client")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetches_and_parses_chart_endpoint() {
    let (addr, server) = start_mock().await;
    let provider = provider(addr);

    let history = provider
        .fetch_history("PETR4.SA", &FetchWindow::new("1h", "2d"))
        .await
        .expect("history");
    assert_eq!(history.len(), 12);
    assert_eq!(history.close.as_ref().unwrap()[1], None);

    match provider
        .fetch_history("BAD.SA", &FetchWindow::new("1h", "2d"))
        .await
    {
        Err(ProviderError::Api { code, .. }) => assert_eq!(code, "Not Found"),
        other => panic!("expected api error, got {other:?}"),
    }

    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_falls_back_and_skips_failing_symbol() {
    logging::set_level(Level::Error);
    let (addr, server) = start_mock().await;
    let store = QuoteStore::new();
    let roster = vec![
        Instrument::new("PETR4.SA", "Petrobras"),
        Instrument::new("BAD.SA", "Delisted"),
        Instrument::new("VALE3.SA", "Vale"),
    ];
    let settings = WorkerSettings {
        symbol_pause: Duration::ZERO,
        auto_refresh: false,
        ..WorkerSettings::default()
    };
    let (worker, _events) = RefreshWorker::new(provider(addr), store.clone(), roster, settings);

    let report = worker.run_cycle().await.expect("cycle completes");
    assert_eq!(report.updated, vec!["PETR4.SA", "VALE3.SA"]);
    assert_eq!(report.skipped, vec!["BAD.SA"]);

    let petr = store.get("PETR4.SA").await.expect("PETR4 stored");
    assert_eq!(petr.len(), 12, "hourly window used after thin intraday reply");
    assert_eq!(petr.bars[1].close, petr.bars[0].close, "gap forward-filled");
    assert!(!store.contains("BAD.SA").await);

    server.abort();
}
