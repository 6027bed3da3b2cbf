pub const REFRESH_DELAY_SECS: u64 = 120;
pub const SYMBOL_PAUSE_MS: u64 = 500;
pub const MAX_OBSERVATIONS: usize = 50;
pub const MIN_CHART_POINTS: usize = 5;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const YAHOO_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) b3-quote-monitor/0.1";
pub const PROBE_SYMBOL: &str = "PETR4.SA";
pub const PROBE_WINDOW: (&str, &str) = ("1h", "1d");

/// (interval, range) pairs tried in order until one returns more than two rows.
pub const DEFAULT_FETCH_WINDOWS: [(&str, &str); 3] = [("15m", "1d"), ("1h", "2d"), ("1d", "5d")];
