use chrono::{DateTime, Local, Utc};

use crate::model::{Instrument, QuoteSeries};
use crate::store::StoreSnapshot;

const HEADERS: [&str; 7] = [
    "Ação",
    "Último Preço (R$)",
    "Variação %",
    "Mínimo",
    "Máximo",
    "Volume",
    "Atualização",
];
const WIDTHS: [usize; 7] = [30, 18, 12, 12, 12, 10, 11];

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRow {
    pub label: String,
    pub last: String,
    pub change: String,
    pub low: String,
    pub high: String,
    pub volume: String,
    pub updated: String,
}

impl QuoteRow {
    fn cells(&self) -> [&str; 7] {
        [
            self.label.as_str(),
            self.last.as_str(),
            self.change.as_str(),
            self.low.as_str(),
            self.high.as_str(),
            self.volume.as_str(),
            self.updated.as_str(),
        ]
    }
}

/// Human-readable volume: `Bi`, `Mi` and `Mil` suffixes above the
/// respective thresholds.
pub fn format_volume(volume: f64) -> String {
    if !volume.is_finite() {
        return "N/A".to_string();
    }
    if volume >= 1_000_000_000.0 {
        format!("{:.1} Bi", volume / 1_000_000_000.0)
    } else if volume >= 1_000_000.0 {
        format!("{:.1} Mi", volume / 1_000_000.0)
    } else if volume >= 1_000.0 {
        format!("{:.1} Mil", volume / 1_000.0)
    } else {
        format!("{volume:.0}")
    }
}

pub fn format_change(change: f64) -> String {
    let arrow = if change < 0.0 { '▼' } else { '▲' };
    format!("{arrow} {change:+.2}%")
}

pub fn format_price(price: f64) -> String {
    format!("R$ {price:.2}")
}

/// Build a table row, or `None` when the series is too short to compare.
pub fn quote_row(
    instrument: &Instrument,
    series: &QuoteSeries,
    updated: DateTime<Utc>,
) -> Option<QuoteRow> {
    if series.len() < 2 {
        return None;
    }
    let last = series.last()?;
    let change = series.change_pct()?;

    Some(QuoteRow {
        label: instrument.to_string(),
        last: format_price(last.close),
        change: format_change(change),
        low: format_price(series.period_low().unwrap_or(last.close)),
        high: format_price(series.period_high().unwrap_or(last.close)),
        volume: format_volume(last.volume as f64),
        updated: updated.with_timezone(&Local).format("%H:%M:%S").to_string(),
    })
}

/// Rows in roster order for every instrument with a usable series.
pub fn build_rows(roster: &[Instrument], snapshot: &StoreSnapshot) -> Vec<QuoteRow> {
    let updated = snapshot.last_refresh.unwrap_or_else(Utc::now);
    roster
        .iter()
        .filter_map(|instrument| {
            let series = snapshot.get(&instrument.symbol)?;
            quote_row(instrument, series, updated)
        })
        .collect()
}

pub fn render(rows: &[QuoteRow]) -> String {
    let mut out = String::new();
    push_line(&mut out, HEADERS);
    let rule: Vec<String> = WIDTHS.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in rows {
        push_line(&mut out, row.cells());
    }
    out
}

fn push_line(out: &mut String, cells: [&str; 7]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(WIDTHS)
        .map(|(cell, width)| pad(cell, width))
        .collect();
    out.push_str(padded.join(" | ").trim_end());
    out.push('\n');
}

// Width counts chars so accented names line up.
fn pad(cell: &str, width: usize) -> String {
    let len = cell.chars().count();
    if len >= width {
        cell.chars().take(width).collect()
    } else {
        format!("{cell}{}", " ".repeat(width - len))
    }
}
