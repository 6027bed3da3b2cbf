use chrono::{DateTime, Local, Utc};
use textplots::{Chart, Plot, Shape};

use crate::model::Instrument;
use crate::store::StoreSnapshot;
use crate::table::format_price;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    pub points: Vec<(f32, f32)>,
    pub last_close: f64,
}

/// Close-price lines for every roster symbol holding more than `min_points`
/// bars. The x axis is hours since the earliest plotted bar.
pub fn chart_series(
    roster: &[Instrument],
    snapshot: &StoreSnapshot,
    min_points: usize,
) -> Vec<ChartSeries> {
    let plotted: Vec<_> = roster
        .iter()
        .filter_map(|instrument| {
            let series = snapshot.get(&instrument.symbol)?;
            (series.len() > min_points).then_some((instrument, series))
        })
        .collect();

    let Some(origin) = plotted
        .iter()
        .filter_map(|(_, series)| series.bars.first().map(|bar| bar.timestamp))
        .min()
    else {
        return Vec::new();
    };

    plotted
        .into_iter()
        .filter_map(|(instrument, series)| {
            Some(ChartSeries {
                label: instrument.name.clone(),
                points: series
                    .closes()
                    .map(|(at, close)| (hours_since(origin, at), close as f32))
                    .collect(),
                last_close: series.last_close()?,
            })
        })
        .collect()
}

fn hours_since(origin: DateTime<Utc>, at: DateTime<Utc>) -> f32 {
    (at - origin).num_seconds() as f32 / 3600.0
}

/// Print every series on one chart followed by a legend. Prints a
/// placeholder when nothing qualifies for plotting.
pub fn print_chart(title: &str, series: &[ChartSeries], width: u32, height: u32) {
    if series.is_empty() {
        println!("{title}: no series with enough data to plot yet");
        println!("Waiting for the first refresh cycle to complete...");
        return;
    }

    let max_x = series
        .iter()
        .filter_map(|s| s.points.last().map(|(x, _)| *x))
        .fold(0.0_f32, f32::max)
        .max(1e-3);

    let (min_price, max_price) = series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, y)| *y))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), y| {
            (lo.min(y), hi.max(y))
        });

    println!("{title}");
    println!("Price range: R$ {min_price:.2} → R$ {max_price:.2} over {max_x:.1}h");

    let shapes: Vec<Shape> = series.iter().map(|s| Shape::Lines(&s.points)).collect();
    let mut chart = Chart::new(width.max(40), height.max(10), 0.0, max_x);
    let mut plot = &mut chart;
    for shape in &shapes {
        plot = plot.lineplot(shape);
    }
    plot.display();

    for s in series {
        println!(
            "  {:<18} {:>3} bars  last {}",
            s.label,
            s.points.len(),
            format_price(s.last_close)
        );
    }
    println!(
        "  rendered at {}",
        Local::now().format("%H:%M:%S %d/%m")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuoteBar, QuoteSeries};

    fn series(symbol: &str, start: i64, count: usize) -> QuoteSeries {
        QuoteSeries {
            symbol: symbol.to_string(),
            bars: (0..count)
                .map(|i| QuoteBar {
                    timestamp: DateTime::from_timestamp(start + i as i64 * 3600, 0).unwrap(),
                    open: 10.0,
                    high: 10.0,
                    low: 10.0,
                    close: 10.0 + i as f64,
                    volume: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn only_series_longer_than_threshold_are_plotted() {
        let roster = vec![
            Instrument::new("PETR4.SA", "Petrobras"),
            Instrument::new("VALE3.SA", "Vale"),
        ];
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .series
            .insert("PETR4.SA".into(), series("PETR4.SA", 7_200, 8));
        snapshot
            .series
            .insert("VALE3.SA".into(), series("VALE3.SA", 0, 5));

        let plotted = chart_series(&roster, &snapshot, 5);
        assert_eq!(plotted.len(), 1);
        assert_eq!(plotted[0].label, "Petrobras");
        assert_eq!(plotted[0].points[0], (0.0, 10.0));
        assert_eq!(plotted[0].points[7], (7.0, 17.0));
        assert_eq!(plotted[0].last_close, 17.0);
    }

    #[test]
    fn x_axis_starts_at_earliest_plotted_bar() {
        let roster = vec![
            Instrument::new("PETR4.SA", "Petrobras"),
            Instrument::new("VALE3.SA", "Vale"),
        ];
        let mut snapshot = StoreSnapshot::default();
        snapshot
            .series
            .insert("PETR4.SA".into(), series("PETR4.SA", 7_200, 6));
        snapshot
            .series
            .insert("VALE3.SA".into(), series("VALE3.SA", 0, 6));

        let plotted = chart_series(&roster, &snapshot, 5);
        assert_eq!(plotted[0].points[0].0, 2.0);
        assert_eq!(plotted[1].points[0].0, 0.0);
    }

    #[test]
    fn empty_snapshot_has_nothing_to_plot() {
        let plotted = chart_series(&[], &StoreSnapshot::default(), 5);
        assert!(plotted.is_empty());
        print_chart("empty", &plotted, 80, 20);
    }
}
