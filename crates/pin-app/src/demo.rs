//! Demo chart definitions

use std::sync::Arc;

use anyhow::{Context as _, Result};
use pin_core::{ChartConfig, ChartKind, DataPoint, FieldValue, Formatters, SeriesKind, SeriesSpec};

const REVENUE_JSON: &str = include_str!("../assets/revenue.json");

/// A chart to mount: its configuration plus display callbacks
pub struct DemoChart {
    pub config: ChartConfig,
    pub formatters: Formatters,
}

/// Every demo chart, in display order
pub fn demo_charts() -> Result<Vec<DemoChart>> {
    Ok(vec![
        revenue_chart()?,
        DemoChart {
            config: traffic_chart(),
            formatters: Formatters::default(),
        },
        DemoChart {
            config: latency_chart(),
            formatters: Formatters {
                axis: Arc::new(|v: f64| format!("{:.0} ms", v)),
                ..Formatters::default()
            },
        },
        DemoChart {
            config: defects_chart(),
            formatters: Formatters::default(),
        },
    ])
}

fn revenue_chart() -> Result<DemoChart> {
    let config = ChartConfig::from_json(REVENUE_JSON).context("Invalid bundled revenue chart")?;
    let formatters = Formatters {
        axis: Arc::new(|v: f64| format!("${}", pin_core::scale::format_compact(v))),
        value: Arc::new(|key: &str, value: &FieldValue| match value {
            FieldValue::Number(n) if key != "quarter" => format!("${:.0}", n),
            other => other.to_string(),
        }),
        ..Formatters::default()
    };
    Ok(DemoChart { config, formatters })
}

fn traffic_chart() -> ChartConfig {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let visits = [4200.0, 4810.0, 5120.0, 4975.0, 5630.0, 3120.0, 2890.0];
    let signups = [310.0, 355.0, 402.0, 388.0, 451.0, 198.0, 176.0];

    ChartConfig {
        title: "Weekly traffic".to_string(),
        kind: ChartKind::Area,
        category_key: "day".to_string(),
        series: vec![
            SeriesSpec::new(SeriesKind::Area, "visits"),
            SeriesSpec::new(SeriesKind::Area, "signups"),
        ],
        rows: days
            .iter()
            .zip(visits.iter().zip(signups.iter()))
            .map(|(day, (v, s))| {
                row(&[
                    ("day", FieldValue::from(*day)),
                    ("visits", (*v).into()),
                    ("signups", (*s).into()),
                ])
            })
            .collect(),
        ..ChartConfig::default()
    }
}

fn latency_chart() -> ChartConfig {
    let p50 = [42.0, 45.0, 41.0, 58.0, 61.0, 47.0, 44.0, 43.0, 52.0, 49.0, 46.0, 44.0];
    let p99 = [180.0, 210.0, 175.0, 340.0, 395.0, 220.0, 190.0, 185.0, 260.0, 240.0, 205.0, 198.0];

    ChartConfig {
        title: "API latency".to_string(),
        kind: ChartKind::Line,
        category_key: "hour".to_string(),
        series: vec![
            SeriesSpec::new(SeriesKind::Line, "p50"),
            SeriesSpec::new(SeriesKind::Line, "p99"),
        ],
        rows: (0..p50.len())
            .map(|i| {
                row(&[
                    ("hour", FieldValue::from(format!("{:02}:00", i * 2))),
                    ("p50", p50[i].into()),
                    ("p99", p99[i].into()),
                    ("incident", FieldValue::Bool(p99[i] > 300.0)),
                ])
            })
            .collect(),
        ..ChartConfig::default()
    }
}

fn defects_chart() -> ChartConfig {
    let lines = [
        ("Line A", 12.0, -3.0),
        ("Line B", 7.0, 2.0),
        ("Line C", 19.0, -6.0),
        ("Line D", 4.0, 1.0),
    ];

    ChartConfig {
        title: "Defects by line".to_string(),
        kind: ChartKind::Bar,
        category_key: "line".to_string(),
        series: vec![
            SeriesSpec::new(SeriesKind::Bar, "defects"),
            SeriesSpec::new(SeriesKind::Bar, "change"),
        ],
        palette: vec!["#4c78a8".to_string(), "#f58518".to_string()],
        rows: lines
            .iter()
            .map(|(name, defects, change)| {
                row(&[
                    ("line", FieldValue::from(*name)),
                    ("defects", (*defects).into()),
                    ("change", (*change).into()),
                    ("owner", FieldValue::Null),
                ])
            })
            .collect(),
        ..ChartConfig::default()
    }
}

fn row(fields: &[(&str, FieldValue)]) -> DataPoint {
    fields
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
