//! Terminal rendering of heat maps and session counters.

use colored::Colorize;
use std::fmt::Write as _;
use tabled::{settings::Style, Table, Tabled};

use qnut_signal::{HeatMap, SessionStats};

/// Shading ramp, darkest last.
pub const SHADES: [char; 10] = [' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Heat map drawing options.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Emit ANSI colors.
    pub color: bool,
    /// Maximum spectrum columns; wider maps are folded by taking the
    /// maximum of adjacent bins.
    pub max_columns: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: true,
            max_columns: 64,
        }
    }
}

/// Shade character for a value in `[0, 1]`.
pub fn shade(value: f64) -> char {
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let idx = (v * (SHADES.len() - 1) as f64).round() as usize;
    SHADES[idx.min(SHADES.len() - 1)]
}

/// Fold `values` into at most `columns` cells, each the max of its group.
pub fn fold_columns(values: &[f64], columns: usize) -> Vec<f64> {
    if values.is_empty() || columns == 0 {
        return Vec::new();
    }
    let group = values.len().div_ceil(columns);
    values
        .chunks(group)
        .map(|chunk| chunk.iter().cloned().fold(0.0_f64, f64::max))
        .collect()
}

/// Draw `map` as text, one line per speed bucket, slowest first.
pub fn render_heat_map(map: &HeatMap, options: &RenderOptions) -> String {
    let mut out = String::new();
    if map.is_empty() {
        let _ = writeln!(out, "no speed bucket has a complete window yet");
        return out;
    }

    let first_bin = map.confidence_bins.min(map.bins());
    let last_bin = map.bins().saturating_sub(1);
    let header = format!("{:>9} {:>5} {:>4} | bins {}-{}", "km/h", "conf", "n", first_bin, last_bin);
    if options.color {
        let _ = writeln!(out, "{}", header.bold());
    } else {
        let _ = writeln!(out, "{header}");
    }

    for row in &map.rows {
        let cells: String = fold_columns(&row.values[first_bin..], options.max_columns)
            .into_iter()
            .map(shade)
            .collect();
        let conf = format!("{:>5.2}", row.confidence);
        let conf = if !options.color {
            conf
        } else if row.confidence >= 0.5 {
            conf.green().to_string()
        } else if row.confidence >= 0.2 {
            conf.yellow().to_string()
        } else {
            conf.red().to_string()
        };
        let _ = writeln!(
            out,
            "{:>9} {} {:>4} |{}",
            row.bucket.to_string(),
            conf,
            row.count,
            cells
        );
    }

    if let Some(range) = map.global_range {
        let _ = writeln!(out, "scale: global [{:.3}, {:.3}]", range.min, range.max);
    } else {
        let _ = writeln!(out, "scale: per bucket");
    }
    out
}

/// Counter display row for tables
#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Counter")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: u64,
}

/// Session counters as a table.
pub fn stats_table(stats: &SessionStats) -> String {
    let rows = vec![
        StatRow { name: "accepted samples", value: stats.accepted },
        StatRow { name: "missing axis", value: stats.missing_axis },
        StatRow { name: "unknown speed", value: stats.unknown_speed },
        StatRow { name: "stale fix", value: stats.stale_fix },
        StatRow { name: "poor accuracy", value: stats.poor_accuracy },
        StatRow { name: "windows emitted", value: stats.windows_emitted },
        StatRow { name: "windows dropped", value: stats.windows_dropped },
        StatRow { name: "transform failures", value: stats.transform_failures },
        StatRow { name: "evicted spectra", value: stats.evicted },
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnut_signal::{BucketKey, HeatMapRow, NormalizationMode, ValueRange};

    fn plain() -> RenderOptions {
        RenderOptions {
            color: false,
            max_columns: 64,
        }
    }

    fn map(rows: Vec<(u32, Vec<f64>)>) -> HeatMap {
        HeatMap {
            mode: NormalizationMode::Global,
            global_range: Some(ValueRange { min: 0.0, max: 2.0 }),
            confidence_bins: 2,
            rows: rows
                .into_iter()
                .map(|(lower, values)| HeatMapRow {
                    bucket: BucketKey {
                        lower_kmh: lower,
                        width_kmh: 5,
                    },
                    confidence: values[0],
                    count: 3,
                    values,
                })
                .collect(),
        }
    }

    #[test]
    fn shade_covers_ramp() {
        assert_eq!(shade(0.0), ' ');
        assert_eq!(shade(1.0), '@');
        assert_eq!(shade(2.0), '@');
        assert_eq!(shade(-1.0), ' ');
        assert_eq!(shade(f64::NAN), ' ');
    }

    #[test]
    fn fold_takes_group_maximum() {
        let folded = fold_columns(&[0.1, 0.9, 0.2, 0.3, 0.5], 2);
        assert_eq!(folded, vec![0.9, 0.5]);
        assert_eq!(fold_columns(&[0.4, 0.6], 8), vec![0.4, 0.6]);
        assert!(fold_columns(&[], 4).is_empty());
    }

    #[test]
    fn renders_one_line_per_bucket() {
        let text = render_heat_map(
            &map(vec![
                (20, vec![0.06, 0.06, 0.0, 1.0, 0.5]),
                (50, vec![0.06, 0.06, 1.0, 0.0, 0.0]),
            ]),
            &plain(),
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("bins 2-4"));
        assert!(lines[1].trim_start().starts_with("20-25"));
        assert!(lines[1].ends_with("| @+"));
        assert!(lines[2].ends_with("|@  "));
        assert!(lines[3].contains("global"));
    }

    #[test]
    fn empty_map_message() {
        let text = render_heat_map(&HeatMap::default(), &plain());
        assert!(text.contains("no speed bucket"));
    }

    #[test]
    fn stats_table_lists_counters() {
        let stats = SessionStats {
            accepted: 256,
            windows_emitted: 2,
            ..SessionStats::default()
        };
        let table = stats_table(&stats);
        assert!(table.contains("accepted samples"));
        assert!(table.contains("256"));
    }
}
