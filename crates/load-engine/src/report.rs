//! Human and machine readable renderings of run metrics.

use chrono::{DateTime, TimeZone, Utc};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use std::io::{self, Write};
use std::time::Duration;

use crate::metrics::{DURATION_METRIC, GENERATOR_METRIC, QUERIES_METRIC};
use crate::stats::{Distribution, HistogramStats, MeterStats, MetricsSnapshot, TimerStats};

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Writes one tab-separated line per metric value:
/// `iteration, date, [agent,] metric, sub-metric, value`.
///
/// Meant to be appended to a log file while a run progresses.
pub struct StatsPrinter<W: Write> {
    out: W,
}

impl<W: Write> StatsPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn print_stats(
        &mut self,
        iteration: u64,
        agent: Option<&str>,
        stats: &MetricsSnapshot,
    ) -> io::Result<()> {
        let line = Line {
            iteration,
            date: Utc::now(),
            agent,
        };
        self.print_metric(&line, &format!(".{DURATION_METRIC}"), "seconds", stats.duration_secs())?;
        self.print_timer(&line, &format!(".{GENERATOR_METRIC}"), &stats.generator)?;
        self.print_timer(&line, &format!(".{QUERIES_METRIC}"), &stats.queries)?;
        self.print_meter(&line, ".success", &stats.success)?;
        self.print_meter(&line, ".exceptions", &stats.exceptions)?;

        let user = &stats.user_defined;
        for (name, value) in &user.gauges {
            self.print_metric(&line, name, "value", value)?;
        }
        for (name, value) in &user.counters {
            self.print_metric(&line, name, "value", value)?;
        }
        for (name, meter) in &user.meters {
            self.print_meter(&line, name, meter)?;
        }
        for (name, histogram) in &user.histograms {
            self.print_histogram(&line, name, histogram)?;
        }
        for (name, timer) in &user.timers {
            self.print_timer(&line, name, timer)?;
        }
        self.out.flush()
    }

    fn print_meter(&mut self, line: &Line<'_>, name: &str, stats: &MeterStats) -> io::Result<()> {
        self.print_metric(line, name, "count", stats.count)?;
        self.print_metric(line, name, "meanRate", stats.mean_rate)?;
        self.print_metric(line, name, "oneMinuteRate", stats.one_minute_rate)?;
        self.print_metric(line, name, "fiveMinutesRate", stats.five_minutes_rate)?;
        self.print_metric(line, name, "fifteenMinutesRate", stats.fifteen_minutes_rate)
    }

    fn print_histogram(
        &mut self,
        line: &Line<'_>,
        name: &str,
        stats: &HistogramStats,
    ) -> io::Result<()> {
        self.print_metric(line, name, "count", stats.count)?;
        self.print_distribution(line, name, &stats.distribution)
    }

    fn print_timer(&mut self, line: &Line<'_>, name: &str, stats: &TimerStats) -> io::Result<()> {
        self.print_meter(line, name, &stats.meter)?;
        self.print_distribution(line, name, &stats.distribution)
    }

    fn print_distribution(
        &mut self,
        line: &Line<'_>,
        name: &str,
        d: &Distribution,
    ) -> io::Result<()> {
        self.print_metric(line, name, "min", d.min)?;
        self.print_metric(line, name, "max", d.max)?;
        self.print_metric(line, name, "mean", d.mean)?;
        self.print_metric(line, name, "median", d.median)?;
        self.print_metric(line, name, "stddev", d.stddev)?;
        self.print_metric(line, name, "percentile75", d.percentile75)?;
        self.print_metric(line, name, "percentile95", d.percentile95)?;
        self.print_metric(line, name, "percentile98", d.percentile98)?;
        self.print_metric(line, name, "percentile99", d.percentile99)?;
        self.print_metric(line, name, "percentile999", d.percentile999)
    }

    fn print_metric(
        &mut self,
        line: &Line<'_>,
        metric: &str,
        sub_metric: &str,
        value: impl std::fmt::Display,
    ) -> io::Result<()> {
        let date = line.date.to_rfc3339();
        match line.agent {
            Some(agent) => writeln!(
                self.out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                line.iteration, date, agent, metric, sub_metric, value
            ),
            None => writeln!(
                self.out,
                "{}\t{}\t{}\t{}\t{}",
                line.iteration, date, metric, sub_metric, value
            ),
        }
    }
}

struct Line<'a> {
    iteration: u64,
    date: DateTime<Utc>,
    agent: Option<&'a str>,
}

/// Multi-line report: rates per second, durations in milliseconds.
pub struct MetricsReporter;

impl MetricsReporter {
    pub fn format(stats: &MetricsSnapshot) -> String {
        let mut out = String::new();
        let duration = Duration::from_millis(stats.duration.max(0) as u64);
        let started = Utc
            .timestamp_opt(stats.start_date.max(0), 0)
            .single()
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("= {duration:?} (started: {started}) =====\n"));

        let user = &stats.user_defined;
        for (name, value) in &user.gauges {
            out.push_str(&format!("{name}: {value}\n"));
        }
        for (name, value) in &user.counters {
            out.push_str(&format!("{name}: {value}\n"));
        }
        for (name, h) in &user.histograms {
            let d = &h.distribution;
            out.push_str(&format!(
                "{name}: {}, max: {}, min: {}, mean: {:.2}, median: {}, 75%: {}, 95%: {}, 98%: {}, 99%: {}, 99.9%: {}\n",
                h.count, d.max, d.min, d.mean, d.median, d.percentile75, d.percentile95,
                d.percentile98, d.percentile99, d.percentile999
            ));
        }

        let meters = [(".success", &stats.success), (".exceptions", &stats.exceptions)];
        for (name, meter) in meters.into_iter().chain(user.meters.iter().map(|(k, v)| (k.as_str(), v))) {
            out.push_str(&Self::meter_line(name, meter));
        }

        let timers = [
            (GENERATOR_METRIC, &stats.generator),
            (QUERIES_METRIC, &stats.queries),
        ];
        for (name, timer) in timers.into_iter().chain(user.timers.iter().map(|(k, v)| (k.as_str(), v))) {
            out.push_str(&Self::meter_line(name, &timer.meter));
            let d = &timer.distribution;
            out.push_str(&format!(
                "\tmax: {:.3}, min: {:.3}, mean: {:.3}, median: {:.3}\n\t75%: {:.3}, 95%: {:.3}, 98%: {:.3}, 99%: {:.3}, 99.9%: {:.3}\n",
                ms(d.max), ms(d.min), ms(d.mean), ms(d.median), ms(d.percentile75),
                ms(d.percentile95), ms(d.percentile98), ms(d.percentile99), ms(d.percentile999)
            ));
        }
        out.push('\n');
        out
    }

    fn meter_line(name: &str, m: &MeterStats) -> String {
        format!(
            "{name}: {} ({:.2} {:.2} {:.2}) {:.2}\n",
            m.count, m.one_minute_rate, m.five_minutes_rate, m.fifteen_minutes_rate, m.mean_rate
        )
    }
}

fn ms(nanos: f64) -> f64 {
    nanos / NANOS_PER_MILLI
}

/// Summary table of a run.
pub struct ResultsTable;

impl ResultsTable {
    pub fn format_table(title: &str, stats: &MetricsSnapshot) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Run: {title}")]);

        let total = stats.total_tasks();
        let secs = stats.duration_secs();
        table.add_row(vec!["Duration:", &format!("{secs:.2}s")]);
        table.add_row(vec!["Total Tasks:", &total.to_string()]);
        table.add_row(vec!["Success:", &stats.success.count.to_string()]);
        table.add_row(vec!["Exceptions:", &stats.exceptions.count.to_string()]);
        let success_rate = if total > 0 {
            stats.success.count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        table.add_row(vec!["Success Rate:", &format!("{success_rate:.1}%")]);
        let tps = if secs > 0.0 { total as f64 / secs } else { 0.0 };
        table.add_row(vec!["Tasks/sec:", &format!("{tps:.1}")]);

        let q = &stats.queries.distribution;
        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p95 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.2} / {:.2} / {:.2} / {:.2}",
                ms(q.median),
                ms(q.percentile95),
                ms(q.percentile99),
                ms(q.max)
            ),
        ]);

        table.to_string()
    }

    pub fn format_json(stats: &MetricsSnapshot) -> serde_json::Result<String> {
        serde_json::to_string_pretty(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::UserDefinedStats;

    fn sample() -> MetricsSnapshot {
        let mut user = UserDefinedStats::default();
        user.counters.insert("bytes".to_string(), 512);
        MetricsSnapshot {
            success: MeterStats {
                count: 9,
                ..Default::default()
            },
            exceptions: MeterStats {
                count: 1,
                ..Default::default()
            },
            queries: TimerStats {
                meter: MeterStats {
                    count: 10,
                    ..Default::default()
                },
                distribution: Distribution {
                    median: 2_000_000.0,
                    ..Default::default()
                },
            },
            user_defined: user,
            start_date: 1_700_000_000,
            duration: 2000,
            ..Default::default()
        }
    }

    #[test]
    fn test_stats_printer_lines() {
        let mut printer = StatsPrinter::new(Vec::new());
        printer.print_stats(3, Some("agent-1:8090"), &sample()).unwrap();
        let out = String::from_utf8(printer.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        let first: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(first.len(), 6);
        assert_eq!(first[0], "3");
        assert_eq!(first[2], "agent-1:8090");
        assert_eq!(&first[3..], &[".duration", "seconds", "2"]);

        assert!(lines.iter().any(|l| l.ends_with(".success\tcount\t9")));
        assert!(lines.iter().any(|l| l.ends_with("bytes\tvalue\t512")));
    }

    #[test]
    fn test_stats_printer_without_agent() {
        let mut printer = StatsPrinter::new(Vec::new());
        printer.print_stats(0, None, &sample()).unwrap();
        let out = String::from_utf8(printer.into_inner()).unwrap();
        assert!(out.lines().all(|l| l.split('\t').count() == 5));
    }

    #[test]
    fn test_reporter_header_and_sections() {
        let report = MetricsReporter::format(&sample());
        assert!(report.starts_with("= 2s (started: "));
        assert!(report.contains("=====\n"));
        assert!(report.contains("bytes: 512\n"));
        assert!(report.contains(".success: 9 "));
        assert!(report.contains("queries: 10 "));
    }

    #[test]
    fn test_results_table() {
        let table = ResultsTable::format_table("smoke", &sample());
        assert!(table.contains("Load Run: smoke"));
        assert!(table.contains("90.0%"));
        assert!(table.contains("2.00 /"));
    }
}
