//! Serializable metric snapshots.
//!
//! Field names are camelCase on the wire so that stats produced by an agent
//! can be read back by the CLI and by external tooling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count and rates (events per second) of a meter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterStats {
    pub count: u64,
    pub mean_rate: f64,
    pub one_minute_rate: f64,
    pub five_minutes_rate: f64,
    pub fifteen_minutes_rate: f64,
}

/// Summary of a recorded distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
    pub percentile75: f64,
    pub percentile95: f64,
    pub percentile98: f64,
    pub percentile99: f64,
    pub percentile999: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramStats {
    pub count: u64,
    #[serde(flatten)]
    pub distribution: Distribution,
}

/// Meter plus distribution; distribution values are nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerStats {
    #[serde(flatten)]
    pub meter: MeterStats,
    #[serde(flatten)]
    pub distribution: Distribution,
}

/// Metrics registered by workloads, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDefinedStats {
    pub gauges: BTreeMap<String, f64>,
    pub counters: BTreeMap<String, i64>,
    pub meters: BTreeMap<String, MeterStats>,
    pub histograms: BTreeMap<String, HistogramStats>,
    pub timers: BTreeMap<String, TimerStats>,
}

/// Point-in-time view of a run's metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Time spent producing tasks.
    pub generator: TimerStats,
    /// Time spent executing tasks.
    pub queries: TimerStats,
    pub success: MeterStats,
    pub exceptions: MeterStats,
    #[serde(default)]
    pub user_defined: UserDefinedStats,
    /// Unix seconds, `-1` before the run started.
    pub start_date: i64,
    /// Milliseconds, `-1` before the run started.
    pub duration: i64,
}

impl MetricsSnapshot {
    /// Tasks executed, successful or not.
    pub fn total_tasks(&self) -> u64 {
        self.success.count + self.exceptions.count
    }

    pub fn duration_secs(&self) -> f64 {
        if self.duration < 0 {
            0.0
        } else {
            self.duration as f64 / 1000.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_stats_are_flat_on_the_wire() {
        let stats = TimerStats {
            meter: MeterStats {
                count: 3,
                ..Default::default()
            },
            distribution: Distribution {
                percentile99: 12.0,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["count"], 3);
        assert_eq!(json["percentile99"], 12.0);
        assert!(json.get("meanRate").is_some());
        assert!(json.get("meter").is_none());
    }

    #[test]
    fn test_snapshot_field_names() {
        let snapshot = MetricsSnapshot {
            start_date: 1_700_000_000,
            duration: 2500,
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["startDate"], 1_700_000_000);
        assert!(json.get("userDefined").is_some());
        assert_eq!(snapshot.duration_secs(), 2.5);

        let back: MetricsSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
