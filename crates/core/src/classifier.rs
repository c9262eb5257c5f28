//! Rule-based severity classification of vital-sign readings.
//!
//! The rules are evaluated in clinical priority order and the first crossed rule wins, so a
//! reading that crosses several thresholds at once always reports the most dangerous one.
//!
//! | Priority | Condition                     | Label     | Score |
//! |----------|-------------------------------|-----------|-------|
//! | 1        | SpO2 below 90                 | Emergency | 0.99  |
//! | 2        | temperature above 40 °C       | Emergency | 0.95  |
//! | 3        | heart rate above 140          | Emergency | 0.90  |
//! | 4        | SpO2 below 92 or HR above 120 | Warning   | 0.80  |
//! | 5        | otherwise                     | Normal    | 0.20  |
//!
//! Absent fields never cross a threshold.

use crate::constants::{
    HIGH_FEVER_REASON, HIGH_FEVER_SCORE, LOW_SPO2_REASON, LOW_SPO2_SCORE, NORMAL_REASON,
    NORMAL_SCORE, VERY_HIGH_HR_REASON, VERY_HIGH_HR_SCORE, WARNING_REASON, WARNING_SCORE,
};
use crate::vitals::VitalSigns;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered severity label. Declaration order is severity order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Warning,
    Emergency,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "Normal",
            Severity::Warning => "Warning",
            Severity::Emergency => "Emergency",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown severity label: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Severity::Normal),
            "warning" => Ok(Severity::Warning),
            "emergency" => Ok(Severity::Emergency),
            "critical" => Ok(Severity::Critical),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

/// Result of classifying one reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Severity,
    /// Confidence in [0, 1].
    pub score: f64,
    pub reason: String,
}

impl Classification {
    fn new(label: Severity, score: f64, reason: &str) -> Self {
        Self {
            label,
            score,
            reason: reason.to_string(),
        }
    }
}

/// Decision thresholds for the rule engine. All comparisons are strict.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub spo2_emergency_below: f64,
    pub temp_emergency_above: f64,
    pub hr_emergency_above: f64,
    pub spo2_warning_below: f64,
    pub hr_warning_above: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            spo2_emergency_below: 90.0,
            temp_emergency_above: 40.0,
            hr_emergency_above: 140.0,
            spo2_warning_below: 92.0,
            hr_warning_above: 120.0,
        }
    }
}

/// One row of the rule table, evaluated against a reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuleHit {
    pub label: Severity,
    pub score: f64,
    pub reason: &'static str,
}

fn below(value: Option<f64>, limit: f64) -> bool {
    value.is_some_and(|v| v < limit)
}

fn above(value: Option<f64>, limit: f64) -> bool {
    value.is_some_and(|v| v > limit)
}

/// Evaluates every rule row, returning `(crossed, hit)` pairs in priority order.
fn evaluate_rules(vitals: &VitalSigns, t: &Thresholds) -> [(bool, RuleHit); 4] {
    [
        (
            below(vitals.spo2, t.spo2_emergency_below),
            RuleHit {
                label: Severity::Emergency,
                score: LOW_SPO2_SCORE,
                reason: LOW_SPO2_REASON,
            },
        ),
        (
            above(vitals.temp, t.temp_emergency_above),
            RuleHit {
                label: Severity::Emergency,
                score: HIGH_FEVER_SCORE,
                reason: HIGH_FEVER_REASON,
            },
        ),
        (
            above(vitals.hr, t.hr_emergency_above),
            RuleHit {
                label: Severity::Emergency,
                score: VERY_HIGH_HR_SCORE,
                reason: VERY_HIGH_HR_REASON,
            },
        ),
        (
            below(vitals.spo2, t.spo2_warning_below) || above(vitals.hr, t.hr_warning_above),
            RuleHit {
                label: Severity::Warning,
                score: WARNING_SCORE,
                reason: WARNING_REASON,
            },
        ),
    ]
}

/// Classifies a reading with the rule engine. Never fails.
pub fn classify(vitals: &VitalSigns, thresholds: &Thresholds) -> Classification {
    evaluate_rules(vitals, thresholds)
        .into_iter()
        .find(|(crossed, _)| *crossed)
        .map(|(_, hit)| Classification::new(hit.label, hit.score, hit.reason))
        .unwrap_or_else(|| Classification::new(Severity::Normal, NORMAL_SCORE, NORMAL_REASON))
}

/// Every rule row the reading crosses, most severe first.
pub fn triggered_conditions(vitals: &VitalSigns, thresholds: &Thresholds) -> Vec<RuleHit> {
    evaluate_rules(vitals, thresholds)
        .into_iter()
        .filter_map(|(crossed, hit)| crossed.then_some(hit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals(hr: Option<f64>, spo2: Option<f64>, temp: Option<f64>) -> VitalSigns {
        VitalSigns {
            hr,
            spo2,
            temp,
            rr: None,
        }
    }

    fn rules(v: VitalSigns) -> Classification {
        classify(&v, &Thresholds::default())
    }

    #[test]
    fn low_spo2_dominates_other_conditions() {
        for hr in [None, Some(60.0), Some(130.0), Some(180.0)] {
            for temp in [None, Some(36.5), Some(41.5)] {
                for spo2 in [50.0, 85.0, 89.9] {
                    let result = rules(vitals(hr, Some(spo2), temp));
                    assert_eq!(result.label, Severity::Emergency);
                    assert_eq!(result.reason, "Low SpO2");
                    assert_eq!(result.score, 0.99);
                }
            }
        }
    }

    #[test]
    fn low_spo2_reported_over_very_high_hr() {
        let result = rules(vitals(Some(150.0), Some(85.0), Some(37.0)));
        assert_eq!(result.label, Severity::Emergency);
        assert_eq!(result.reason, "Low SpO2");
    }

    #[test]
    fn high_fever_precedes_very_high_hr() {
        let result = rules(vitals(Some(150.0), Some(97.0), Some(40.5)));
        assert_eq!(result.label, Severity::Emergency);
        assert_eq!(result.reason, "High fever");
        assert_eq!(result.score, 0.95);
    }

    #[test]
    fn very_high_hr_is_emergency() {
        let result = rules(vitals(Some(141.0), None, None));
        assert_eq!(result.label, Severity::Emergency);
        assert_eq!(result.reason, "Very high HR");
        assert_eq!(result.score, 0.90);
    }

    #[test]
    fn high_hr_alone_is_warning() {
        let result = rules(vitals(Some(125.0), None, None));
        assert_eq!(result.label, Severity::Warning);
        assert_eq!(result.reason, "Low SpO2 or high HR");
        assert_eq!(result.score, 0.80);
    }

    #[test]
    fn borderline_spo2_is_warning() {
        let result = rules(vitals(None, Some(91.0), None));
        assert_eq!(result.label, Severity::Warning);
    }

    #[test]
    fn in_range_readings_are_normal() {
        for spo2 in [92.0, 95.0, 99.9] {
            for hr in [40.0, 80.0, 120.0] {
                for temp in [35.0, 37.0, 40.0] {
                    let result = rules(vitals(Some(hr), Some(spo2), Some(temp)));
                    assert_eq!(result.label, Severity::Normal, "{hr} {spo2} {temp}");
                    assert_eq!(result.reason, "Within thresholds");
                }
            }
        }
    }

    #[test]
    fn empty_reading_is_normal() {
        let result = rules(VitalSigns::default());
        assert_eq!(result.label, Severity::Normal);
        assert_eq!(result.score, 0.20);
        assert_eq!(result.reason, "Within thresholds");
    }

    #[test]
    fn thresholds_can_be_tuned() {
        let strict = Thresholds {
            hr_emergency_above: 100.0,
            ..Thresholds::default()
        };
        let result = classify(&vitals(Some(110.0), None, None), &strict);
        assert_eq!(result.reason, "Very high HR");
    }

    #[test]
    fn triggered_conditions_lists_every_crossed_rule() {
        let hits = triggered_conditions(
            &vitals(Some(150.0), Some(85.0), Some(41.0)),
            &Thresholds::default(),
        );
        let reasons: Vec<_> = hits.iter().map(|h| h.reason).collect();
        assert_eq!(
            reasons,
            vec!["Low SpO2", "High fever", "Very high HR", "Low SpO2 or high HR"]
        );
        assert!(triggered_conditions(&VitalSigns::default(), &Thresholds::default()).is_empty());
    }

    #[test]
    fn severity_orders_and_parses() {
        assert!(Severity::Normal < Severity::Warning);
        assert!(Severity::Warning < Severity::Emergency);
        assert!(Severity::Emergency < Severity::Critical);
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(" Emergency ".parse::<Severity>().unwrap(), Severity::Emergency);
        assert!("Alert".parse::<Severity>().is_err());
    }
}
