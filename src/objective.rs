//! Objectives and trial scoring.
//!
//! A study minimizes a single scalar score. Single-objective studies score
//! the raw metric (negated when maximizing); multi-objective studies score
//! a weighted sum of metrics normalized by fixed reference scales.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::PerformanceResult;

/// Score recorded for a trial whose evaluation failed.
pub const PENALTY_SCORE: f64 = 1e10;

/// Metrics a study may target. Unknown names fail at configuration parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "thrust")]
    Thrust,
    #[serde(rename = "specificImpulse")]
    SpecificImpulse,
    #[serde(rename = "massFlowRate")]
    MassFlowRate,
    #[serde(rename = "chamberTemperature")]
    ChamberTemperature,
    #[serde(rename = "exitPressure")]
    ExitPressure,
    #[serde(rename = "thrustCoefficient")]
    ThrustCoefficient,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Thrust => "thrust",
            Metric::SpecificImpulse => "specificImpulse",
            Metric::MassFlowRate => "massFlowRate",
            Metric::ChamberTemperature => "chamberTemperature",
            Metric::ExitPressure => "exitPressure",
            Metric::ThrustCoefficient => "thrustCoefficient",
        }
    }

    /// Pull this metric out of a simulation result.
    pub fn extract(&self, result: &PerformanceResult) -> f64 {
        match self {
            Metric::Thrust => result.thrust,
            Metric::SpecificImpulse => result.specific_impulse,
            Metric::MassFlowRate => result.mass_flow_rate,
            Metric::ChamberTemperature => result.chamber_temperature,
            Metric::ExitPressure => result.exit_pressure,
            Metric::ThrustCoefficient => result.thrust_coefficient,
        }
    }

    /// Reference scale balancing metrics of different magnitude in
    /// multi-objective sums.
    fn reference_scale(&self) -> f64 {
        match self {
            Metric::Thrust => 100.0,
            Metric::SpecificImpulse => 300.0,
            Metric::MassFlowRate => 10.0,
            _ => 1.0,
        }
    }
}

/// Optimization sense for one objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Minimize,
    Maximize,
}

/// One study objective: a metric, a sense and an optional weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    pub name: Metric,
    pub direction: Direction,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Scalarize a simulation result. Lower is better.
pub fn score(result: &PerformanceResult, objectives: &[ObjectiveSpec]) -> f64 {
    if objectives.len() == 1 {
        let objective = &objectives[0];
        let raw = objective.name.extract(result);
        return match objective.direction {
            Direction::Minimize => raw,
            Direction::Maximize => -raw,
        };
    }
    objectives
        .iter()
        .map(|objective| {
            let normalized = objective.name.extract(result) / objective.name.reference_scale();
            let signed = match objective.direction {
                Direction::Minimize => normalized,
                Direction::Maximize => -normalized,
            };
            objective.weight * signed
        })
        .sum()
}

/// Scalarize a recorded metric map. A missing metric means the trial never
/// produced values and scores the fixed penalty.
pub fn score_values(values: &BTreeMap<String, f64>, objectives: &[ObjectiveSpec]) -> f64 {
    if objectives.len() == 1 {
        let objective = &objectives[0];
        return match values.get(objective.name.as_str()) {
            Some(raw) => match objective.direction {
                Direction::Minimize => *raw,
                Direction::Maximize => -*raw,
            },
            None => PENALTY_SCORE,
        };
    }
    let mut total = 0.0;
    for objective in objectives {
        let raw = match values.get(objective.name.as_str()) {
            Some(value) => *value,
            None => return PENALTY_SCORE,
        };
        let normalized = raw / objective.name.reference_scale();
        total += objective.weight
            * match objective.direction {
                Direction::Minimize => normalized,
                Direction::Maximize => -normalized,
            };
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_defaults_to_one() {
        let spec: ObjectiveSpec =
            toml::from_str("name = \"thrust\"\ndirection = \"maximize\"").unwrap();
        assert_eq!(spec.weight, 1.0);
        assert_eq!(spec.name, Metric::Thrust);
        assert_eq!(spec.direction, Direction::Maximize);
    }

    #[test]
    fn test_unknown_direction_rejected() {
        let parsed: Result<ObjectiveSpec, _> =
            toml::from_str("name = \"thrust\"\ndirection = \"sideways\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_reference_scales() {
        assert_eq!(Metric::Thrust.reference_scale(), 100.0);
        assert_eq!(Metric::SpecificImpulse.reference_scale(), 300.0);
        assert_eq!(Metric::MassFlowRate.reference_scale(), 10.0);
        assert_eq!(Metric::ExitPressure.reference_scale(), 1.0);
        assert_eq!(Metric::ThrustCoefficient.reference_scale(), 1.0);
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in [
            Metric::Thrust,
            Metric::SpecificImpulse,
            Metric::MassFlowRate,
            Metric::ChamberTemperature,
            Metric::ExitPressure,
            Metric::ThrustCoefficient,
        ] {
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.as_str()));
        }
    }
}
