//! Optimization search space and its projection onto motor configurations.
//!
//! Parameter keys address engine fields either bare (`chamberPressure`) or
//! section-qualified (`nozzle.throat_diameter_mm`). Keys that route nowhere
//! are tolerated: they still consume a suggestion and are recorded with the
//! trial, they just leave the motor untouched. A misspelled field inside a
//! known section is almost certainly an error, so that case is rejected
//! when the study is created.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ContourType, EngineConfig, PortProfile};
use crate::error::StudyError;
use crate::objective::ObjectiveSpec;
use crate::sampler::Sampler;

const GRAIN_FIELDS: &[&str] = &[
    "length_mm",
    "outer_diameter_mm",
    "initial_port_diameter_mm",
    "port_wall_thickness_mm",
    "port_axial_profile",
    "port_profile_taper_angle_deg",
];

const CHAMBER_FIELDS: &[&str] = &[
    "length_mm",
    "inner_diameter_mm",
    "wall_thickness_mm",
    "chamber_volume_cc",
];

const INJECTOR_FIELDS: &[&str] = &["inj_plate_thickness"];

const NOZZLE_FIELDS: &[&str] = &[
    "throat_diameter_mm",
    "exit_diameter_mm",
    "length_mm",
    "divergence_angle_deg",
    "contour_type",
];

/// A recorded parameter value: numeric for swept ranges, text for
/// categorical choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

/// One entry of the search space: either a swept `[min, max]` range with an
/// optional step, or a fixed literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub value: Option<ParamValue>,
}

/// Full study configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    #[serde(default)]
    pub parameter_ranges: BTreeMap<String, ParameterRange>,
    pub objectives: Vec<ObjectiveSpec>,
    #[serde(default = "default_n_trials")]
    pub n_trials: usize,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub early_stopping_trials: Option<usize>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_n_trials() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

impl OptimizationConfig {
    /// Reject malformed studies before any trial runs.
    pub fn validate(&self) -> Result<(), StudyError> {
        if self.objectives.is_empty() {
            return Err(StudyError::InvalidConfig(
                "at least one objective is required".to_string(),
            ));
        }
        for objective in &self.objectives {
            if !objective.weight.is_finite() || objective.weight <= 0.0 {
                return Err(StudyError::InvalidConfig(format!(
                    "objective {} weight must be positive, got {}",
                    objective.name.as_str(),
                    objective.weight
                )));
            }
        }
        if self.n_trials == 0 {
            return Err(StudyError::InvalidConfig(
                "n_trials must be at least 1".to_string(),
            ));
        }
        if let Some(timeout) = self.timeout {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(StudyError::InvalidConfig(format!(
                    "timeout must be positive, got {}",
                    timeout
                )));
            }
        }
        if let Some(stall) = self.early_stopping_trials {
            if stall == 0 {
                return Err(StudyError::InvalidConfig(
                    "early_stopping_trials must be at least 1".to_string(),
                ));
            }
        }
        for (key, range) in &self.parameter_ranges {
            validate_key(key)?;
            validate_range(key, range)?;
        }
        Ok(())
    }
}

fn is_text_key(key: &str) -> bool {
    key == "nozzle.contour_type" || key == "grain.port_axial_profile"
}

fn validate_key(key: &str) -> Result<(), StudyError> {
    let (section, field) = match key.split_once('.') {
        Some(parts) => parts,
        None => return Ok(()),
    };
    let known: Option<&[&str]> = match section {
        "grain" => Some(GRAIN_FIELDS),
        "combustionChamber" => Some(CHAMBER_FIELDS),
        "injector" => Some(INJECTOR_FIELDS),
        "nozzle" => Some(NOZZLE_FIELDS),
        _ => None,
    };
    if let Some(fields) = known {
        if !fields.contains(&field) {
            return Err(StudyError::InvalidConfig(format!(
                "unknown field {} in section {}",
                field, section
            )));
        }
    }
    Ok(())
}

fn validate_range(key: &str, range: &ParameterRange) -> Result<(), StudyError> {
    if range.fixed {
        let value = match &range.value {
            Some(value) => value,
            None => {
                return Err(StudyError::InvalidConfig(format!(
                    "{} is fixed but has no value",
                    key
                )))
            }
        };
        match (is_text_key(key), value) {
            (true, ParamValue::Text(name)) => {
                if key == "nozzle.contour_type" && ContourType::parse(name).is_none() {
                    return Err(StudyError::InvalidConfig(format!(
                        "{} must be one of conical|bell, got {}",
                        key, name
                    )));
                }
                if key == "grain.port_axial_profile" && PortProfile::parse(name).is_none() {
                    return Err(StudyError::InvalidConfig(format!(
                        "{} must be one of cylindrical|tapered, got {}",
                        key, name
                    )));
                }
            }
            (true, ParamValue::Number(number)) => {
                return Err(StudyError::InvalidConfig(format!(
                    "{} takes a named choice, not a number (got {})",
                    key, number
                )));
            }
            (false, ParamValue::Text(text)) => {
                return Err(StudyError::InvalidConfig(format!(
                    "{} takes a number, got \"{}\"",
                    key, text
                )));
            }
            (false, ParamValue::Number(number)) => {
                if !number.is_finite() {
                    return Err(StudyError::InvalidConfig(format!(
                        "{} fixed value must be finite",
                        key
                    )));
                }
            }
        }
        return Ok(());
    }
    if key == "grain.port_axial_profile" {
        return Err(StudyError::InvalidConfig(format!(
            "{} can only be fixed, not swept",
            key
        )));
    }
    if key == "nozzle.contour_type" {
        // Categorical sweep over the contour choice set; bounds are unused.
        return Ok(());
    }
    if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
        return Err(StudyError::InvalidConfig(format!(
            "{} bounds invalid: min={} max={}",
            key, range.min, range.max
        )));
    }
    if let Some(step) = range.step {
        if !step.is_finite() || step <= 0.0 {
            return Err(StudyError::InvalidConfig(format!(
                "{} step must be positive, got {}",
                key, step
            )));
        }
    }
    Ok(())
}

/// Outcome of materializing one trial: the concrete motor configuration,
/// the recorded parameter values and the numeric view fed back to the
/// sampler as an observation.
#[derive(Debug, Clone)]
pub struct MaterializedTrial {
    pub config: EngineConfig,
    pub params: BTreeMap<String, ParamValue>,
    pub numeric: BTreeMap<String, f64>,
}

/// Build a concrete motor configuration for one trial. Fixed entries apply
/// their literal value without touching the sampler and are not recorded as
/// sampled parameters; swept entries consume a suggestion even when the key
/// routes nowhere.
pub fn materialize(sampler: &mut dyn Sampler, config: &OptimizationConfig) -> MaterializedTrial {
    let mut engine = EngineConfig::default();
    let mut params = BTreeMap::new();
    let mut numeric = BTreeMap::new();

    for (key, range) in &config.parameter_ranges {
        if range.fixed {
            match &range.value {
                Some(ParamValue::Number(value)) => apply_numeric(&mut engine, key, *value),
                Some(ParamValue::Text(name)) => apply_text(&mut engine, key, name),
                None => {}
            }
        } else if key == "nozzle.contour_type" {
            let raw = sampler.suggest_categorical(key, ContourType::CHOICES.len());
            let index = raw.min(ContourType::CHOICES.len() - 1);
            let contour = ContourType::CHOICES[index];
            engine.nozzle.contour_type = contour;
            params.insert(key.clone(), ParamValue::Text(contour.as_str().to_string()));
            numeric.insert(key.clone(), index as f64);
        } else {
            let value = sampler.suggest_float(key, range.min, range.max, range.step);
            apply_numeric(&mut engine, key, value);
            params.insert(key.clone(), ParamValue::Number(value));
            numeric.insert(key.clone(), value);
        }
    }

    MaterializedTrial {
        config: engine,
        params,
        numeric,
    }
}

/// Position of a contour name within the categorical choice set; used when
/// replaying recorded trials into a fresh sampler.
pub fn contour_index(name: &str) -> Option<usize> {
    ContourType::CHOICES
        .iter()
        .position(|contour| contour.as_str() == name)
}

fn apply_numeric(config: &mut EngineConfig, key: &str, value: f64) {
    match key.split_once('.') {
        None => match key {
            "chamberPressure" => config.chamber_pressure = value,
            "mixtureRatio" => config.mixture_ratio = value,
            "nozzleExpansionRatio" => config.nozzle_expansion_ratio = value,
            "propellantTemp" => config.propellant_temp = value,
            _ => {}
        },
        Some(("grain", field)) => match field {
            "length_mm" => config.grain.length_mm = value,
            "outer_diameter_mm" => config.grain.outer_diameter_mm = value,
            "initial_port_diameter_mm" => config.grain.initial_port_diameter_mm = value,
            "port_wall_thickness_mm" => config.grain.port_wall_thickness_mm = value,
            "port_profile_taper_angle_deg" => config.grain.port_profile_taper_angle_deg = value,
            _ => {}
        },
        Some(("combustionChamber", field)) => match field {
            "length_mm" => config.combustion_chamber.length_mm = value,
            "inner_diameter_mm" => config.combustion_chamber.inner_diameter_mm = value,
            "wall_thickness_mm" => config.combustion_chamber.wall_thickness_mm = value,
            "chamber_volume_cc" => config.combustion_chamber.chamber_volume_cc = value,
            _ => {}
        },
        Some(("injector", field)) => {
            if field == "inj_plate_thickness" {
                config.injector.inj_plate_thickness = value;
            }
        }
        Some(("nozzle", field)) => match field {
            "throat_diameter_mm" => config.nozzle.throat_diameter_mm = value,
            "exit_diameter_mm" => config.nozzle.exit_diameter_mm = value,
            "length_mm" => config.nozzle.length_mm = value,
            "divergence_angle_deg" => config.nozzle.divergence_angle_deg = value,
            _ => {}
        },
        Some(_) => {}
    }
}

fn apply_text(config: &mut EngineConfig, key: &str, value: &str) {
    match key {
        "nozzle.contour_type" => {
            if let Some(contour) = ContourType::parse(value) {
                config.nozzle.contour_type = contour;
            }
        }
        "grain.port_axial_profile" => {
            if let Some(profile) = PortProfile::parse(value) {
                config.grain.port_axial_profile = profile;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_routing_covers_every_section() {
        let mut config = EngineConfig::default();
        apply_numeric(&mut config, "chamberPressure", 7.0);
        apply_numeric(&mut config, "grain.length_mm", 410.0);
        apply_numeric(&mut config, "combustionChamber.inner_diameter_mm", 92.0);
        apply_numeric(&mut config, "injector.inj_plate_thickness", 11.0);
        apply_numeric(&mut config, "nozzle.exit_diameter_mm", 240.0);
        assert_eq!(config.chamber_pressure, 7.0);
        assert_eq!(config.grain.length_mm, 410.0);
        assert_eq!(config.combustion_chamber.inner_diameter_mm, 92.0);
        assert_eq!(config.injector.inj_plate_thickness, 11.0);
        assert_eq!(config.nozzle.exit_diameter_mm, 240.0);
    }

    #[test]
    fn test_unroutable_keys_leave_config_alone() {
        let mut config = EngineConfig::default();
        apply_numeric(&mut config, "widget.frob", 99.0);
        apply_numeric(&mut config, "throttlePct", 55.0);
        apply_text(&mut config, "nozzle.contour_type", "dual-bell");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_text_routing_parses_choices() {
        let mut config = EngineConfig::default();
        apply_text(&mut config, "nozzle.contour_type", "bell");
        apply_text(&mut config, "grain.port_axial_profile", "tapered");
        assert_eq!(config.nozzle.contour_type, ContourType::Bell);
        assert_eq!(config.grain.port_axial_profile, PortProfile::Tapered);
    }

    #[test]
    fn test_key_validation_lenience_boundary() {
        // Unknown sections and bare keys pass; a typo in a known section fails
        assert!(validate_key("widget.frob").is_ok());
        assert!(validate_key("throttlePct").is_ok());
        assert!(validate_key("grain.length_mm").is_ok());
        assert!(validate_key("grain.lenght_mm").is_err());
        assert!(validate_key("nozzle.throat_diamater_mm").is_err());
    }

    #[test]
    fn test_contour_index_matches_choice_order() {
        assert_eq!(contour_index("conical"), Some(0));
        assert_eq!(contour_index("bell"), Some(1));
        assert_eq!(contour_index("aerospike"), None);
    }
}
