//! Motor configuration: operating point plus grain, chamber, injector and
//! nozzle geometry sections.
//!
//! Field names follow the external camelCase/section layout so TOML inputs
//! and persisted JSON echo the same keys. Every section and every field has
//! a default, so a partial file still describes a runnable motor.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Axial port geometry of the fuel grain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProfile {
    Cylindrical,
    Tapered,
}

impl PortProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProfile::Cylindrical => "cylindrical",
            PortProfile::Tapered => "tapered",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cylindrical" => Some(PortProfile::Cylindrical),
            "tapered" => Some(PortProfile::Tapered),
            _ => None,
        }
    }
}

/// Nozzle divergent section shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContourType {
    Conical,
    Bell,
}

impl ContourType {
    /// Categorical choice set, in sampling order.
    pub const CHOICES: [ContourType; 2] = [ContourType::Conical, ContourType::Bell];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContourType::Conical => "conical",
            ContourType::Bell => "bell",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "conical" => Some(ContourType::Conical),
            "bell" => Some(ContourType::Bell),
            _ => None,
        }
    }

    /// Efficiency applied to the ideal thrust coefficient.
    pub fn efficiency(&self) -> f64 {
        match self {
            ContourType::Bell => 0.98,
            ContourType::Conical => 0.95,
        }
    }
}

/// Fuel grain geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrainConfig {
    pub length_mm: f64,
    pub outer_diameter_mm: f64,
    pub initial_port_diameter_mm: f64,
    pub port_wall_thickness_mm: f64,
    pub port_axial_profile: PortProfile,
    pub port_profile_taper_angle_deg: f64,
}

impl Default for GrainConfig {
    fn default() -> Self {
        Self {
            length_mm: 300.0,
            outer_diameter_mm: 75.0,
            initial_port_diameter_mm: 25.0,
            port_wall_thickness_mm: 15.0,
            port_axial_profile: PortProfile::Cylindrical,
            port_profile_taper_angle_deg: 2.0,
        }
    }
}

/// Combustion chamber envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChamberConfig {
    pub length_mm: f64,
    pub inner_diameter_mm: f64,
    pub wall_thickness_mm: f64,
    pub chamber_volume_cc: f64,
}

impl Default for ChamberConfig {
    fn default() -> Self {
        Self {
            length_mm: 350.0,
            inner_diameter_mm: 80.0,
            wall_thickness_mm: 5.0,
            chamber_volume_cc: 1200.0,
        }
    }
}

/// Injector plate geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    pub inj_plate_thickness: f64,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self { inj_plate_thickness: 8.0 }
    }
}

/// Nozzle geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NozzleConfig {
    pub throat_diameter_mm: f64,
    pub exit_diameter_mm: f64,
    pub length_mm: f64,
    pub divergence_angle_deg: f64,
    pub contour_type: ContourType,
}

impl Default for NozzleConfig {
    fn default() -> Self {
        Self {
            throat_diameter_mm: 50.0,
            exit_diameter_mm: 200.0,
            length_mm: 150.0,
            divergence_angle_deg: 15.0,
            contour_type: ContourType::Conical,
        }
    }
}

/// Complete motor description.
///
/// `chamber_pressure` is in MPa, `mixture_ratio` is oxidizer-to-fuel by
/// mass, `nozzle_expansion_ratio` is the area ratio used for the vacuum
/// performance query, and `propellant_temp` is the stored oxidizer
/// temperature in K.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub chamber_pressure: f64,
    pub mixture_ratio: f64,
    pub nozzle_expansion_ratio: f64,
    pub propellant_temp: f64,
    pub grain: GrainConfig,
    pub combustion_chamber: ChamberConfig,
    pub injector: InjectorConfig,
    pub nozzle: NozzleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chamber_pressure: 10.0,
            mixture_ratio: 2.1,
            nozzle_expansion_ratio: 16.0,
            propellant_temp: 298.0,
            grain: GrainConfig::default(),
            combustion_chamber: ChamberConfig::default(),
            injector: InjectorConfig::default(),
            nozzle: NozzleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Check every operating-point and dimensional field before simulation.
    pub fn validate(&self) -> Result<(), EngineError> {
        positive("chamberPressure", self.chamber_pressure)?;
        positive("mixtureRatio", self.mixture_ratio)?;
        positive("nozzleExpansionRatio", self.nozzle_expansion_ratio)?;
        positive("propellantTemp", self.propellant_temp)?;

        positive("grain.length_mm", self.grain.length_mm)?;
        positive("grain.outer_diameter_mm", self.grain.outer_diameter_mm)?;
        positive("grain.initial_port_diameter_mm", self.grain.initial_port_diameter_mm)?;
        positive("grain.port_wall_thickness_mm", self.grain.port_wall_thickness_mm)?;
        non_negative(
            "grain.port_profile_taper_angle_deg",
            self.grain.port_profile_taper_angle_deg,
        )?;
        if self.grain.initial_port_diameter_mm >= self.grain.outer_diameter_mm {
            return Err(EngineError::InvalidConfig(format!(
                "grain port diameter {} mm must stay below outer diameter {} mm",
                self.grain.initial_port_diameter_mm, self.grain.outer_diameter_mm
            )));
        }

        positive("combustionChamber.length_mm", self.combustion_chamber.length_mm)?;
        positive(
            "combustionChamber.inner_diameter_mm",
            self.combustion_chamber.inner_diameter_mm,
        )?;
        positive(
            "combustionChamber.wall_thickness_mm",
            self.combustion_chamber.wall_thickness_mm,
        )?;
        positive(
            "combustionChamber.chamber_volume_cc",
            self.combustion_chamber.chamber_volume_cc,
        )?;

        positive("injector.inj_plate_thickness", self.injector.inj_plate_thickness)?;

        positive("nozzle.throat_diameter_mm", self.nozzle.throat_diameter_mm)?;
        positive("nozzle.exit_diameter_mm", self.nozzle.exit_diameter_mm)?;
        positive("nozzle.length_mm", self.nozzle.length_mm)?;
        positive("nozzle.divergence_angle_deg", self.nozzle.divergence_angle_deg)?;
        if self.nozzle.exit_diameter_mm <= self.nozzle.throat_diameter_mm {
            return Err(EngineError::InvalidConfig(format!(
                "nozzle exit diameter {} mm must exceed throat diameter {} mm",
                self.nozzle.exit_diameter_mm, self.nozzle.throat_diameter_mm
            )));
        }

        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::InvalidConfig(format!(
            "{} must be a positive number, got {}",
            name, value
        )));
    }
    Ok(())
}

fn non_negative(name: &str, value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidConfig(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}
