//! Steady-state performance model for an N2O / paraffin hybrid motor.
//!
//! One evaluation produces the headline numbers (thrust, specific impulse,
//! mass flow, thrust coefficient) plus 50-point axial pressure, temperature
//! and velocity profiles spanning chamber and nozzle.

use std::f64::consts::PI;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::{ContourType, EngineConfig};
use crate::error::EngineError;
use crate::thermo::{
    EquilibriumProducts, EquilibriumSolver, NitrousOxideProperties, OxidizerProperties,
    ParaffinNitrousEquilibrium, G0, GAS_CONSTANT,
};

/// Number of axial stations in each profile.
pub const PROFILE_POINTS: usize = 50;

/// Paraffin regression rate coefficient in r = a * G^n (SI units).
pub const REGRESSION_A: f64 = 1.155e-4;

/// Paraffin regression rate exponent.
pub const REGRESSION_N: f64 = 0.62;

/// Solid paraffin density, kg/m^3.
pub const FUEL_DENSITY: f64 = 920.0;

/// Feed line pressure assumed for the oxidizer storage check, MPa.
pub const FEED_PRESSURE: f64 = 5.0;

/// One axial sample of a quantity along the motor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub x: f64,
    pub y: f64,
}

/// Raw combustion quantities echoed alongside the performance numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CeaData {
    pub isp_vac: f64,
    pub cstar: f64,
    pub gamma: f64,
    pub chamber_temperature: f64,
    pub molecular_weight: f64,
}

/// Complete output of one steady-state evaluation.
///
/// `thrust` is in kN, `specific_impulse` in s, `chamber_temperature` in K,
/// `exit_pressure` in kPa, `mass_flow_rate` in kg/s. Profile x positions
/// are in m from the injector face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResult {
    pub thrust: f64,
    pub specific_impulse: f64,
    pub chamber_temperature: f64,
    pub exit_pressure: f64,
    pub mass_flow_rate: f64,
    pub thrust_coefficient: f64,
    pub pressure_data: Vec<ProfilePoint>,
    pub temperature_data: Vec<ProfilePoint>,
    pub velocity_data: Vec<ProfilePoint>,
    #[serde(rename = "cea_data")]
    pub cea_data: CeaData,
}

/// Envelope written for a standalone simulation run: generated id, creation
/// time, the configuration echoed back and the flattened result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub id: String,
    pub timestamp: u64,
    pub parameters: EngineConfig,
    #[serde(flatten)]
    pub performance: PerformanceResult,
}

impl SimulationRecord {
    pub fn new(parameters: &EngineConfig, performance: PerformanceResult) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            id: format!("sim_{}", now.as_secs()),
            timestamp: now.as_millis() as u64,
            parameters: parameters.clone(),
            performance,
        }
    }
}

/// Steady-state motor model with pluggable property providers.
pub struct SimulationEngine {
    solver: Box<dyn EquilibriumSolver>,
    oxidizer: Box<dyn OxidizerProperties>,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationEngine {
    pub fn new() -> Self {
        Self {
            solver: Box::new(ParaffinNitrousEquilibrium),
            oxidizer: Box::new(NitrousOxideProperties),
        }
    }

    pub fn with_models(
        solver: Box<dyn EquilibriumSolver>,
        oxidizer: Box<dyn OxidizerProperties>,
    ) -> Self {
        Self { solver, oxidizer }
    }

    /// Evaluate the motor at its configured operating point.
    pub fn simulate(&self, config: &EngineConfig) -> Result<PerformanceResult, EngineError> {
        config.validate()?;

        let throat_area = circle_area_mm(config.nozzle.throat_diameter_mm);
        let exit_area = circle_area_mm(config.nozzle.exit_diameter_mm);
        let expansion_ratio = exit_area / throat_area;

        let products = self.solver.equilibrium(
            config.chamber_pressure,
            config.mixture_ratio,
            config.nozzle_expansion_ratio,
        )?;
        check_products(&products)?;

        // Oxidizer must be storable as a liquid at the feed condition.
        let density = self
            .oxidizer
            .liquid_density(config.propellant_temp, FEED_PRESSURE)?;
        if !density.is_finite() || density <= 0.0 {
            return Err(EngineError::FluidProperty(format!(
                "oxidizer density out of range: {}",
                density
            )));
        }

        let chamber_pressure_pa = config.chamber_pressure * 1.0e6;

        // Port mass flux estimate from the chamber pressure head.
        let port_diameter = config.grain.initial_port_diameter_mm / 1000.0;
        let port_area = PI * (port_diameter / 2.0).powi(2);
        let oxidizer_flux = (2.0 * chamber_pressure_pa / port_area).sqrt();

        let regression_rate = REGRESSION_A * oxidizer_flux.powf(REGRESSION_N);
        let burn_area = PI * port_diameter * (config.grain.length_mm / 1000.0);
        let fuel_flow = regression_rate * burn_area * FUEL_DENSITY;
        let oxidizer_flow = fuel_flow * config.mixture_ratio;
        let mass_flow_rate = fuel_flow + oxidizer_flow;

        let gamma = products.gamma;
        let gamma_term =
            gamma * (2.0 / (gamma + 1.0)).powf((gamma + 1.0) / (gamma - 1.0));
        let cf_ideal = gamma_term.sqrt() - expansion_ratio / config.chamber_pressure;
        let thrust_coefficient = cf_ideal * config.nozzle.contour_type.efficiency();

        let thrust_n = thrust_coefficient * chamber_pressure_pa * throat_area;
        let specific_impulse = thrust_n / (mass_flow_rate * G0);

        // Axial profiles: a lossy chamber section followed by an isentropic
        // expansion through the configured contour.
        let chamber_length = config.combustion_chamber.length_mm / 1000.0;
        let engine_length = chamber_length + config.nozzle.length_mm / 1000.0;
        let gas_constant = GAS_CONSTANT / products.molecular_weight;
        let chamber_temperature = products.chamber_temperature;

        let mut pressure_data = Vec::with_capacity(PROFILE_POINTS);
        let mut temperature_data = Vec::with_capacity(PROFILE_POINTS);
        let mut velocity_data = Vec::with_capacity(PROFILE_POINTS);

        for i in 0..PROFILE_POINTS {
            let x = engine_length * i as f64 / (PROFILE_POINTS - 1) as f64;
            let (pressure, temperature, velocity) = if x < chamber_length {
                let along = x / chamber_length;
                let pressure_loss = 0.15 * (1.0 - (1.0 - along).powi(2));
                let pressure = chamber_pressure_pa * (1.0 - pressure_loss) / 1.0e6;
                let temperature =
                    chamber_temperature * (0.9 + 0.1 * (1.0 - along).sqrt());
                let velocity = products.cstar * along.sqrt() * 0.4;
                (pressure, temperature, velocity)
            } else {
                let along = (x - chamber_length) / (engine_length - chamber_length);
                let local_area_ratio = match config.nozzle.contour_type {
                    ContourType::Bell => 1.0 + along.powf(0.8) * (expansion_ratio - 1.0),
                    ContourType::Conical => 1.0 + along * (expansion_ratio - 1.0),
                };
                let pressure = chamber_pressure_pa
                    * (1.0 / local_area_ratio).powf(gamma / (gamma - 1.0))
                    / 1.0e6;
                let pressure_ratio = pressure * 1.0e6 / chamber_pressure_pa;
                let temperature =
                    chamber_temperature * pressure_ratio.powf((gamma - 1.0) / gamma);
                let velocity = (2.0 * gamma * gas_constant * chamber_temperature
                    / (gamma - 1.0)
                    * (1.0 - pressure_ratio.powf((gamma - 1.0) / gamma)))
                    .sqrt();
                (pressure, temperature, velocity)
            };
            pressure_data.push(ProfilePoint { x, y: pressure });
            temperature_data.push(ProfilePoint { x, y: temperature });
            velocity_data.push(ProfilePoint { x, y: velocity });
        }

        let exit_pressure = pressure_data.last().map(|p| p.y * 1000.0).unwrap_or(0.0);

        Ok(PerformanceResult {
            thrust: thrust_n / 1000.0,
            specific_impulse,
            chamber_temperature,
            exit_pressure,
            mass_flow_rate,
            thrust_coefficient,
            pressure_data,
            temperature_data,
            velocity_data,
            cea_data: CeaData {
                isp_vac: products.isp_vac,
                cstar: products.cstar,
                gamma: products.gamma,
                chamber_temperature: products.chamber_temperature,
                molecular_weight: products.molecular_weight,
            },
        })
    }
}

/// Area of a circle given its diameter in mm, in m^2.
fn circle_area_mm(diameter_mm: f64) -> f64 {
    PI * (diameter_mm / 2000.0).powi(2)
}

fn check_products(products: &EquilibriumProducts) -> Result<(), EngineError> {
    let checks = [
        ("chamber temperature", products.chamber_temperature),
        ("characteristic velocity", products.cstar),
        ("molecular weight", products.molecular_weight),
        ("vacuum Isp", products.isp_vac),
    ];
    for (name, value) in checks {
        if !value.is_finite() || value <= 0.0 {
            return Err(EngineError::Thermochemistry(format!(
                "{} out of range: {}",
                name, value
            )));
        }
    }
    if !products.gamma.is_finite() || products.gamma <= 1.0 {
        return Err(EngineError::Thermochemistry(format!(
            "ratio of specific heats out of range: {}",
            products.gamma
        )));
    }
    Ok(())
}
