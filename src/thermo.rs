//! Combustion and fluid property models for the N2O / paraffin propellant
//! pair.
//!
//! The equilibrium solver is a closed-form surrogate fitted against CEA
//! runs of this propellant combination. It sits behind a trait so a full
//! chemical-equilibrium code can be swapped in without touching the engine.

use crate::error::EngineError;

/// Standard gravity used for specific impulse, m/s^2.
pub const G0: f64 = 9.81;

/// Universal gas constant, J/(kmol K).
pub const GAS_CONSTANT: f64 = 8314.4621;

/// N2O critical temperature, K. Liquid properties stop short of this.
const N2O_CRITICAL_TEMP: f64 = 309.57;

/// Lower bound of the liquid density correlation, K.
const N2O_MIN_TEMP: f64 = 182.3;

/// Combustion products state at a chamber pressure / mixture ratio point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumProducts {
    /// Adiabatic flame temperature, K.
    pub chamber_temperature: f64,
    /// Ratio of specific heats of the product mixture.
    pub gamma: f64,
    /// Mean molecular weight, kg/kmol.
    pub molecular_weight: f64,
    /// Characteristic velocity, m/s.
    pub cstar: f64,
    /// Vacuum specific impulse at the queried expansion ratio, s.
    pub isp_vac: f64,
}

/// Chamber equilibrium state provider.
pub trait EquilibriumSolver: Send + Sync {
    /// Solve for combustion products at the given chamber pressure (MPa),
    /// oxidizer-to-fuel mass ratio and nozzle expansion ratio.
    fn equilibrium(
        &self,
        chamber_pressure: f64,
        mixture_ratio: f64,
        expansion_ratio: f64,
    ) -> Result<EquilibriumProducts, EngineError>;
}

/// Liquid oxidizer property provider.
pub trait OxidizerProperties: Send + Sync {
    /// Saturated liquid density, kg/m^3, at the given temperature (K) and
    /// feed pressure (MPa).
    fn liquid_density(&self, temperature: f64, pressure: f64) -> Result<f64, EngineError>;
}

/// Surrogate equilibrium model for N2O / paraffin combustion.
///
/// Flame temperature peaks near O/F 7.5 and grows weakly with pressure;
/// gamma and molecular weight follow the flame temperature. The fit keeps
/// c* within a few percent of CEA across O/F 1-10 and 1-10 MPa.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParaffinNitrousEquilibrium;

impl EquilibriumSolver for ParaffinNitrousEquilibrium {
    fn equilibrium(
        &self,
        chamber_pressure: f64,
        mixture_ratio: f64,
        expansion_ratio: f64,
    ) -> Result<EquilibriumProducts, EngineError> {
        if !chamber_pressure.is_finite() || chamber_pressure <= 0.0 {
            return Err(EngineError::Thermochemistry(format!(
                "chamber pressure must be positive, got {} MPa",
                chamber_pressure
            )));
        }
        if !mixture_ratio.is_finite() || mixture_ratio <= 0.0 {
            return Err(EngineError::Thermochemistry(format!(
                "mixture ratio must be positive, got {}",
                mixture_ratio
            )));
        }
        if !expansion_ratio.is_finite() || expansion_ratio <= 1.0 {
            return Err(EngineError::Thermochemistry(format!(
                "expansion ratio must exceed 1, got {}",
                expansion_ratio
            )));
        }

        let of_offset = mixture_ratio - 7.5;
        let chamber_temperature =
            (3347.0 - 36.0 * of_offset * of_offset + 55.0 * (chamber_pressure / 3.5).ln())
                .max(1200.0);
        let gamma = (1.26 - 0.13 * chamber_temperature / 3350.0).clamp(1.08, 1.35);
        let molecular_weight = 19.0 + 1.05 * mixture_ratio.min(8.0);

        let specific_gas_constant = GAS_CONSTANT / molecular_weight;
        let cstar = (specific_gas_constant * chamber_temperature).sqrt() / vandenkerckhove(gamma);

        let exit_mach = mach_from_area_ratio(expansion_ratio, gamma);
        let pressure_ratio = (1.0 + 0.5 * (gamma - 1.0) * exit_mach * exit_mach)
            .powf(-gamma / (gamma - 1.0));
        let cf_vac = vacuum_thrust_coefficient(gamma, pressure_ratio, expansion_ratio);
        let isp_vac = cf_vac * cstar / G0;

        Ok(EquilibriumProducts {
            chamber_temperature,
            gamma,
            molecular_weight,
            cstar,
            isp_vac,
        })
    }
}

/// Saturated-liquid N2O density correlation.
///
/// Valid from 182.3 K up to the critical point; queries outside that range
/// indicate the oxidizer would not be stored as a liquid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NitrousOxideProperties;

impl OxidizerProperties for NitrousOxideProperties {
    fn liquid_density(&self, temperature: f64, _pressure: f64) -> Result<f64, EngineError> {
        if !temperature.is_finite()
            || temperature < N2O_MIN_TEMP
            || temperature >= N2O_CRITICAL_TEMP
        {
            return Err(EngineError::FluidProperty(format!(
                "N2O liquid density undefined at {} K (valid {} to {} K)",
                temperature, N2O_MIN_TEMP, N2O_CRITICAL_TEMP
            )));
        }
        let reduced = 1.0 - temperature / N2O_CRITICAL_TEMP;
        Ok(452.0 + 1040.0 * reduced.powf(0.38))
    }
}

/// Vandenkerckhove function of gamma, used in the c* relation.
pub fn vandenkerckhove(gamma: f64) -> f64 {
    gamma.sqrt() * (2.0 / (gamma + 1.0)).powf((gamma + 1.0) / (2.0 * (gamma - 1.0)))
}

/// Supersonic exit Mach number for a given area ratio, by bisection on the
/// isentropic area-Mach relation.
pub fn mach_from_area_ratio(area_ratio: f64, gamma: f64) -> f64 {
    if area_ratio <= 1.0 {
        return 1.0;
    }
    let ratio_at = |mach: f64| -> f64 {
        let term = (2.0 / (gamma + 1.0)) * (1.0 + 0.5 * (gamma - 1.0) * mach * mach);
        term.powf((gamma + 1.0) / (2.0 * (gamma - 1.0))) / mach
    };
    let mut lo = 1.0;
    let mut hi = 50.0;
    for _ in 0..128 {
        let mid = 0.5 * (lo + hi);
        if ratio_at(mid) < area_ratio {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Vacuum thrust coefficient from the isentropic expansion relations.
pub fn vacuum_thrust_coefficient(gamma: f64, pressure_ratio: f64, area_ratio: f64) -> f64 {
    let momentum = 2.0 * gamma * gamma / (gamma - 1.0)
        * (2.0 / (gamma + 1.0)).powf((gamma + 1.0) / (gamma - 1.0))
        * (1.0 - pressure_ratio.powf((gamma - 1.0) / gamma));
    momentum.max(0.0).sqrt() + area_ratio * pressure_ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cstar_near_cea_at_peak_mixture_ratio() {
        let products = ParaffinNitrousEquilibrium
            .equilibrium(3.5, 7.0, 16.0)
            .unwrap();
        // CEA gives roughly 1620 m/s for N2O/paraffin at this point
        assert_relative_eq!(products.cstar, 1620.0, max_relative = 0.02);
        assert!(products.gamma > 1.05 && products.gamma < 1.35);
    }

    #[test]
    fn test_flame_temperature_floor() {
        let products = ParaffinNitrousEquilibrium
            .equilibrium(0.1, 0.01, 2.0)
            .unwrap();
        assert_eq!(products.chamber_temperature, 1200.0);
    }

    #[test]
    fn test_vacuum_isp_plausible() {
        let products = ParaffinNitrousEquilibrium
            .equilibrium(3.5, 7.0, 16.0)
            .unwrap();
        assert!(
            products.isp_vac > 250.0 && products.isp_vac < 350.0,
            "vacuum Isp out of expected band: {}",
            products.isp_vac
        );
    }

    #[test]
    fn test_equilibrium_rejects_bad_inputs() {
        assert!(ParaffinNitrousEquilibrium.equilibrium(-1.0, 2.0, 4.0).is_err());
        assert!(ParaffinNitrousEquilibrium.equilibrium(5.0, 0.0, 4.0).is_err());
        assert!(ParaffinNitrousEquilibrium.equilibrium(5.0, 2.0, 1.0).is_err());
    }

    #[test]
    fn test_n2o_density_near_reference() {
        let rho = NitrousOxideProperties.liquid_density(298.0, 5.0).unwrap();
        // 745 kg/m^3 at 298 K in the NIST tables
        assert_relative_eq!(rho, 745.0, max_relative = 0.02);
    }

    #[test]
    fn test_n2o_density_range_enforced() {
        assert!(NitrousOxideProperties.liquid_density(320.0, 5.0).is_err());
        assert!(NitrousOxideProperties.liquid_density(150.0, 5.0).is_err());
        assert!(NitrousOxideProperties.liquid_density(f64::NAN, 5.0).is_err());
    }

    #[test]
    fn test_mach_from_area_ratio_inverts() {
        let gamma = 1.2;
        let mach = mach_from_area_ratio(16.0, gamma);
        assert!(mach > 1.0);
        let term = (2.0 / (gamma + 1.0)) * (1.0 + 0.5 * (gamma - 1.0) * mach * mach);
        let recovered = term.powf((gamma + 1.0) / (2.0 * (gamma - 1.0))) / mach;
        assert_relative_eq!(recovered, 16.0, max_relative = 1e-9);
    }

    #[test]
    fn test_unity_area_ratio_is_sonic() {
        assert_eq!(mach_from_area_ratio(1.0, 1.2), 1.0);
        assert_eq!(mach_from_area_ratio(0.5, 1.2), 1.0);
    }
}
