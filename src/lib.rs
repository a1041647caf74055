//! Steady-state hybrid rocket motor performance model and deterministic
//! optimization study driver.
//!
//! The simulation side (`config`, `thermo`, `engine`) evaluates an N2O /
//! paraffin motor at a fixed operating point. The study side (`space`,
//! `objective`, `sampler`, `study`, `store`) searches over motor
//! configurations with a seeded TPE-style sampler and persists every study
//! as a JSON document that can be resumed and continued later.

pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod objective;
pub mod sampler;
pub mod space;
pub mod store;
pub mod study;
pub mod thermo;


pub use config::EngineConfig;
pub use engine::{PerformanceResult, SimulationEngine, SimulationRecord};
pub use error::{EngineError, StudyError};
pub use objective::{score, score_values, Direction, Metric, ObjectiveSpec, PENALTY_SCORE};
pub use space::{OptimizationConfig, ParamValue, ParameterRange};
pub use store::{StudyRecord, StudyStore};
pub use study::{StudyRegistry, StudyResults, TrialRecord};

pub const VERSION: &str = "0.3.0";
