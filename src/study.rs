//! Study lifecycle: creation, trial execution, continuation, results and
//! resume from the durable store.
//!
//! The registry holds each study behind its own mutex so independent
//! studies run trials concurrently while a single study's history stays
//! strictly ordered. Studies evicted from memory (say, after a restart)
//! are resumed transparently from the store on first use: a fresh sampler
//! is built and the recorded history is replayed into it, so continuation
//! and importance behave as if the process had never stopped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::engine::SimulationEngine;
use crate::error::StudyError;
use crate::objective::{score, score_values, PENALTY_SCORE};
use crate::sampler::{Sampler, TpeSampler};
use crate::space::{contour_index, materialize, OptimizationConfig, ParamValue};
use crate::store::{StudyRecord, StudyStore};

/// How many best trials a results snapshot reports.
const BEST_TRIALS: usize = 5;

/// Trials required before parameter importance is reported.
const IMPORTANCE_MIN_TRIALS: usize = 10;

/// Every Nth trial forces a durable flush mid-batch.
const FLUSH_INTERVAL: usize = 10;

/// One evaluated trial: the sampled parameters and the raw metric values
/// observed. `values` is empty when the evaluation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_id: usize,
    pub params: BTreeMap<String, ParamValue>,
    pub values: BTreeMap<String, f64>,
    pub timestamp: u64,
}

/// Snapshot of a study's progress.
#[derive(Debug, Clone, Serialize)]
pub struct StudyResults {
    pub study_id: String,
    pub config: OptimizationConfig,
    pub best_trials: Vec<TrialRecord>,
    pub trials_history: Vec<TrialRecord>,
    pub parameter_importance: HashMap<String, f64>,
}

struct StudyState {
    config: OptimizationConfig,
    sampler: Box<dyn Sampler>,
    history: Vec<TrialRecord>,
}

/// In-memory study registry backed by a durable store.
pub struct StudyRegistry {
    engine: SimulationEngine,
    store: StudyStore,
    studies: RwLock<HashMap<String, Arc<Mutex<StudyState>>>>,
}

impl StudyRegistry {
    pub fn new(store: StudyStore) -> Self {
        Self::with_engine(SimulationEngine::new(), store)
    }

    pub fn with_engine(engine: SimulationEngine, store: StudyStore) -> Self {
        Self {
            engine,
            store,
            studies: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &StudyStore {
        &self.store
    }

    /// Register a new study and return its generated id. Ids derive from
    /// the wall clock; collisions within one second get a numeric suffix.
    pub fn create(&self, config: OptimizationConfig) -> Result<String, StudyError> {
        config.validate()?;
        let mut studies = self.studies.write();
        let base = format!("study_{}", unix_seconds());
        let mut study_id = base.clone();
        let mut suffix = 1;
        while studies.contains_key(&study_id) || self.store.contains(&study_id) {
            study_id = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        let state = StudyState {
            sampler: Box::new(TpeSampler::new(config.seed)),
            history: Vec::new(),
            config,
        };
        studies.insert(study_id.clone(), Arc::new(Mutex::new(state)));
        Ok(study_id)
    }

    /// Run trials on a study. Stepped mode executes exactly one trial and
    /// returns; a full run executes the configured budget, subject to the
    /// wall-clock timeout and the early-stopping stall limit, then flushes.
    pub fn run(&self, study_id: &str, stepped: bool) -> Result<StudyResults, StudyError> {
        let study = self.lookup(study_id)?;
        let mut state = study.lock();
        if stepped {
            self.run_trial(study_id, &mut state)?;
            return Ok(assemble_results(study_id, &state));
        }

        let budget = state.config.n_trials;
        let timeout = state.config.timeout;
        let stall_limit = state.config.early_stopping_trials;
        let started = Instant::now();
        let mut best = best_score(&state);
        let mut stall = 0usize;

        for _ in 0..budget {
            if let Some(limit) = timeout {
                if started.elapsed().as_secs_f64() >= limit {
                    break;
                }
            }
            let trial_score = self.run_trial(study_id, &mut state)?;
            if trial_score < best {
                best = trial_score;
                stall = 0;
            } else {
                stall += 1;
            }
            if let Some(limit) = stall_limit {
                if stall >= limit {
                    break;
                }
            }
        }

        self.flush(study_id, &state)?;
        Ok(assemble_results(study_id, &state))
    }

    /// Run exactly `n_trials` additional trials on an existing study.
    pub fn continue_study(
        &self,
        study_id: &str,
        n_trials: usize,
    ) -> Result<StudyResults, StudyError> {
        let study = self.lookup(study_id)?;
        let mut state = study.lock();
        for _ in 0..n_trials {
            self.run_trial(study_id, &mut state)?;
        }
        self.flush(study_id, &state)?;
        Ok(assemble_results(study_id, &state))
    }

    /// Current results without running anything.
    pub fn results(&self, study_id: &str) -> Result<StudyResults, StudyError> {
        let study = self.lookup(study_id)?;
        let state = study.lock();
        Ok(assemble_results(study_id, &state))
    }

    /// Force a durable write of the study's current state.
    pub fn persist(&self, study_id: &str) -> Result<(), StudyError> {
        let study = self.lookup(study_id)?;
        let state = study.lock();
        self.flush(study_id, &state)
    }

    /// Union of in-memory ids and ids discoverable in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>, StudyError> {
        let mut ids: Vec<String> = self.studies.read().keys().cloned().collect();
        for id in self.store.list()? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Fetch a study, transparently resuming it from the store when it is
    /// not in memory. `NotFound` only when neither place has it.
    fn lookup(&self, study_id: &str) -> Result<Arc<Mutex<StudyState>>, StudyError> {
        if let Some(state) = self.studies.read().get(study_id) {
            return Ok(Arc::clone(state));
        }
        let record = self
            .store
            .load(study_id)?
            .ok_or_else(|| StudyError::NotFound(study_id.to_string()))?;
        let resumed = Arc::new(Mutex::new(rebuild(record)));
        let mut studies = self.studies.write();
        let entry = studies.entry(study_id.to_string()).or_insert(resumed);
        Ok(Arc::clone(entry))
    }

    /// Execute one trial: materialize, simulate, record. A failed
    /// evaluation records empty values and the penalty score; the batch
    /// keeps going.
    fn run_trial(&self, study_id: &str, state: &mut StudyState) -> Result<f64, StudyError> {
        let trial_id = state.history.len();
        let StudyState {
            config,
            sampler,
            history,
        } = state;

        let proposal = materialize(sampler.as_mut(), config);
        let (values, trial_score) = match self.engine.simulate(&proposal.config) {
            Ok(result) => {
                let mut values = BTreeMap::new();
                for objective in &config.objectives {
                    values.insert(
                        objective.name.as_str().to_string(),
                        objective.name.extract(&result),
                    );
                }
                (values, score(&result, &config.objectives))
            }
            Err(_) => (BTreeMap::new(), PENALTY_SCORE),
        };

        sampler.observe(&proposal.numeric, trial_score);
        history.push(TrialRecord {
            trial_id,
            params: proposal.params,
            values,
            timestamp: unix_seconds(),
        });

        if trial_id % FLUSH_INTERVAL == 0 {
            self.flush_parts(study_id, config, history)?;
        }
        Ok(trial_score)
    }

    fn flush(&self, study_id: &str, state: &StudyState) -> Result<(), StudyError> {
        self.flush_parts(study_id, &state.config, &state.history)
    }

    fn flush_parts(
        &self,
        study_id: &str,
        config: &OptimizationConfig,
        history: &[TrialRecord],
    ) -> Result<(), StudyError> {
        self.store.save(&StudyRecord {
            study_id: study_id.to_string(),
            config: config.clone(),
            trials_history: history.to_vec(),
            timestamp: unix_seconds(),
        })
    }
}

/// Rebuild in-memory state from a persisted record: fresh seeded sampler
/// with the recorded history replayed into it.
fn rebuild(record: StudyRecord) -> StudyState {
    let mut sampler = TpeSampler::new(record.config.seed);
    for trial in &record.trials_history {
        let mut numeric = BTreeMap::new();
        for (key, value) in &trial.params {
            match value {
                ParamValue::Number(number) => {
                    numeric.insert(key.clone(), *number);
                }
                ParamValue::Text(name) => {
                    if let Some(index) = contour_index(name) {
                        numeric.insert(key.clone(), index as f64);
                    }
                }
            }
        }
        let trial_score = score_values(&trial.values, &record.config.objectives);
        sampler.observe(&numeric, trial_score);
    }
    StudyState {
        config: record.config,
        sampler: Box::new(sampler),
        history: record.trials_history,
    }
}

fn assemble_results(study_id: &str, state: &StudyState) -> StudyResults {
    let mut ranked: Vec<&TrialRecord> = state.history.iter().collect();
    ranked.sort_by(|a, b| {
        let score_a = score_values(&a.values, &state.config.objectives);
        let score_b = score_values(&b.values, &state.config.objectives);
        score_a
            .partial_cmp(&score_b)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let best_trials = ranked.into_iter().take(BEST_TRIALS).cloned().collect();
    let parameter_importance = if state.history.len() >= IMPORTANCE_MIN_TRIALS {
        state.sampler.importance()
    } else {
        HashMap::new()
    };
    StudyResults {
        study_id: study_id.to_string(),
        config: state.config.clone(),
        best_trials,
        trials_history: state.history.clone(),
        parameter_importance,
    }
}

fn best_score(state: &StudyState) -> f64 {
    state
        .history
        .iter()
        .map(|trial| score_values(&trial.values, &state.config.objectives))
        .fold(f64::INFINITY, f64::min)
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
