use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::space::ParamValue;
use crate::study::TrialRecord;

/// CSV export of a study's trial history. Columns are fixed at creation:
/// trial id and timestamp, then the swept parameter keys, then the recorded
/// metric keys, then the scalar score.
pub struct CsvWriter {
    w: BufWriter<File>,
    param_keys: Vec<String>,
    value_keys: Vec<String>,
}

impl CsvWriter {
    pub fn create(path: &str, param_keys: Vec<String>, value_keys: Vec<String>) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self {
            w: BufWriter::new(f),
            param_keys,
            value_keys,
        })
    }

    pub fn write_header(&mut self) -> Result<()> {
        write!(self.w, "trial_id,timestamp")?;
        for key in &self.param_keys {
            write!(self.w, ",{}", key)?;
        }
        for key in &self.value_keys {
            write!(self.w, ",{}", key)?;
        }
        writeln!(self.w, ",score")?;
        Ok(())
    }

    pub fn write_row(&mut self, trial: &TrialRecord, trial_score: f64) -> Result<()> {
        write!(self.w, "{},{}", trial.trial_id, trial.timestamp)?;
        for key in &self.param_keys {
            match trial.params.get(key) {
                Some(ParamValue::Number(value)) => write!(self.w, ",{:.6}", value)?,
                Some(ParamValue::Text(name)) => write!(self.w, ",{}", name)?,
                None => write!(self.w, ",")?,
            }
        }
        for key in &self.value_keys {
            match trial.values.get(key) {
                Some(value) => write!(self.w, ",{:.6}", value)?,
                None => write!(self.w, ",")?,
            }
        }
        writeln!(self.w, ",{:.6e}", trial_score)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}
