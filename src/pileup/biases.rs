use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use crate::common::utils::get_dynamic_reader;

///
/// Precomputed correction data for the contact stream: masked ("bad") global
/// columns, per-column bias factors, and a per-chromosome distance-decay
/// curve keyed by bin distance. Consumed read-only; computing these
/// coefficients is an upstream concern.
///
/// Loaded from a JSON blob:
/// `{"badcol": [..], "biases": {"<bin>": f}, "decay": {"<chrom>": {"<dist>": f}}}`
///
#[derive(Debug, Default, Deserialize)]
pub struct BiasTable {
    #[serde(default)]
    badcol: HashSet<u64>,
    #[serde(default)]
    biases: HashMap<u64, f64>,
    #[serde(default)]
    decay: HashMap<String, HashMap<u64, f64>>,
}

impl BiasTable {
    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self> {
        let reader = get_dynamic_reader(path.as_ref())?;
        let mut table: BiasTable = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse bias table: {:?}", path.as_ref()))?;

        // columns with an undefined bias are unusable
        let before = table.biases.len();
        table.biases.retain(|_, factor| !factor.is_nan());
        if table.biases.len() < before {
            info!(
                "Dropped {} NaN bias entries from {:?}",
                before - table.biases.len(),
                path.as_ref()
            );
        }

        Ok(table)
    }

    pub fn is_masked(&self, global_bin: u64) -> bool {
        self.badcol.contains(&global_bin)
    }

    pub fn masked_count(&self) -> usize {
        self.badcol.len()
    }

    ///
    /// Bias/decay-corrected value for a contact between two bins of the same
    /// chromosome: `raw / bias1 / bias2 / decay[chrom][|bin1 - bin2|]`.
    /// `None` when a required correction factor is missing or zero; absent
    /// bias or decay tables act as unit factors.
    ///
    pub fn normalize(&self, chrom: &str, bin1: u64, bin2: u64, raw: f64) -> Option<f64> {
        let bias1 = self.bias_factor(bin1)?;
        let bias2 = self.bias_factor(bin2)?;
        let decay = self.decay_factor(chrom, bin1.abs_diff(bin2))?;

        Some(raw / bias1 / bias2 / decay)
    }

    fn bias_factor(&self, global_bin: u64) -> Option<f64> {
        if self.biases.is_empty() {
            return Some(1.0);
        }
        self.biases
            .get(&global_bin)
            .copied()
            .filter(|factor| *factor != 0.0)
    }

    fn decay_factor(&self, chrom: &str, distance: u64) -> Option<f64> {
        if self.decay.is_empty() {
            return Some(1.0);
        }
        self.decay
            .get(chrom)?
            .get(&distance)
            .copied()
            .filter(|factor| *factor != 0.0)
    }
}
