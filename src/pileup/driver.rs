use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;
use tempfile::TempDir;

use crate::common::models::ChromIndex;
use crate::common::utils::get_dynamic_reader;
use crate::pileup::biases::BiasTable;
use crate::pileup::binner::{bin_peak_pairs, partition_contacts, write_request_file};
use crate::pileup::consts;
use crate::pileup::matrix::write_pileup_matrices;
use crate::pileup::merge::{aggregate_sorted_streams, PairAccumulator, PairKey};
use crate::pileup::sort::{check_sort_available, sort_by_bin_pair};

///
/// Configuration surface of the pileup pipeline: plain scalars and paths.
///
#[derive(Debug, Clone)]
pub struct PileupConfig {
    pub chrom_sizes: PathBuf,
    pub pairs: PathBuf,
    pub contacts: PathBuf,
    pub biases: Option<PathBuf>,
    pub resolution: u64,
    pub window_span: u64,
    pub threads: usize,
    pub tmpdir: PathBuf,
    pub output: PathBuf,
}

impl PileupConfig {
    /// Window half-width in bins; the window matrix is `2 * flank + 1` wide.
    pub fn flank_bins(&self) -> u64 {
        self.window_span / self.resolution
    }
}

///
/// What one chromosome's pipeline produced.
///
enum ChromOutcome {
    Aggregated(HashMap<PairKey, PairAccumulator>),
    Empty(&'static str),
    Failed(anyhow::Error),
}

///
/// Per-chromosome run report. Chromosome-level failures live here, not in
/// the process exit status; only structural input errors abort a run.
///
#[derive(Debug, Default)]
pub struct RunSummary {
    pub aggregated: Vec<String>,
    pub empty: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub pairs_written: usize,
}

/// One chromosome's pending work: its request/contact files inside its own
/// temp dir, which travels with the batch into the worker.
struct ChromBatch {
    chrom: String,
    tempdir: TempDir,
    requests: PathBuf,
    contacts: PathBuf,
    n_requests: usize,
}

///
/// Run the full pipeline: bin the pair list, partition and normalize the
/// contact stream, then fan out per chromosome (external sort + merge-join)
/// over a bounded worker pool. Workers share nothing; their accumulator maps
/// are merged sequentially after the pool joins.
///
pub fn run_pileup(config: &PileupConfig) -> Result<RunSummary> {
    check_sort_available()?;

    let index = ChromIndex::from_file(&config.chrom_sizes, config.resolution)?;
    let biases = match &config.biases {
        Some(path) => {
            let table = BiasTable::from_file(path)?;
            info!(
                "Loaded bias table from {:?} ({} masked columns)",
                path,
                table.masked_count()
            );
            table
        }
        None => BiasTable::default(),
    };

    fs::create_dir_all(&config.tmpdir)
        .with_context(|| format!("Failed to create temp directory: {:?}", config.tmpdir))?;
    if let Some(outdir) = config.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(outdir)
            .with_context(|| format!("Failed to create output directory: {:?}", outdir))?;
    }

    let mut binned = bin_peak_pairs(&config.pairs, &index, &biases)?;
    info!(
        "Binned {} peak pairs across {} chromosome(s) ({} masked, {} outside bins, {} inter-chromosomal)",
        binned.total_requests(),
        binned.by_chrom.len(),
        binned.masked,
        binned.unindexed,
        binned.interchrom
    );

    // stage per-chromosome batches in index order so runs are deterministic
    let mut batches: Vec<ChromBatch> = Vec::new();
    let mut contact_targets: HashMap<String, PathBuf> = HashMap::new();
    for span in index.spans() {
        let Some(requests) = binned.by_chrom.remove(&span.chrom) else {
            continue;
        };

        let tempdir = tempfile::Builder::new()
            .prefix(&format!("{}.", span.chrom))
            .tempdir_in(&config.tmpdir)
            .with_context(|| format!("Failed to create temp directory for {}", span.chrom))?;

        let request_file = tempdir.path().join(consts::REQUEST_FILE);
        write_request_file(&requests, &request_file)?;

        let contact_file = tempdir.path().join(consts::CONTACT_FILE);
        contact_targets.insert(span.chrom.clone(), contact_file.clone());

        batches.push(ChromBatch {
            chrom: span.chrom.clone(),
            tempdir,
            requests: request_file,
            contacts: contact_file,
            n_requests: requests.len(),
        });
    }

    // malformed contact input is fatal even when every pair was filtered
    let partition = partition_contacts(&config.contacts, &index, &biases, &contact_targets)?;
    info!(
        "Kept {} contact records, dropped {}",
        partition.kept, partition.dropped
    );
    if batches.is_empty() {
        warn!("No usable peak pairs; writing an empty matrix file.");
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .context("Failed to build the chromosome worker pool")?;

    let flank_bins = config.flank_bins();
    let outcomes: Vec<(String, ChromOutcome)> = pool.install(|| {
        batches
            .into_par_iter()
            .map(|batch| {
                let chrom = batch.chrom.clone();
                (chrom, process_chromosome(batch, flank_bins))
            })
            .collect()
    });

    let mut summary = RunSummary::default();
    let mut global: HashMap<PairKey, PairAccumulator> = HashMap::new();
    for (chrom, outcome) in outcomes {
        match outcome {
            ChromOutcome::Aggregated(accumulators) => {
                for (key, accumulator) in accumulators {
                    global.entry(key).or_default().merge(accumulator);
                }
                summary.aggregated.push(chrom);
            }
            ChromOutcome::Empty(reason) => {
                info!("Skipping chromosome {}: {}", chrom, reason);
                summary.empty.push(chrom);
            }
            ChromOutcome::Failed(error) => {
                warn!("Chromosome {} failed: {:#}", chrom, error);
                summary.failed.push((chrom, format!("{:#}", error)));
            }
        }
    }

    summary.pairs_written = write_pileup_matrices(&global, flank_bins, &config.output)?;

    info!(
        "Run summary: {} chromosome(s) aggregated, {} empty, {} failed; {} pair matrices written to {:?}",
        summary.aggregated.len(),
        summary.empty.len(),
        summary.failed.len(),
        summary.pairs_written,
        config.output
    );

    Ok(summary)
}

///
/// One chromosome's pipeline: external sort of both partitions, then the
/// merge-join. The chromosome's temp dir is removed on every exit path;
/// removal trouble is only a warning.
///
fn process_chromosome(batch: ChromBatch, flank_bins: u64) -> ChromOutcome {
    let ChromBatch {
        chrom,
        tempdir,
        requests,
        contacts,
        n_requests,
    } = batch;

    let result = run_chromosome_pipeline(tempdir.path(), &requests, &contacts, flank_bins);

    if let Err(error) = tempdir.close() {
        warn!(
            "Failed to remove temporary files for chromosome {}: {}",
            chrom, error
        );
    }

    match result {
        Ok(Some(accumulators)) if !accumulators.is_empty() => {
            info!(
                "Chromosome {}: matched {} of {} requested pairs",
                chrom,
                accumulators.len(),
                n_requests
            );
            ChromOutcome::Aggregated(accumulators)
        }
        Ok(Some(_)) => ChromOutcome::Empty("no contact matched any requested pair"),
        Ok(None) => ChromOutcome::Empty("no usable contact records"),
        Err(error) => ChromOutcome::Failed(error),
    }
}

fn run_chromosome_pipeline(
    workdir: &Path,
    requests: &Path,
    contacts: &Path,
    flank_bins: u64,
) -> Result<Option<HashMap<PairKey, PairAccumulator>>> {
    let no_contacts = !contacts.exists()
        || fs::metadata(contacts)
            .with_context(|| format!("Failed to stat {:?}", contacts))?
            .len()
            == 0;
    if no_contacts {
        return Ok(None);
    }

    let sorted_requests = workdir.join(consts::SORTED_REQUEST_FILE);
    let sorted_contacts = workdir.join(consts::SORTED_CONTACT_FILE);
    sort_by_bin_pair(requests, &sorted_requests)?;
    sort_by_bin_pair(contacts, &sorted_contacts)?;

    let request_reader = get_dynamic_reader(&sorted_requests)?;
    let contact_reader = get_dynamic_reader(&sorted_contacts)?;
    let accumulators = aggregate_sorted_streams(request_reader, contact_reader, flank_bins)?;

    Ok(Some(accumulators))
}
