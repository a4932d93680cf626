use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use crate::common::consts::DELIMITER;
use crate::common::models::{ChromIndex, Peak};
use crate::common::utils::{get_dynamic_reader, get_dynamic_writer};
use crate::pileup::biases::BiasTable;

///
/// One sortable request row: a peak pair translated to its global center
/// bins, with `bin1 <= bin2`, still carrying the originating peak labels.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinPairRequest {
    pub bin1: u64,
    pub bin2: u64,
    pub label1: String,
    pub label2: String,
}

impl FromStr for BinPairRequest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 4 {
            anyhow::bail!("Error parsing bin pair request line: {}", s)
        }

        Ok(BinPairRequest {
            bin1: parts[0].parse::<u64>()?,
            bin2: parts[1].parse::<u64>()?,
            label1: parts[2].to_string(),
            label2: parts[3].to_string(),
        })
    }
}

///
/// Peak pairs binned and partitioned by chromosome, with counts of what the
/// filters dropped.
///
#[derive(Debug, Default)]
pub struct BinnedPairs {
    pub by_chrom: HashMap<String, Vec<BinPairRequest>>,
    pub masked: usize,
    pub unindexed: usize,
    pub interchrom: usize,
}

impl BinnedPairs {
    pub fn total_requests(&self) -> usize {
        self.by_chrom.values().map(Vec::len).sum()
    }
}

///
/// Translate the pair list into per-chromosome bin pair requests.
///
/// Each line pairs two `chrom:start-end` intervals. A pair is assigned to the
/// chromosome of its first peak; inter-chromosomal lines are counted and
/// skipped, as are pairs whose center falls outside the indexed bins or
/// touches a masked column. Malformed lines are fatal.
///
pub fn bin_peak_pairs(
    pairs_path: &Path,
    index: &ChromIndex,
    biases: &BiasTable,
) -> Result<BinnedPairs> {
    let reader = get_dynamic_reader(pairs_path)?;

    let mut binned = BinnedPairs::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let (first, second) = line.split_once(DELIMITER).ok_or_else(|| {
            anyhow::anyhow!(
                "Malformed peak pair in {:?} at line {}: {}",
                pairs_path,
                lineno + 1,
                line
            )
        })?;

        let first: Peak = first.trim().parse().with_context(|| {
            format!("Failed to parse peak pair in {:?} at line {}", pairs_path, lineno + 1)
        })?;
        let second: Peak = second.trim().parse().with_context(|| {
            format!("Failed to parse peak pair in {:?} at line {}", pairs_path, lineno + 1)
        })?;

        if first.chrom != second.chrom {
            debug!(
                "Skipping inter-chromosomal pair at line {}: {} / {}",
                lineno + 1,
                first.label(),
                second.label()
            );
            binned.interchrom += 1;
            continue;
        }

        let bins = (
            index.global_bin(&first.chrom, first.center()),
            index.global_bin(&second.chrom, second.center()),
        );
        let (Some(bin1), Some(bin2)) = bins else {
            binned.unindexed += 1;
            continue;
        };

        // keep the request in the upper triangle of the bin space
        let (bin1, bin2, label1, label2) = if bin2 < bin1 {
            (bin2, bin1, second.label(), first.label())
        } else {
            (bin1, bin2, first.label(), second.label())
        };

        if biases.is_masked(bin1) || biases.is_masked(bin2) {
            binned.masked += 1;
            continue;
        }

        binned
            .by_chrom
            .entry(first.chrom.clone())
            .or_default()
            .push(BinPairRequest {
                bin1,
                bin2,
                label1,
                label2,
            });
    }

    Ok(binned)
}

///
/// Write one chromosome's request rows for the external sort stage.
///
pub fn write_request_file(requests: &[BinPairRequest], path: &Path) -> Result<()> {
    let mut writer = get_dynamic_writer(path)?;

    for request in requests {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            request.bin1, request.bin2, request.label1, request.label2
        )?;
    }
    writer.flush()?;

    Ok(())
}

///
/// Per-chromosome contact partition outcome.
///
#[derive(Debug, Default)]
pub struct ContactPartition {
    pub kept: u64,
    pub dropped: u64,
}

///
/// Partition the genome-wide contact stream (`bin1<TAB>bin2<TAB>raw`, global
/// bins) into one file per requested chromosome, applying mask filtering and
/// bias/decay normalization in the same pass. Records touching masked
/// columns, bins outside the index, different chromosomes, or columns with
/// missing correction factors are dropped. Malformed lines are fatal.
///
pub fn partition_contacts(
    contacts_path: &Path,
    index: &ChromIndex,
    biases: &BiasTable,
    targets: &HashMap<String, PathBuf>,
) -> Result<ContactPartition> {
    let reader = get_dynamic_reader(contacts_path)?;

    let mut writers: HashMap<&str, Box<dyn Write>> = HashMap::new();
    for (chrom, path) in targets {
        writers.insert(chrom.as_str(), get_dynamic_writer(path)?);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg} ({per_sec})")
            .unwrap()
            .tick_strings(&["-", "\\", "|", "/"]),
    );
    spinner.set_message("Partitioning contact records...");

    let mut partition = ContactPartition::default();
    let mut processed: u64 = 0;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            anyhow::bail!(
                "Malformed contact record in {:?} at line {}: {}",
                contacts_path,
                lineno + 1,
                line
            )
        }

        let context = || {
            format!(
                "Failed to parse contact record in {:?} at line {}: {}",
                contacts_path,
                lineno + 1,
                line
            )
        };
        let bin1 = parts[0].parse::<u64>().with_context(context)?;
        let bin2 = parts[1].parse::<u64>().with_context(context)?;
        let raw = parts[2].parse::<f64>().with_context(context)?;

        processed += 1;
        if processed % 10_000 == 0 {
            spinner.set_message(format!("Partitioned {} contact records", processed));
        }
        spinner.inc(1);

        let (bin1, bin2) = if bin2 < bin1 { (bin2, bin1) } else { (bin1, bin2) };

        let Some(span) = index.span_of_bin(bin1) else {
            partition.dropped += 1;
            continue;
        };
        if !span.contains_bin(bin2) {
            // inter-chromosomal contact, nothing requests it
            partition.dropped += 1;
            continue;
        }

        if biases.is_masked(bin1) || biases.is_masked(bin2) {
            partition.dropped += 1;
            continue;
        }

        let Some(value) = biases.normalize(&span.chrom, bin1, bin2, raw) else {
            partition.dropped += 1;
            continue;
        };

        match writers.get_mut(span.chrom.as_str()) {
            Some(writer) => {
                writeln!(writer, "{}\t{}\t{}", bin1, bin2, value)?;
                partition.kept += 1;
            }
            None => partition.dropped += 1,
        }
    }

    for writer in writers.values_mut() {
        writer.flush()?;
    }

    spinner.finish_with_message(format!(
        "Partitioned {} contact records ({} kept)",
        processed, partition.kept
    ));

    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Write as _;

    fn test_index() -> ChromIndex {
        let sizes = vec![
            ("chr1".to_string(), 1_000_000),
            ("chr2".to_string(), 500_000),
        ];
        ChromIndex::new(&sizes, 10_000).unwrap()
    }

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[rstest]
    fn test_bin_peak_pairs_partitions_by_chromosome() {
        let pairs = write_temp(
            "chr1:100000-110000\tchr1:400000-410000\n\
             chr2:100000-110000\tchr2:200000-210000\n",
        );

        let binned = bin_peak_pairs(pairs.path(), &test_index(), &BiasTable::default()).unwrap();

        assert_eq!(binned.total_requests(), 2);
        let chr1 = &binned.by_chrom["chr1"];
        assert_eq!(chr1[0].bin1, 10);
        assert_eq!(chr1[0].bin2, 40);
        // chr2 bins are offset by chr1's 100 bins
        let chr2 = &binned.by_chrom["chr2"];
        assert_eq!(chr2[0].bin1, 110);
        assert_eq!(chr2[0].bin2, 120);
    }

    #[rstest]
    fn test_bin_peak_pairs_drops_masked_and_interchrom() {
        let pairs = write_temp(
            "chr1:100000-110000\tchr1:400000-410000\n\
             chr1:100000-110000\tchr2:200000-210000\n",
        );
        let biases: BiasTable = serde_json::from_str(r#"{"badcol": [40]}"#).unwrap();

        let binned = bin_peak_pairs(pairs.path(), &test_index(), &biases).unwrap();

        assert_eq!(binned.total_requests(), 0);
        assert_eq!(binned.masked, 1);
        assert_eq!(binned.interchrom, 1);
    }

    #[rstest]
    fn test_bin_peak_pairs_orders_bins() {
        let pairs = write_temp("chr1:400000-410000\tchr1:100000-110000\n");

        let binned = bin_peak_pairs(pairs.path(), &test_index(), &BiasTable::default()).unwrap();

        let request = &binned.by_chrom["chr1"][0];
        assert_eq!(request.bin1, 10);
        assert_eq!(request.label1, "chr1:100000-110000");
    }

    #[rstest]
    fn test_bin_peak_pairs_rejects_malformed() {
        let pairs = write_temp("chr1:100000-110000 only-one-field\n");

        let result = bin_peak_pairs(pairs.path(), &test_index(), &BiasTable::default());

        assert!(result.is_err());
    }

    #[rstest]
    fn test_partition_contacts_normalizes_and_filters() {
        let contacts = write_temp("10\t40\t8.0\n10\t110\t3.0\n5\t6\t2.0\n9999\t9999\t1.0\n");
        let biases: BiasTable = serde_json::from_str(
            r#"{
                "badcol": [5],
                "biases": {"10": 2.0, "40": 0.5},
                "decay": {"chr1": {"30": 4.0}}
            }"#,
        )
        .unwrap();

        let outdir = tempfile::tempdir().unwrap();
        let target = outdir.path().join("chr1.contacts.tsv");
        let targets = HashMap::from([("chr1".to_string(), target.clone())]);

        let partition =
            partition_contacts(contacts.path(), &test_index(), &biases, &targets).unwrap();

        assert_eq!(partition.kept, 1);
        assert_eq!(partition.dropped, 3);
        let written = std::fs::read_to_string(target).unwrap();
        assert_eq!(written, "10\t40\t2\n");
    }
}
