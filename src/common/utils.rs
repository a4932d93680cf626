use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::common::consts::GZ_FILE_EXTENSION;
use crate::common::models::Peak;

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new(GZ_FILE_EXTENSION));
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;

    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    let reader = BufReader::new(file);

    Ok(reader)
}

///
/// Get a writer that gzip-compresses when the target path ends in `.gz`.
///
/// # Arguments
///
/// - path: path to the file to create
///
pub fn get_dynamic_writer(path: &Path) -> Result<Box<dyn Write>> {
    let is_gzipped = path.extension() == Some(OsStr::new(GZ_FILE_EXTENSION));
    let file = File::create(path).with_context(|| format!("Failed to create file: {:?}", path))?;

    let writer: Box<dyn Write> = match is_gzipped {
        true => Box::new(BufWriter::new(GzEncoder::new(file, Compression::default()))),
        false => Box::new(BufWriter::new(file)),
    };

    Ok(writer)
}

///
/// Read a chromosome sizes table: one chromosome name and length per line,
/// whitespace-separated. Input order is preserved.
///
pub fn read_chrom_sizes(path: &Path) -> Result<Vec<(String, u64)>> {
    let reader = get_dynamic_reader(path)?;

    let mut sizes: Vec<(String, u64)> = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(chrom), Some(length)) => {
                let length = length.parse::<u64>().with_context(|| {
                    format!(
                        "Failed to parse chromosome length in {:?} at line {}: {}",
                        path,
                        index + 1,
                        line
                    )
                })?;
                sizes.push((chrom.to_string(), length));
            }
            _ => anyhow::bail!(
                "Malformed chrom sizes entry in {:?} at line {}: {}",
                path,
                index + 1,
                line
            ),
        }
    }

    Ok(sizes)
}

///
/// Extract peaks from a BED file (chrom, start, end; extra columns ignored).
///
pub fn extract_peaks_from_bed_file(path: &Path) -> Result<Vec<Peak>> {
    let reader = get_dynamic_reader(path)?;

    let mut peaks: Vec<Peak> = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let peak = Peak::from_bed_line(&line).with_context(|| {
            format!("Failed to parse peak in {:?} at line {}", path, index + 1)
        })?;
        peaks.push(peak);
    }

    Ok(peaks)
}
