use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use crate::common::utils::read_chrom_sizes;

///
/// One chromosome's slice of the genome-wide bin numbering.
///
#[derive(Debug, Clone)]
pub struct ChromSpan {
    pub chrom: String,
    pub length: u64,
    pub bin_count: u64,
    pub global_start: u64,
}

impl ChromSpan {
    pub fn global_end(&self) -> u64 {
        self.global_start + self.bin_count
    }

    pub fn contains_bin(&self, global_bin: u64) -> bool {
        global_bin >= self.global_start && global_bin < self.global_end()
    }
}

///
/// Assigns each chromosome a contiguous, non-overlapping range of global bin
/// indices, in the order the sizes table lists them. This collapses genomic
/// coordinates into a single integer space so downstream sorting and
/// merge-joining operate on plain `(bin1, bin2)` keys.
///
#[derive(Debug, Clone)]
pub struct ChromIndex {
    resolution: u64,
    spans: Vec<ChromSpan>,
    by_name: HashMap<String, usize>,
}

impl ChromIndex {
    pub fn new(sizes: &[(String, u64)], resolution: u64) -> Result<Self> {
        if resolution == 0 {
            anyhow::bail!("Resolution must be a positive number of base pairs.")
        }

        let mut spans: Vec<ChromSpan> = Vec::with_capacity(sizes.len());
        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(sizes.len());
        let mut global_start = 0u64;

        for (chrom, length) in sizes {
            if by_name.contains_key(chrom) {
                anyhow::bail!("Duplicate chromosome in sizes table: {}", chrom)
            }

            let bin_count = length / resolution;
            by_name.insert(chrom.clone(), spans.len());
            spans.push(ChromSpan {
                chrom: chrom.clone(),
                length: *length,
                bin_count,
                global_start,
            });
            global_start += bin_count;
        }

        Ok(ChromIndex {
            resolution,
            spans,
            by_name,
        })
    }

    pub fn from_file<T: AsRef<Path>>(path: T, resolution: u64) -> Result<Self> {
        let sizes = read_chrom_sizes(path.as_ref())?;
        ChromIndex::new(&sizes, resolution)
    }

    pub fn resolution(&self) -> u64 {
        self.resolution
    }

    pub fn spans(&self) -> &[ChromSpan] {
        &self.spans
    }

    pub fn span(&self, chrom: &str) -> Option<&ChromSpan> {
        self.by_name.get(chrom).map(|index| &self.spans[*index])
    }

    pub fn total_bins(&self) -> u64 {
        self.spans.last().map(ChromSpan::global_end).unwrap_or(0)
    }

    ///
    /// Global bin index for a genomic position. `None` for unknown chromosomes
    /// and for positions past the last whole bin of the chromosome.
    ///
    pub fn global_bin(&self, chrom: &str, pos: u64) -> Option<u64> {
        let span = self.span(chrom)?;
        if pos >= span.length {
            return None;
        }

        let bin = pos / self.resolution;
        if bin >= span.bin_count {
            return None;
        }

        Some(span.global_start + bin)
    }

    ///
    /// The chromosome span a global bin index belongs to.
    ///
    pub fn span_of_bin(&self, global_bin: u64) -> Option<&ChromSpan> {
        let index = self
            .spans
            .partition_point(|span| span.global_start <= global_bin);
        if index == 0 {
            return None;
        }

        let span = &self.spans[index - 1];
        span.contains_bin(global_bin).then_some(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::*;

    #[fixture]
    fn index() -> ChromIndex {
        let sizes = vec![
            ("chr1".to_string(), 1_000_000),
            ("chr2".to_string(), 500_000),
            ("chr3".to_string(), 255_000),
        ];
        ChromIndex::new(&sizes, 10_000).unwrap()
    }

    #[rstest]
    fn test_contiguous_spans(index: ChromIndex) {
        let spans = index.spans();

        assert_eq!(spans[0].global_start, 0);
        assert_eq!(spans[0].global_end(), 100);
        assert_eq!(spans[1].global_start, 100);
        assert_eq!(spans[1].global_end(), 150);
        // the partial trailing bin of chr3 is not counted
        assert_eq!(spans[2].bin_count, 25);
        assert_eq!(index.total_bins(), 175);
    }

    #[rstest]
    fn test_global_bin(index: ChromIndex) {
        assert_eq!(index.global_bin("chr1", 0), Some(0));
        assert_eq!(index.global_bin("chr1", 105_000), Some(10));
        assert_eq!(index.global_bin("chr2", 5_000), Some(100));
        assert_eq!(index.global_bin("chrX", 0), None);
        assert_eq!(index.global_bin("chr1", 1_000_000), None);
        // position inside chr3's partial trailing bin has no whole bin
        assert_eq!(index.global_bin("chr3", 252_000), None);
    }

    #[rstest]
    fn test_span_of_bin(index: ChromIndex) {
        assert_eq!(index.span_of_bin(0).unwrap().chrom, "chr1");
        assert_eq!(index.span_of_bin(99).unwrap().chrom, "chr1");
        assert_eq!(index.span_of_bin(100).unwrap().chrom, "chr2");
        assert_eq!(index.span_of_bin(174).unwrap().chrom, "chr3");
        assert!(index.span_of_bin(175).is_none());
    }

    #[rstest]
    fn test_offsets_strictly_increasing_random_tables() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let n_chroms = rng.random_range(1..30);
            let resolution = rng.random_range(1_000..100_000u64);
            let sizes: Vec<(String, u64)> = (0..n_chroms)
                .map(|i| {
                    (
                        format!("chr{}", i),
                        rng.random_range(resolution..10_000_000),
                    )
                })
                .collect();

            let index = ChromIndex::new(&sizes, resolution).unwrap();

            let mut previous_end = 0u64;
            for (i, span) in index.spans().iter().enumerate() {
                assert_eq!(span.global_start, previous_end);
                assert!(span.bin_count > 0, "chrom {} has no bins", i);
                previous_end = span.global_end();
            }
        }
    }

    #[rstest]
    fn test_rejects_duplicates_and_zero_resolution() {
        let sizes = vec![("chr1".to_string(), 100), ("chr1".to_string(), 200)];

        assert!(ChromIndex::new(&sizes, 10).is_err());
        assert!(ChromIndex::new(&[("chr1".to_string(), 100)], 0).is_err());
    }
}
