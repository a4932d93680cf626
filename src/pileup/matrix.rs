use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::Result;

use crate::common::utils::get_dynamic_writer;
use crate::pileup::merge::{PairAccumulator, PairKey};

///
/// Dense, row-major window matrix. Row and column 0 hold the most negative
/// relative offset, so cell `(row, col)` is offset
/// `(row - flank, col - flank)`.
///
pub struct PileupMatrix {
    data: Vec<f64>,
    size: usize,
}

impl PileupMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0.0; size * size],
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&f64> {
        if row < self.size && col < self.size {
            self.data.get(row * self.size + col)
        } else {
            None
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    ///
    /// Materialize one pair's accumulator into its window matrix. Unobserved
    /// cells stay 0.0; offsets outside the flank are never produced by the
    /// aggregator and are ignored here.
    ///
    pub fn from_accumulator(accumulator: &PairAccumulator, flank_bins: u64) -> Self {
        let size = (2 * flank_bins + 1) as usize;
        let mut matrix = PileupMatrix::new(size);

        let flank = flank_bins as i64;
        for (dx, dy) in accumulator.offsets() {
            let row = dx + flank;
            let col = dy + flank;
            if (0..size as i64).contains(&row) && (0..size as i64).contains(&col) {
                matrix.data[row as usize * size + col as usize] = accumulator.mean(dx, dy);
            }
        }

        matrix
    }
}

///
/// Write the aggregate matrix file: one line per pair with at least one
/// observation, `label1,label2,v00,v01,...` with the window matrix flattened
/// row-major. Lines are sorted by pair labels so reruns are byte-identical.
///
pub fn write_pileup_matrices(
    accumulators: &HashMap<PairKey, PairAccumulator>,
    flank_bins: u64,
    path: &Path,
) -> Result<usize> {
    let mut keys: Vec<&PairKey> = accumulators
        .iter()
        .filter(|(_, accumulator)| !accumulator.is_empty())
        .map(|(key, _)| key)
        .collect();
    keys.sort();

    let mut writer = get_dynamic_writer(path)?;

    for key in &keys {
        let matrix = PileupMatrix::from_accumulator(&accumulators[*key], flank_bins);

        write!(writer, "{},{}", key.0, key.1)?;
        for value in matrix.values() {
            write!(writer, ",{}", value)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;

    Ok(keys.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn accumulator() -> PairAccumulator {
        let mut accumulator = PairAccumulator::default();
        accumulator.observe(0, 0, 4.0);
        accumulator.observe(0, 0, 6.0);
        accumulator.observe(1, -1, 2.0);
        accumulator
    }

    #[rstest]
    fn test_matrix_shape(accumulator: PairAccumulator) {
        let matrix = PileupMatrix::from_accumulator(&accumulator, 2);

        assert_eq!(matrix.size(), 5);
        assert_eq!(matrix.values().len(), 25);
        assert!(matrix.get(5, 0).is_none());
    }

    #[rstest]
    fn test_matrix_cell_placement(accumulator: PairAccumulator) {
        let matrix = PileupMatrix::from_accumulator(&accumulator, 2);

        // offset (0,0) is the center cell, (1,-1) one down and one left
        assert_eq!(matrix.get(2, 2), Some(&5.0));
        assert_eq!(matrix.get(3, 1), Some(&2.0));
        assert_eq!(matrix.get(0, 0), Some(&0.0));
    }

    #[rstest]
    fn test_write_sorted_lines(accumulator: PairAccumulator) {
        let mut accumulators: HashMap<PairKey, PairAccumulator> = HashMap::new();
        accumulators.insert(("b".to_string(), "c".to_string()), accumulator.clone());
        accumulators.insert(("a".to_string(), "z".to_string()), accumulator);
        accumulators.insert(
            ("never".to_string(), "observed".to_string()),
            PairAccumulator::default(),
        );

        let dir = tempfile::tempdir().unwrap();
        let outfile = dir.path().join("matrices.csv");

        let written = write_pileup_matrices(&accumulators, 1, &outfile).unwrap();

        assert_eq!(written, 2);
        let content = std::fs::read_to_string(&outfile).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a,z,"));
        assert!(lines[1].starts_with("b,c,"));
        // 3x3 window flattened to 9 cells after the two labels
        assert_eq!(lines[0].split(',').count(), 11);
    }

    #[rstest]
    fn test_write_gz_roundtrip(accumulator: PairAccumulator) {
        use std::io::Read as _;

        let mut accumulators: HashMap<PairKey, PairAccumulator> = HashMap::new();
        accumulators.insert(("a".to_string(), "b".to_string()), accumulator);

        let dir = tempfile::tempdir().unwrap();
        let outfile = dir.path().join("matrices.csv.gz");

        write_pileup_matrices(&accumulators, 2, &outfile).unwrap();

        let file = std::fs::File::open(&outfile).unwrap();
        let mut content = String::new();
        flate2::read::MultiGzDecoder::new(file)
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.starts_with("a,b,"));
        assert!(content.contains(",5,"));
    }
}
