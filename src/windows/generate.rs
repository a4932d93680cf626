use std::io::Write;
use std::path::Path;

use anyhow::Result;
use log::info;

use crate::common::consts::DELIMITER;
use crate::common::models::{DistanceBand, Peak, PeakPair};
use crate::common::utils::get_dynamic_writer;

///
/// Enumerates candidate peak pairs: intra-chromosomal pairs whose center
/// distance stays within `max_dist` and falls into one of the configured
/// distance bands. Pairs are emitted once, in canonical genomic order.
///
/// The enumeration is lazy and restartable: `iter()` walks the same peak set
/// again from the start.
///
pub struct PairWindows {
    peaks: Vec<Peak>,
    max_dist: u64,
    bands: Vec<DistanceBand>,
}

impl PairWindows {
    pub fn new(mut peaks: Vec<Peak>, max_dist: u64, bands: Vec<DistanceBand>) -> Self {
        peaks.sort();
        PairWindows {
            peaks,
            max_dist,
            bands,
        }
    }

    pub fn iter(&self) -> PairWindowIter<'_> {
        PairWindowIter {
            windows: self,
            first: 0,
            second: 1,
        }
    }
}

pub struct PairWindowIter<'a> {
    windows: &'a PairWindows,
    first: usize,
    second: usize,
}

impl<'a> PairWindowIter<'a> {
    fn advance_anchor(&mut self) {
        self.first += 1;
        self.second = self.first + 1;
    }
}

impl<'a> Iterator for PairWindowIter<'a> {
    type Item = PeakPair;

    fn next(&mut self) -> Option<Self::Item> {
        let peaks = &self.windows.peaks;

        while self.first < peaks.len() {
            if self.second >= peaks.len() {
                self.advance_anchor();
                continue;
            }

            let anchor = &peaks[self.first];
            let other = &peaks[self.second];

            // peaks are sorted by position, so once the partner's start passes
            // the anchor's reach, no later partner can pair with this anchor
            if anchor.chrom != other.chrom
                || other.start > anchor.center() + self.windows.max_dist
            {
                self.advance_anchor();
                continue;
            }

            self.second += 1;

            let distance = other.center().abs_diff(anchor.center());
            if distance > self.windows.max_dist {
                continue;
            }

            if let Some(band) = self.windows.bands.iter().find(|band| band.contains(distance)) {
                return Some(PeakPair::new(
                    anchor.clone(),
                    other.clone(),
                    band.label.clone(),
                ));
            }
        }

        None
    }
}

///
/// Write the pair list consumed by the pileup stage: one pair per line,
/// `chrom1:start1-end1<TAB>chrom2:start2-end2`.
///
pub fn write_pair_windows(windows: &PairWindows, output: &Path) -> Result<usize> {
    let mut writer = get_dynamic_writer(output)?;

    let mut count = 0;
    for pair in windows.iter() {
        writeln!(
            writer,
            "{}{}{}",
            pair.first.label(),
            DELIMITER,
            pair.second.label()
        )?;
        count += 1;
    }
    writer.flush()?;

    info!("Wrote {} peak pairs to {:?}", count, output);

    Ok(count)
}
