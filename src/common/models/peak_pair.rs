use std::str::FromStr;

use anyhow::Result;

use crate::common::models::Peak;

///
/// Two peaks considered jointly, tagged with the distance band their center
/// distance falls into. Construction canonicalizes the ordering by genomic
/// position so each unordered pair has exactly one identity.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeakPair {
    pub first: Peak,
    pub second: Peak,
    pub band: String,
}

impl PeakPair {
    pub fn new(a: Peak, b: Peak, band: String) -> Self {
        let (first, second) = if b < a { (b, a) } else { (a, b) };
        PeakPair {
            first,
            second,
            band,
        }
    }

    /// Distance between the two peak centers, in base pairs.
    pub fn distance(&self) -> u64 {
        self.second.center().abs_diff(self.first.center())
    }
}

///
/// A labeled half-open distance interval `[lo, hi)` in base pairs, parsed
/// from the `lo-hi` form.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceBand {
    pub label: String,
    pub lo: u64,
    pub hi: u64,
}

impl DistanceBand {
    pub fn contains(&self, distance: u64) -> bool {
        distance >= self.lo && distance < self.hi
    }
}

impl FromStr for DistanceBand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (lo, hi) = s
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Error parsing distance band: {}", s))?;

        let lo = lo.parse::<u64>()?;
        let hi = hi.parse::<u64>()?;
        if hi <= lo {
            anyhow::bail!("Error parsing distance band: {}. Empty interval.", s)
        }

        Ok(DistanceBand {
            label: s.to_string(),
            lo,
            hi,
        })
    }
}

///
/// Parse a comma-separated list of distance bands.
///
pub fn parse_bands(spec: &str) -> Result<Vec<DistanceBand>> {
    spec.split(',')
        .map(|band| band.trim().parse::<DistanceBand>())
        .collect()
}
