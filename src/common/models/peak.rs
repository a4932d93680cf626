use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::Result;

///
/// A genomic interval of interest. The `chrom:start-end` rendering doubles as
/// the peak's stable identity in pair labels and output lines.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord)]
pub struct Peak {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl Peak {
    pub fn new(chrom: &str, start: u64, end: u64) -> Self {
        Peak {
            chrom: chrom.to_string(),
            start,
            end,
        }
    }

    pub fn center(&self) -> u64 {
        self.start + (self.end - self.start) / 2
    }

    pub fn width(&self) -> u64 {
        self.end - self.start
    }

    pub fn label(&self) -> String {
        format!("{}:{}-{}", self.chrom, self.start, self.end)
    }

    ///
    /// Parse a peak from a BED line (chrom, start, end; extra columns ignored).
    ///
    pub fn from_bed_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            anyhow::bail!(
                "Error parsing peak line: {}. Expected at least chrom, start, and end.",
                line
            )
        }

        let start = parts[1].parse::<u64>()?;
        let end = parts[2].parse::<u64>()?;
        if end < start {
            anyhow::bail!("Error parsing peak line: {}. End precedes start.", line)
        }

        Ok(Peak {
            chrom: parts[0].to_string(),
            start,
            end,
        })
    }
}

impl FromStr for Peak {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (chrom, range) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Error parsing peak label: {}", s))?;
        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Error parsing peak label: {}", s))?;

        let start = start.parse::<u64>()?;
        let end = end.parse::<u64>()?;
        if end < start {
            anyhow::bail!("Error parsing peak label: {}. End precedes start.", s)
        }

        Ok(Peak {
            chrom: chrom.to_string(),
            start,
            end,
        })
    }
}

impl Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}
