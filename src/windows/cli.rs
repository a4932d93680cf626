use anyhow::Result;
use clap::{arg, Arg, ArgMatches, Command};

use super::*;
use crate::windows::{write_pair_windows, PairWindows};

pub fn make_windows_cli() -> Command {
    Command::new(consts::WINDOWS_CMD)
        .about("Enumerate candidate peak pairs within distance bands.")
        .arg(Arg::new("peaks"))
        .arg(arg!(--"max-dist" <dist>))
        .arg(arg!(--bands <bands>))
        .arg(arg!(--output <output>))
}

pub mod handlers {

    use std::path::Path;

    use anyhow::Context;

    use crate::common::models::parse_bands;
    use crate::common::utils::extract_peaks_from_bed_file;

    use super::*;

    pub fn generate_pair_windows(matches: &ArgMatches) -> Result<()> {
        let peaks = matches
            .get_one::<String>("peaks")
            .expect("A path to a peak BED file is required.");

        let max_dist = match matches.get_one::<String>("max-dist") {
            Some(dist) => dist
                .parse::<u64>()
                .with_context(|| format!("Invalid --max-dist value: {}", dist))?,
            None => consts::DEFAULT_MAX_DIST,
        };

        let bands = match matches.get_one::<String>("bands") {
            Some(spec) => parse_bands(spec)?,
            None => vec![format!("0-{}", max_dist.saturating_add(1)).parse()?],
        };

        let default_out = consts::DEFAULT_OUT.to_string();
        let output = matches.get_one::<String>("output").unwrap_or(&default_out);

        let peaks = extract_peaks_from_bed_file(Path::new(peaks))?;
        let windows = PairWindows::new(peaks, max_dist, bands);

        write_pair_windows(&windows, Path::new(output))?;

        Ok(())
    }
}
