use anyhow::Result;
use clap::{arg, Arg, ArgMatches, Command};

use super::*;
use crate::pileup::driver::{run_pileup, PileupConfig};

pub fn make_pileup_cli() -> Command {
    Command::new(consts::PILEUP_CMD)
        .about("Aggregate normalized contact submatrices around peak pairs.")
        .arg(Arg::new("pairs"))
        .arg(Arg::new("contacts"))
        .arg(arg!(--"chrom-sizes" <chrom_sizes>).required(true))
        .arg(arg!(--resolution <resolution>))
        .arg(arg!(--window <window>))
        .arg(arg!(--biases <biases>))
        .arg(arg!(--threads <threads>))
        .arg(arg!(--tmpdir <tmpdir>))
        .arg(arg!(--output <output>))
}

pub mod handlers {

    use std::path::PathBuf;

    use anyhow::Context;

    use super::*;

    fn parse_or_default<T: std::str::FromStr>(
        matches: &ArgMatches,
        id: &str,
        default: T,
    ) -> Result<T>
    where
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match matches.get_one::<String>(id) {
            Some(value) => value
                .parse::<T>()
                .with_context(|| format!("Invalid --{} value: {}", id, value)),
            None => Ok(default),
        }
    }

    pub fn run_pair_pileup(matches: &ArgMatches) -> Result<()> {
        let pairs = matches
            .get_one::<String>("pairs")
            .expect("A path to a peak pair list is required.");

        let contacts = matches
            .get_one::<String>("contacts")
            .expect("A path to a contact record file is required.");

        let chrom_sizes = matches
            .get_one::<String>("chrom-sizes")
            .expect("A path to a chrom sizes table is required.");

        let resolution = parse_or_default(matches, "resolution", consts::DEFAULT_RESOLUTION)?;
        let window_span = parse_or_default(matches, "window", consts::DEFAULT_WINDOW_SPAN)?;
        let threads = parse_or_default(matches, "threads", consts::DEFAULT_THREADS)?;

        let tmpdir = match matches.get_one::<String>("tmpdir") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::temp_dir(),
        };

        let default_out = consts::DEFAULT_OUT.to_string();
        let output = matches.get_one::<String>("output").unwrap_or(&default_out);

        let config = PileupConfig {
            chrom_sizes: PathBuf::from(chrom_sizes),
            pairs: PathBuf::from(pairs),
            contacts: PathBuf::from(contacts),
            biases: matches.get_one::<String>("biases").map(PathBuf::from),
            resolution,
            window_span,
            threads,
            tmpdir,
            output: PathBuf::from(output),
        };

        run_pileup(&config)?;

        Ok(())
    }
}
