use anyhow::Result;
use clap::Command;
// go through the library crate to get the interfaces
use pairpile::pileup;
use pairpile::windows;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = env!("CARGO_PKG_NAME");
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Extract and aggregate normalized contact submatrices around pairs of genomic peaks.")
        .subcommand_required(true)
        .subcommand(windows::cli::make_windows_cli())
        .subcommand(pileup::cli::make_pileup_cli())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        Some((windows::consts::WINDOWS_CMD, matches)) => {
            windows::cli::handlers::generate_pair_windows(matches)?;
        }
        Some((pileup::consts::PILEUP_CMD, matches)) => {
            pileup::cli::handlers::run_pair_pileup(matches)?;
        }
        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
