pub const WINDOWS_CMD: &str = "windows";
pub const DEFAULT_OUT: &str = "peak_pairs.tsv";
pub const DEFAULT_MAX_DIST: u64 = 1_000_000;
