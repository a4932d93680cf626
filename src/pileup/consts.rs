pub const PILEUP_CMD: &str = "pileup";
pub const DEFAULT_OUT: &str = "pileup_matrices.csv";
pub const DEFAULT_RESOLUTION: u64 = 10_000;
pub const DEFAULT_WINDOW_SPAN: u64 = 100_000;
pub const DEFAULT_THREADS: usize = 4;

pub const REQUEST_FILE: &str = "requests.tsv";
pub const CONTACT_FILE: &str = "contacts.tsv";
pub const SORTED_REQUEST_FILE: &str = "requests.sorted.tsv";
pub const SORTED_CONTACT_FILE: &str = "contacts.sorted.tsv";
