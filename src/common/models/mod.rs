pub mod chrom_index;
pub mod peak;
pub mod peak_pair;

// re-export for cleaner imports
pub use self::chrom_index::{ChromIndex, ChromSpan};
pub use self::peak::Peak;
pub use self::peak_pair::{parse_bands, DistanceBand, PeakPair};
