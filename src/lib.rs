pub mod common;
pub mod pileup;
pub mod windows;
