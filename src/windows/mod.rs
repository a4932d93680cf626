pub mod cli;
pub mod consts;
pub mod generate;

// Re-exports
pub use generate::*;
