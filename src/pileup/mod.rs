pub mod biases;
pub mod binner;
pub mod cli;
pub mod consts;
pub mod driver;
pub mod matrix;
pub mod merge;
pub mod sort;

// Re-exports
pub use driver::*;
