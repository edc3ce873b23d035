//! Text splitting: configuration profiles and the separator-ladder splitter.

pub mod config;
pub mod splitter;

pub use config::SplitConfig;
pub use splitter::split;
