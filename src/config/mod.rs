//! Configuration helpers shared by the CLI options.

mod duration;

pub use duration::parse_duration;
