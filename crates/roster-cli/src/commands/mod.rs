pub mod bootstrap;
pub mod common;
pub mod completions;
pub mod export;
pub mod plan;
pub mod schedule;
pub mod sync;
