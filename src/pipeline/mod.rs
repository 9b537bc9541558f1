//! The build-and-stage pipeline.
//!
//! Stages run strictly in sequence: spec/route generation, schema type
//! generation, compilation into the isolated build directory, extras
//! copying, dependency staging, and (when packaging) artifact relocation.
//! The watch coordinator re-runs the compile and schema stages after the
//! initial pipeline completes.

pub mod artifacts;
pub mod context;
pub mod runner;
pub mod staging;

pub use artifacts::*;
pub use context::*;
pub use runner::*;
pub use staging::*;
