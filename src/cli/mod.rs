//! Command Line Interface (CLI) layer for s2mosaic.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for product inspection, single
//! product export and batch export. It wires user-provided options to the
//! library functionality exposed via `s2mosaic::api`.
//!
//! If you are embedding s2mosaic into another application, prefer using
//! the high-level `s2mosaic::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
