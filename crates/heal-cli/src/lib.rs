//! Heal CLI - drivers behind the `heal` binary
//!
//! - [`simulate`] - feeds a seeded error stream through a [`heal_core::SelfHealer`]
//! - [`predict`] - runs the trend analyzer over a log file
//! - [`logging`] - subscriber setup

pub mod logging;
pub mod predict;
pub mod simulate;

pub use predict::{predict_file, PredictReport};
pub use simulate::{run_simulator, SimulatorConfig, SimulatorReport};
