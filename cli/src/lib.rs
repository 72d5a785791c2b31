//! `ai-workflow` library surface: configuration, logging setup, the JSON
//! envelope contract, and the command implementations, kept separate from
//! `main.rs` so `integration-tests` can drive the stack in-process.

pub mod commands;
pub mod config;
pub mod envelope;
pub mod telemetry;

pub use commands::App;
pub use config::Config;
pub use envelope::Envelope;
pub use telemetry::init_telemetry;
