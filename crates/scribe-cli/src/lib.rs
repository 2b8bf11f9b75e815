//! # Scribe CLI
//!
//! Command line front end for `scribe-client`: uploads local media, submits
//! transcription jobs, waits for them, and checks webhook signatures.
//!
//! Settings come from `scribe.toml`, the user config directory, `SCRIBE_*`
//! environment variables and command line flags, in increasing precedence.

pub mod cli;
pub mod commands;
pub mod settings;

pub use cli::{Cli, Command};
pub use settings::Settings;
