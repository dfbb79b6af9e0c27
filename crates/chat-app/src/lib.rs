#![deny(unsafe_code)]

/// Command-line entry and session bootstrap.
pub mod app;
pub mod error;
pub mod logging;
/// Line-editor loop feeding the conversation.
pub mod repl;
/// Layered configuration.
pub mod settings;
/// Incremental terminal rendering of the transcript.
pub mod view;

pub use app::{Cli, run};
pub use error::{AppError, AppResult};
pub use settings::{Settings, SettingsError};
pub use view::TerminalView;
