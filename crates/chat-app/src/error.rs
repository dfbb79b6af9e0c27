use rustyline::error::ReadlineError;
use samvad_llm::ProviderError;
use snafu::Snafu;

use crate::settings::SettingsError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("failed to load settings on `{stage}`: {source}"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("failed to initialize provider on `{stage}`: {source}"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
    #[snafu(display("line editor failed on `{stage}`: {source}"))]
    Editor {
        stage: &'static str,
        source: ReadlineError,
    },
    #[snafu(display("failed to write to the terminal on `{stage}`: {source}"))]
    Render {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;
