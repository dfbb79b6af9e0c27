use std::path::PathBuf;

use clap::Parser;
use samvad_chat::Conversation;
use samvad_llm::create_provider;
use snafu::ResultExt;

use crate::error::{AppResult, ProviderSnafu, SettingsSnafu};
use crate::repl;
use crate::settings::Settings;
use crate::view::TerminalView;

#[derive(Debug, Parser)]
#[command(author, version, about = "Persona chat in the terminal", long_about = None)]
pub struct Cli {
    /// Settings file to read instead of the per-user default.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Model id, overriding settings and environment.
    #[arg(long, value_name = "ID")]
    pub model: Option<String>,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(Settings::default_config_path)
    }

    /// Loads layered settings and applies command-line overrides on top.
    pub fn settings(&self) -> AppResult<Settings> {
        let mut settings = Settings::load(&self.config_path()).context(SettingsSnafu {
            stage: "load-settings",
        })?;
        if let Some(model) = self.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            settings.model = model.to_string();
        }
        Ok(settings)
    }
}

/// Builds the session and runs it until the user leaves.
///
/// A missing credential or an invalid persona fails here, before any prompt is read.
pub async fn run(cli: Cli) -> AppResult<()> {
    let settings = cli.settings()?;
    let provider = create_provider(settings.to_provider_config(), settings.persona())
        .context(ProviderSnafu {
            stage: "create-provider",
        })?;
    tracing::info!(
        provider_id = provider.id(),
        model_id = provider.model_id(),
        "provider ready"
    );

    let mut conversation = Conversation::new(provider);
    let mut view = TerminalView::new(std::io::stdout());
    repl::run(&mut conversation, &mut view).await
}
