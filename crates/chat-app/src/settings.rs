use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use samvad_llm::{
    DEFAULT_OPENAI_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TOP_P, Persona, ProviderConfig,
    RIG_OPENAI_PROVIDER_ID,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

/// Default base URL for OpenAI API.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
/// Prefix for environment overrides, e.g. `SAMVAD_MODEL`.
pub const ENV_PREFIX: &str = "SAMVAD_";
/// Bare credential variable, honoured below the prefixed one.
pub const API_KEY_ENV: &str = "API_KEY";

const SETTINGS_DIRECTORY_NAME: &str = "samvad";
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to extract settings from `{}` on `{stage}`: {source}", path.display()))]
    Extract {
        stage: &'static str,
        path: PathBuf,
        source: figment::Error,
    },
}

/// Session configuration, layered from defaults, the settings file and the environment.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: Option<u64>,
    /// Replaces the built-in persona instruction when set.
    pub persona_instruction: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider_id: RIG_OPENAI_PROVIDER_ID.to_string(),
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: None,
            persona_instruction: None,
        }
    }
}

// Keeps the credential out of logs and error reports.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("provider_id", &self.provider_id)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("persona_instruction", &self.persona_instruction)
            .finish()
    }
}

impl Settings {
    /// Returns `<config_dir>/samvad/settings.json`, or a relative path when the platform has
    /// no config directory.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_DIRECTORY_NAME)
            .join(SETTINGS_FILE_NAME)
    }

    /// Layering, lowest first: defaults, `path` (skipped when missing), `API_KEY`, then
    /// `SAMVAD_*` variables.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Json::file(path))
            .merge(Env::raw().only(&[API_KEY_ENV]))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let settings: Settings = Self::figment(path)
            .extract()
            .context(ExtractSnafu {
                stage: "extract-settings",
                path: path.to_path_buf(),
            })?;

        tracing::debug!(
            path = %path.display(),
            provider_id = %settings.provider_id,
            model = %settings.model,
            has_api_key = settings.is_valid(),
            "settings loaded"
        );
        Ok(settings)
    }

    /// Returns true if the settings carry a non-empty API key.
    pub fn is_valid(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(
            &self.provider_id,
            &self.api_key,
            &self.endpoint,
            &self.model,
        )
    }

    /// Builds the session persona. Range checks happen when the provider is created.
    pub fn persona(&self) -> Persona {
        let mut persona = Persona::shiva()
            .with_temperature(self.temperature)
            .with_top_p(self.top_p);

        if let Some(instruction) = self
            .persona_instruction
            .as_deref()
            .map(str::trim)
            .filter(|instruction| !instruction.is_empty())
        {
            persona = persona.with_instruction(instruction);
        }
        if let Some(max_tokens) = self.max_tokens {
            persona = persona.with_max_tokens(max_tokens);
        }

        persona
    }
}
