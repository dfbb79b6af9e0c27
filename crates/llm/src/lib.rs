use std::sync::Arc;

mod persona;
mod provider;
mod rig_adapter;
#[cfg(any(test, feature = "test-support"))]
mod scripted;

pub use persona::{
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, Persona, SHIVA_APOLOGY, SHIVA_GREETING, SHIVA_INSTRUCTION,
};
pub use provider::{
    LlmProvider, ProviderConfig, ProviderError, ProviderEventStream, ProviderMessage,
    ProviderResult, ProviderStreamHandle, ProviderWorker, Role, StreamEvent, StreamEventPayload,
    StreamRequest, StreamSessionId,
};
pub use rig_adapter::{DEFAULT_OPENAI_MODEL, RIG_OPENAI_PROVIDER_ID, RigProviderAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ScriptStep, ScriptedProvider};

/// Builds the provider named by `config.provider_id`, validating credential and persona.
pub fn create_provider(
    mut config: ProviderConfig,
    persona: Persona,
) -> ProviderResult<Arc<dyn LlmProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "openai" | "rig-openai" => {
            config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
            Ok(Arc::new(RigProviderAdapter::new(config, persona)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let config = ProviderConfig::new("gemini-native", "key", "", "");
        let result = create_provider(config, Persona::default());

        assert!(matches!(
            result,
            Err(ProviderError::UnsupportedProvider { ref provider_id, .. })
                if provider_id == "gemini-native"
        ));
    }

    #[test]
    fn blank_provider_id_defaults_to_openai() {
        let config = ProviderConfig::new("", "key", "", "gpt-4o");
        let provider = create_provider(config, Persona::default()).expect("provider");

        assert_eq!(provider.id(), RIG_OPENAI_PROVIDER_ID);
        assert_eq!(provider.model_id(), "gpt-4o");
    }

    #[test]
    fn missing_credential_is_fatal() {
        let config = ProviderConfig::new("openai", "", "", "");

        assert!(matches!(
            create_provider(config, Persona::default()),
            Err(ProviderError::MissingApiKey { .. })
        ));
    }
}
