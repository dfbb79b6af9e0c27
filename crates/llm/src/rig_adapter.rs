use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::StreamedAssistantContent;
use snafu::{OptionExt, ResultExt, ensure};
use tokio::sync::mpsc;

use super::persona::Persona;
use super::provider::{
    CompletionsFailedSnafu, EmptyMessageSetSnafu, HttpClientSnafu, LlmProvider,
    MissingApiKeySnafu, ProviderConfig, ProviderError, ProviderMessage, ProviderResult,
    ProviderStreamHandle, ProviderWorker, Role, StreamEvent, StreamRequest, StreamSessionId,
    make_event_stream,
};

pub const RIG_OPENAI_PROVIDER_ID: &str = "openai";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

type RigStreamingResponse = rig::streaming::StreamingCompletionResponse<
    rig::providers::openai::responses_api::streaming::StreamingCompletionResponse,
>;

/// Streams completions from an OpenAI-compatible endpoint with a persona fixed at construction.
pub struct RigProviderAdapter {
    config: ProviderConfig,
    persona: Persona,
}

impl RigProviderAdapter {
    pub fn new(mut config: ProviderConfig, persona: Persona) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );
        persona.validate()?;

        if config.model_id.is_empty() {
            config.model_id = DEFAULT_OPENAI_MODEL.to_string();
        }

        // Surface a malformed endpoint now rather than on the first submit.
        Self::build_client(&config)?;

        tracing::debug!(
            provider_id = %config.provider_id,
            model_id = %config.model_id,
            temperature = persona.temperature,
            top_p = persona.top_p,
            "initialized rig provider adapter"
        );

        Ok(Self { config, persona })
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    fn to_rig_message(message: &ProviderMessage) -> RigMessage {
        match message.role {
            Role::User => RigMessage::user(message.content.clone()),
            Role::Assistant => RigMessage::assistant(message.content.clone()),
        }
    }

    /// Splits the request into the prompt and the turns preceding it.
    fn split_prompt(request: &StreamRequest) -> Option<(RigMessage, Vec<RigMessage>)> {
        let (prompt, history) = request.messages.split_last()?;
        let history = history.iter().map(Self::to_rig_message).collect();
        Some((Self::to_rig_message(prompt), history))
    }

    async fn open_stream(
        config: &ProviderConfig,
        persona: &Persona,
        request: &StreamRequest,
    ) -> ProviderResult<RigStreamingResponse> {
        let client = Self::build_client(config)?;
        let model = client.completion_model(config.model_id.clone());

        let (prompt, history) = Self::split_prompt(request).context(EmptyMessageSetSnafu {
            stage: "open-stream-split-prompt",
            session_id: request.session_id,
        })?;

        tracing::debug!(
            session_id = request.session_id.0,
            model_id = %config.model_id,
            history_len = history.len(),
            "opening provider stream"
        );

        let mut builder = model
            .completion_request(prompt)
            .messages(history)
            .preamble(persona.instruction.clone())
            .temperature(persona.temperature)
            .additional_params(serde_json::json!({ "top_p": persona.top_p }));

        if let Some(max_tokens) = persona.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        builder.stream().await.context(CompletionsFailedSnafu {
            stage: "open-stream",
        })
    }

    fn emit_error_event(
        event_tx: &mpsc::UnboundedSender<StreamEvent>,
        session_id: StreamSessionId,
        error: ProviderError,
    ) {
        let _ = event_tx.send(StreamEvent::error(session_id, error.to_string()));
    }

    fn map_stream_item<R>(
        session_id: StreamSessionId,
        item: StreamedAssistantContent<R>,
    ) -> Option<StreamEvent>
    where
        R: Clone + Unpin,
    {
        match item {
            // Consumers rely on every fragment carrying text.
            StreamedAssistantContent::Text(text) if !text.text.is_empty() => {
                Some(StreamEvent::delta(session_id, text.text))
            }
            _ => None,
        }
    }

    async fn run_stream_worker(
        config: ProviderConfig,
        persona: Persona,
        request: StreamRequest,
        event_tx: mpsc::UnboundedSender<StreamEvent>,
    ) {
        let session_id = request.session_id;
        let mut stream = match Self::open_stream(&config, &persona, &request).await {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(
                    session_id = session_id.0,
                    provider_id = %config.provider_id,
                    model_id = %config.model_id,
                    error = %error,
                    "failed to open provider stream"
                );
                Self::emit_error_event(&event_tx, session_id, error);
                return;
            }
        };

        let mut fragment_count = 0usize;
        while let Some(next_item) = stream.next().await {
            match next_item {
                Ok(item) => {
                    let Some(event) = Self::map_stream_item(session_id, item) else {
                        continue;
                    };
                    fragment_count += 1;
                    if event_tx.send(event).is_err() {
                        tracing::debug!(session_id = session_id.0, "stream consumer went away");
                        return;
                    }
                }
                Err(source) => {
                    tracing::warn!(
                        session_id = session_id.0,
                        fragment_count,
                        error = %source,
                        "provider stream emitted an error chunk"
                    );
                    let error = ProviderError::CompletionsFailed {
                        stage: "stream-chunk",
                        source,
                    };
                    Self::emit_error_event(&event_tx, session_id, error);
                    return;
                }
            }
        }

        tracing::debug!(session_id = session_id.0, fragment_count, "provider stream finished");
        let _ = event_tx.send(StreamEvent::done(session_id));
    }
}

impl LlmProvider for RigProviderAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn persona(&self) -> &Persona {
        &self.persona
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !request.messages.is_empty(),
            EmptyMessageSetSnafu {
                stage: "stream-chat",
                session_id: request.session_id,
            }
        );

        let (event_tx, stream) = make_event_stream(request.session_id);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.config.clone(),
            self.persona.clone(),
            request,
            event_tx,
        ));

        Ok(ProviderStreamHandle { stream, worker })
    }
}
