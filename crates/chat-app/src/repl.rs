use std::io::Write;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use samvad_chat::{Conversation, SubmitOutcome};
use snafu::ResultExt;

use crate::error::{AppError, AppResult, EditorSnafu, RenderSnafu};
use crate::view::{INPUT_PROMPT, TerminalView};

/// Reads prompts until `Ctrl-C` or `Ctrl-D`.
///
/// No line is read while a turn is streaming, which is the only input lock the terminal needs.
pub async fn run<W: Write>(
    conversation: &mut Conversation,
    view: &mut TerminalView<W>,
) -> AppResult<()> {
    let mut editor = DefaultEditor::new().context(EditorSnafu {
        stage: "create-editor",
    })?;

    view.render_header().context(RenderSnafu {
        stage: "render-header",
    })?;
    view.sync(conversation).context(RenderSnafu {
        stage: "render-greeting",
    })?;

    loop {
        match editor.readline(INPUT_PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty()
                    && let Err(error) = editor.add_history_entry(line.as_str())
                {
                    tracing::debug!(%error, "failed to record history entry");
                }
                handle_line(conversation, view, &line).await?;
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(source) => {
                return Err(AppError::Editor {
                    stage: "read-line",
                    source,
                });
            }
        }
    }

    view.render_footer().context(RenderSnafu {
        stage: "render-footer",
    })
}

/// Submits one line and renders every intermediate state.
///
/// Rendering errors do not interrupt the turn; the first one is reported once it ends.
pub async fn handle_line<W: Write>(
    conversation: &mut Conversation,
    view: &mut TerminalView<W>,
    line: &str,
) -> AppResult<SubmitOutcome> {
    let mut render_error = None;
    let outcome = conversation
        .submit(line, |conversation| {
            if let Err(error) = view.sync(conversation) {
                render_error.get_or_insert(error);
            }
        })
        .await;

    match &outcome {
        SubmitOutcome::Failed { reason, .. } => {
            tracing::debug!(%reason, "turn ended with an apology");
        }
        SubmitOutcome::Ignored(rejection) => {
            tracing::debug!(?rejection, "line ignored");
        }
        SubmitOutcome::Completed { .. } => {}
    }

    match render_error {
        Some(source) => Err(source).context(RenderSnafu {
            stage: "render-turn",
        }),
        None => Ok(outcome),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use samvad_chat::{Role, SubmitRejected};
    use samvad_llm::{SHIVA_APOLOGY, ScriptStep, ScriptedProvider};

    use super::*;
    use crate::view::{FAILED_LABEL, MODEL_LABEL};

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn lines_drive_full_turns() {
        let provider = Arc::new(ScriptedProvider::new());
        provider
            .push_fragments(["ॐ", " नमः", " शिवाय"])
            .push_turn(vec![ScriptStep::Fail("quota".to_string())]);
        let mut conversation = Conversation::with_greeting(provider.clone(), "प्रणाम");
        let mut view = TerminalView::new(Vec::new());

        let first = handle_line(&mut conversation, &mut view, "नमस्ते")
            .await
            .expect("first turn");
        let second = handle_line(&mut conversation, &mut view, "?")
            .await
            .expect("second turn");

        assert!(matches!(first, SubmitOutcome::Completed { .. }));
        assert!(matches!(second, SubmitOutcome::Failed { ref reason, .. } if reason == "quota"));
        assert_eq!(provider.requests().len(), 2);

        let roles = conversation
            .messages()
            .iter()
            .map(|message| message.role())
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            [Role::Model, Role::User, Role::Model, Role::User, Role::Model, Role::Model]
        );

        let output = String::from_utf8(view.into_inner()).expect("utf-8 output");
        assert!(output.contains(&format!("{MODEL_LABEL} › ॐ नमः शिवाय")));
        assert!(output.contains(&format!("{FAILED_LABEL} › {SHIVA_APOLOGY}")));
    }

    #[tokio::test]
    async fn blank_line_is_ignored_without_output() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut conversation = Conversation::with_greeting(provider.clone(), "प्रणाम");
        let mut view = TerminalView::new(Vec::new());

        let outcome = handle_line(&mut conversation, &mut view, "   ")
            .await
            .expect("blank line");

        assert_eq!(outcome, SubmitOutcome::Ignored(SubmitRejected::EmptyPrompt));
        assert!(provider.requests().is_empty());
        assert!(view.into_inner().is_empty());
    }

    #[tokio::test]
    async fn render_failure_is_reported_after_the_turn_finishes() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_fragments(["ॐ"]);
        let mut conversation = Conversation::with_greeting(provider, "प्रणाम");
        let mut view = TerminalView::new(BrokenPipe);

        let result = handle_line(&mut conversation, &mut view, "नमस्ते").await;

        assert!(matches!(result, Err(AppError::Render { .. })));
        assert!(!conversation.is_loading());
        assert_eq!(conversation.last_message().map(|message| message.text()), Some("ॐ"));
    }
}
