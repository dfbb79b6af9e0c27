use std::io::{self, Write};

use chrono::Local;
use samvad_chat::{Conversation, Message, MessageId, MessageStatus, Role};

pub const TITLE: &str = "शिव वाणी (Shiva AI)";
pub const SUBTITLE: &str = "साक्षात शिव स्वरूप";
pub const MOTTO: &str = "सत्यं शिवं सुंदरम्";
pub const FOOTER: &str = "ज्ञानं परमं ध्येयम्";
/// Shown while the pending reply has no text yet.
pub const THINKING: &str = "महाकाल विचार कर रहे हैं...";
pub const INPUT_PROMPT: &str = "अपनी जिज्ञासा यहाँ लिखें › ";

pub const USER_LABEL: &str = "वत्स";
pub const MODEL_LABEL: &str = "शिव";
pub const FAILED_LABEL: &str = "शिव ⚠";

const RULE: &str = "────────────────────────────────────────";
const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy)]
struct OpenMessage {
    id: MessageId,
    printed: usize,
    labelled: bool,
}

/// Append-only transcript renderer.
///
/// A terminal cannot rewrite earlier lines, so the view remembers how much of the transcript
/// it already printed and only emits the difference on each [`TerminalView::sync`]. Closed
/// messages are never revisited; the pending reply stays open until the turn ends.
pub struct TerminalView<W: Write> {
    out: W,
    closed: usize,
    open: Option<OpenMessage>,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            closed: 0,
            open: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render_header(&mut self) -> io::Result<()> {
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "  {TITLE}")?;
        writeln!(self.out, "  {SUBTITLE} · {MOTTO}")?;
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn render_footer(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "  {FOOTER}")?;
        self.out.flush()
    }

    /// Prints everything that changed since the previous call.
    pub fn sync(&mut self, conversation: &Conversation) -> io::Result<()> {
        let pending = conversation.pending_message_id();

        for message in conversation.messages().iter().skip(self.closed) {
            let is_pending = pending == Some(message.id());
            if self.open.is_none_or(|open| open.id != message.id()) {
                self.open_message(message, is_pending)?;
            }
            self.write_new_text(message)?;
            if is_pending {
                break;
            }
            self.close_message(message)?;
        }

        self.out.flush()
    }

    fn open_message(&mut self, message: &Message, is_pending: bool) -> io::Result<()> {
        if is_pending && message.text().is_empty() {
            writeln!(self.out, "  {THINKING}")?;
        }
        self.open = Some(OpenMessage {
            id: message.id(),
            printed: 0,
            labelled: false,
        });
        Ok(())
    }

    fn write_new_text(&mut self, message: &Message) -> io::Result<()> {
        let Some(open) = self.open.as_mut() else {
            return Ok(());
        };
        let fresh = message.text().get(open.printed..).unwrap_or_default();
        if fresh.is_empty() {
            return Ok(());
        }

        if !open.labelled {
            write!(self.out, "{} › ", label(message))?;
            open.labelled = true;
        }
        write!(self.out, "{fresh}")?;
        open.printed = message.text().len();
        Ok(())
    }

    fn close_message(&mut self, message: &Message) -> io::Result<()> {
        let labelled = self.open.take().is_some_and(|open| open.labelled);
        self.closed += 1;
        // Replies that ended without any text leave no trace on screen.
        if !labelled {
            return Ok(());
        }

        let time = message.timestamp().with_timezone(&Local).format(TIME_FORMAT);
        writeln!(self.out)?;
        writeln!(self.out, "  {time}")?;
        writeln!(self.out)
    }
}

fn label(message: &Message) -> &'static str {
    match (message.role(), message.status()) {
        (Role::User, _) => USER_LABEL,
        (Role::Model, MessageStatus::Failed(_)) => FAILED_LABEL,
        (Role::Model, _) => MODEL_LABEL,
    }
}
