//! CLI channel: stdin/stdout REPL for local testing.
//!
//! `/name` sends a command, `!code` presses the button with that action
//! code and anything else is typed text.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::channels::{
    EventKind, EventStream, IncomingEvent, Keyboard, MessageRef, NOOP_ACTION, UiChannel,
};
use crate::error::ChannelError;

/// A CLI channel acting as a single chat user.
pub struct CliChannel {
    user_id: i64,
    language_code: Option<String>,
    next_message_id: AtomicI64,
}

impl CliChannel {
    pub fn new(user_id: i64, language_code: Option<String>) -> Self {
        Self {
            user_id,
            language_code,
            next_message_id: AtomicI64::new(1),
        }
    }
}

/// Parse one input line into an event kind.
fn parse_line(line: &str) -> Option<EventKind> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(command) = line.strip_prefix('/') {
        return Some(EventKind::Command(
            command.split_whitespace().next().unwrap_or_default().to_string(),
        ));
    }
    if let Some(action) = line.strip_prefix('!') {
        return Some(EventKind::Action {
            data: action.trim().to_string(),
            message: None,
        });
    }
    Some(EventKind::Text(line.to_string()))
}

/// Keyboard as text, one row per line: `[label] !code`.
fn format_keyboard(keyboard: &Keyboard) -> String {
    keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| {
                    if b.action == NOOP_ACTION {
                        format!("[{}]", b.text)
                    } else {
                        format!("[{}] !{}", b.text, b.action)
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl UiChannel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user_id = self.user_id;
        let language_code = self.language_code.clone();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(kind) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        let event = IncomingEvent {
                            user_id,
                            language_code: language_code.clone(),
                            kind,
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn render(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        if user_id == self.user_id {
            println!("\n#{message_id}\n{text}");
        } else {
            println!("\n#{message_id} (to {user_id})\n{text}");
        }
        if let Some(keyboard) = keyboard {
            println!("{}", format_keyboard(keyboard));
        }
        eprint!("> ");
        Ok(MessageRef {
            chat_id: user_id,
            message_id,
        })
    }

    async fn edit_buttons(
        &self,
        message: &MessageRef,
        keyboard: &Keyboard,
    ) -> Result<(), ChannelError> {
        println!("\n#{} (buttons)\n{}", message.message_id, format_keyboard(keyboard));
        eprint!("> ");
        Ok(())
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        println!("\n#{} (edited)\n{text}", message.message_id);
        if let Some(keyboard) = keyboard {
            println!("{}", format_keyboard(keyboard));
        }
        eprint!("> ");
        Ok(())
    }

    async fn delete(&self, message: &MessageRef) -> Result<(), ChannelError> {
        tracing::debug!(message_id = message.message_id, "CLI message dismissed");
        Ok(())
    }
}
