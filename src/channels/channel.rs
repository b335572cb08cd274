//! UI channel contract shared by every chat transport.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A single inline button: visible label plus the action code sent back
/// when it is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub action: String,
}

impl Button {
    pub fn new(text: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: action.into(),
        }
    }

    /// A label-only cell that does nothing when pressed.
    pub fn inert(text: impl Into<String>) -> Self {
        Self::new(text, NOOP_ACTION)
    }
}

/// Action code for buttons that carry no behavior (headers, page counters).
pub const NOOP_ACTION: &str = "0";

/// Rows of buttons, top to bottom.
pub type Keyboard = Vec<Vec<Button>>;

/// Handle to a message already shown to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Slash command without the leading slash, e.g. `start`.
    Command(String),
    /// Free text typed by the user.
    Text(String),
    /// Inline button press carrying its action code.
    Action {
        data: String,
        message: Option<MessageRef>,
    },
}

/// An inbound event from a chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub user_id: i64,
    /// Language code reported by the platform, if any.
    pub language_code: Option<String>,
    pub kind: EventKind,
}

impl IncomingEvent {
    pub fn command(user_id: i64, name: &str) -> Self {
        Self {
            user_id,
            language_code: None,
            kind: EventKind::Command(name.to_string()),
        }
    }

    pub fn text(user_id: i64, text: &str) -> Self {
        Self {
            user_id,
            language_code: None,
            kind: EventKind::Text(text.to_string()),
        }
    }

    pub fn action(user_id: i64, data: &str) -> Self {
        Self {
            user_id,
            language_code: None,
            kind: EventKind::Action {
                data: data.to_string(),
                message: None,
            },
        }
    }

    pub fn with_language(mut self, code: &str) -> Self {
        self.language_code = Some(code.to_string());
        self
    }
}

/// Stream of inbound events from a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = IncomingEvent> + Send>>;

/// Chat transport used by the bot and the wizard.
#[async_trait]
pub trait UiChannel: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    /// Start receiving events.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Send a new message, optionally with inline buttons.
    async fn render(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError>;

    /// Replace the buttons of an existing message in place.
    async fn edit_buttons(
        &self,
        message: &MessageRef,
        keyboard: &Keyboard,
    ) -> Result<(), ChannelError>;

    /// Replace text and buttons of an existing message in place.
    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError>;

    /// Remove a message previously sent by the bot.
    async fn delete(&self, message: &MessageRef) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_builders() {
        let e = IncomingEvent::action(7, "confirm").with_language("pl");
        assert_eq!(e.user_id, 7);
        assert_eq!(e.language_code.as_deref(), Some("pl"));
        assert_eq!(
            e.kind,
            EventKind::Action {
                data: "confirm".into(),
                message: None
            }
        );
    }

    #[test]
    fn inert_button_uses_noop_action() {
        assert_eq!(Button::inert("1/3").action, NOOP_ACTION);
    }
}
