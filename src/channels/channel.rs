//! Channel trait and the message types that cross it.

use async_trait::async_trait;

use crate::error::ChannelError;

/// Reply keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyMarkup {
    /// Leave whatever keyboard the client shows.
    #[default]
    None,
    /// Show a reply keyboard, one button per row.
    Keyboard(Vec<String>),
    /// Hide the reply keyboard.
    RemoveKeyboard,
}

impl ReplyMarkup {
    pub fn keyboard<I, S>(buttons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keyboard(buttons.into_iter().map(Into::into).collect())
    }
}

/// How the client should render a message's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Fixed bot copy with `*bold*` and `_italic_` markers.
    #[default]
    Markdown,
    /// Shown verbatim. Anything containing user input goes out this way.
    Plain,
}

/// A message to send to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub markup: ReplyMarkup,
    pub parse_mode: ParseMode,
}

impl OutgoingMessage {
    /// A Markdown message.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: ReplyMarkup::None,
            parse_mode: ParseMode::Markdown,
        }
    }

    /// A message whose text is sent without any markup parsing.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            parse_mode: ParseMode::Plain,
            ..Self::new(text)
        }
    }

    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = markup;
        self
    }
}

/// A message received from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Sender identity; sessions are keyed by this.
    pub user_id: i64,
    /// Chat to reply into.
    pub chat_id: i64,
    /// `None` when the message carried no text (photo, sticker, …).
    pub text: Option<String>,
    pub user_name: Option<String>,
}

impl IncomingMessage {
    pub fn new(user_id: i64, chat_id: i64, text: Option<&str>) -> Self {
        Self {
            user_id,
            chat_id,
            text: text.map(String::from),
            user_name: None,
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }
}

/// Outbound messaging capability.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Channel name, used in logs and errors.
    fn name(&self) -> &str;

    /// Send a message to a chat.
    async fn send(&self, chat_id: i64, message: &OutgoingMessage) -> Result<(), ChannelError>;
}
