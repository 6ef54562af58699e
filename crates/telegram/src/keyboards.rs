use serde::Serialize;
use tracing::warn;

use taskrelay_core::reply::{Reply, ReplyButton};

/// Bot API limit on `callback_data`, in bytes.
pub const CALLBACK_DATA_LIMIT: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

impl From<&ReplyButton> for InlineKeyboardButton {
    fn from(button: &ReplyButton) -> Self {
        Self::new(button.label.clone(), button.data.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// Body of a `sendMessage` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

pub fn render_reply(reply: &Reply) -> OutgoingMessage {
    let inline_keyboard: Vec<Vec<InlineKeyboardButton>> = reply
        .keyboard
        .iter()
        .map(|row| row.iter().filter(|button| fits_callback_limit(button)).map(Into::into).collect())
        .filter(|row: &Vec<InlineKeyboardButton>| !row.is_empty())
        .collect();

    OutgoingMessage {
        chat_id: reply.chat_id.0,
        text: reply.text.clone(),
        reply_markup: (!inline_keyboard.is_empty()).then_some(InlineKeyboardMarkup { inline_keyboard }),
    }
}

fn fits_callback_limit(button: &ReplyButton) -> bool {
    if button.data.len() <= CALLBACK_DATA_LIMIT {
        return true;
    }
    warn!(
        event_name = "egress.telegram.button_dropped",
        label = %button.label,
        data_len = button.data.len(),
        "button payload exceeds the callback data limit"
    );
    false
}
