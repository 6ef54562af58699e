use crate::domain::assignee::AssigneeChoice;
use crate::domain::chat::{ChatId, UserId};
use crate::domain::issue::EpicId;

pub const CANCEL_DATA: &str = "cancel";
pub const ASSIGNEE_ME_DATA: &str = "assignee_me";
pub const ASSIGNEE_OTHER_DATA: &str = "assignee_other";
pub const EPIC_DATA_PREFIX: &str = "epic_";

/// A platform event reduced to what the conversation needs: who sent it,
/// where to answer, and what kind of input it carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: UserId,
    pub chat: ChatId,
    pub kind: InboundKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundKind {
    Command(BotCommand),
    Text(String),
    Callback(CallbackAction),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Cancel,
    Help,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Assignee(AssigneeChoice),
    Epic(EpicId),
    Cancel,
    Unknown(String),
}

impl InboundEvent {
    /// Known commands become `Command`; everything else, including unknown
    /// slash-prefixed text, is free text.
    pub fn from_text(sender: UserId, chat: ChatId, text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = match BotCommand::parse(&text) {
            Some(command) => InboundKind::Command(command),
            None => InboundKind::Text(text),
        };
        Self { sender, chat, kind }
    }

    pub fn from_callback(sender: UserId, chat: ChatId, data: &str) -> Self {
        Self { sender, chat, kind: InboundKind::Callback(CallbackAction::parse(data)) }
    }

    pub fn label(&self) -> &'static str {
        match &self.kind {
            InboundKind::Command(BotCommand::Start) => "command.start",
            InboundKind::Command(BotCommand::Cancel) => "command.cancel",
            InboundKind::Command(BotCommand::Help) => "command.help",
            InboundKind::Text(_) => "text",
            InboundKind::Callback(CallbackAction::Assignee(_)) => "callback.assignee",
            InboundKind::Callback(CallbackAction::Epic(_)) => "callback.epic",
            InboundKind::Callback(CallbackAction::Cancel) => "callback.cancel",
            InboundKind::Callback(CallbackAction::Unknown(_)) => "callback.unknown",
        }
    }
}

impl BotCommand {
    /// Accepts `/start`, `/start@SomeBot` and trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "cancel" => Some(Self::Cancel),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        match data {
            CANCEL_DATA => Self::Cancel,
            ASSIGNEE_ME_DATA => Self::Assignee(AssigneeChoice::Me),
            ASSIGNEE_OTHER_DATA => Self::Assignee(AssigneeChoice::Other),
            other => match other.strip_prefix(EPIC_DATA_PREFIX) {
                Some(id) if !id.is_empty() => Self::Epic(EpicId(id.to_owned())),
                _ => Self::Unknown(other.to_owned()),
            },
        }
    }

    pub fn data(&self) -> String {
        match self {
            Self::Cancel => CANCEL_DATA.to_owned(),
            Self::Assignee(AssigneeChoice::Me) => ASSIGNEE_ME_DATA.to_owned(),
            Self::Assignee(AssigneeChoice::Other) => ASSIGNEE_OTHER_DATA.to_owned(),
            Self::Epic(id) => format!("{EPIC_DATA_PREFIX}{id}"),
            Self::Unknown(data) => data.clone(),
        }
    }
}
