use crate::domain::assignee::AssigneeDirectory;
use crate::domain::chat::ChatId;
use crate::domain::issue::EpicCatalog;
use crate::errors::ApplicationError;
use crate::inbound::{CallbackAction, CANCEL_DATA};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyButton {
    pub label: String,
    pub data: String,
}

impl ReplyButton {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self { label: label.into(), data: data.into() }
    }

    pub fn cancel() -> Self {
        Self::new("Cancel", CANCEL_DATA)
    }
}

/// Platform-neutral answer to one inbound event: text plus optional rows of
/// buttons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Vec<Vec<ReplyButton>>,
}

impl Reply {
    pub fn has_buttons(&self) -> bool {
        self.keyboard.iter().any(|row| !row.is_empty())
    }

    pub fn button_data(&self) -> Vec<&str> {
        self.keyboard.iter().flatten().map(|button| button.data.as_str()).collect()
    }
}

pub struct ReplyBuilder {
    chat_id: ChatId,
    text: String,
    keyboard: Vec<Vec<ReplyButton>>,
}

impl ReplyBuilder {
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self { chat_id, text: text.into(), keyboard: Vec::new() }
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut row = RowBuilder::default();
        build(&mut row);
        if !row.buttons.is_empty() {
            self.keyboard.push(row.buttons);
        }
        self
    }

    pub fn build(self) -> Reply {
        Reply { chat_id: self.chat_id, text: self.text, keyboard: self.keyboard }
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<ReplyButton>,
}

impl RowBuilder {
    pub fn button(&mut self, button: ReplyButton) -> &mut Self {
        self.buttons.push(button);
        self
    }
}

pub fn unauthorized(chat_id: ChatId) -> Reply {
    ReplyBuilder::new(chat_id, "Sorry, you are not authorized to use this bot.").build()
}

pub fn help(chat_id: ChatId) -> Reply {
    ReplyBuilder::new(
        chat_id,
        "I create tracker issues step by step.\n\
         /start - begin a new issue (summary, description, assignee, epic)\n\
         /cancel - drop the issue in progress\n\
         /help - show this message",
    )
    .build()
}

pub fn prompt_summary(chat_id: ChatId) -> Reply {
    ReplyBuilder::new(chat_id, "Let's create a new issue. Send me the issue summary.").build()
}

pub fn prompt_description(chat_id: ChatId) -> Reply {
    ReplyBuilder::new(chat_id, "Got it. Now send me the issue description.")
        .row(|row| {
            row.button(ReplyButton::cancel());
        })
        .build()
}

pub fn prompt_assignee(chat_id: ChatId, assignees: &AssigneeDirectory) -> Reply {
    ReplyBuilder::new(chat_id, "Who should the issue be assigned to?")
        .row(|row| {
            for (choice, assignee) in assignees.choices() {
                row.button(ReplyButton::new(
                    assignee.label.clone(),
                    CallbackAction::Assignee(choice).data(),
                ));
            }
        })
        .row(|row| {
            row.button(ReplyButton::cancel());
        })
        .build()
}

pub fn prompt_epic(chat_id: ChatId, epics: &EpicCatalog) -> Reply {
    let mut builder = ReplyBuilder::new(chat_id, "Pick the epic for this issue.");
    for epic in epics.iter() {
        builder = builder.row(|row| {
            row.button(ReplyButton::new(
                epic.title.clone(),
                CallbackAction::Epic(epic.id.clone()).data(),
            ));
        });
    }
    builder
        .row(|row| {
            row.button(ReplyButton::cancel());
        })
        .build()
}

pub fn epics_unavailable(chat_id: ChatId) -> Reply {
    ReplyBuilder::new(
        chat_id,
        "Could not load epics from the tracker. Please try again later with /start.",
    )
    .build()
}

pub fn issue_created(chat_id: ChatId, browse_url: &str) -> Reply {
    ReplyBuilder::new(chat_id, format!("Issue created successfully: {browse_url}")).build()
}

pub fn issue_creation_failed(chat_id: ChatId) -> Reply {
    ReplyBuilder::new(chat_id, "Failed to create the issue in the tracker. Start over with /start.")
        .build()
}

pub fn cancelled(chat_id: ChatId) -> Reply {
    ReplyBuilder::new(chat_id, "Issue creation cancelled.").build()
}

pub fn nothing_to_cancel(chat_id: ChatId) -> Reply {
    ReplyBuilder::new(chat_id, "There is nothing to cancel.").build()
}

pub fn error(chat_id: ChatId, error: &ApplicationError) -> Reply {
    ReplyBuilder::new(chat_id, error.user_message()).build()
}

#[cfg(test)]
mod tests {
    use crate::domain::assignee::{Assignee, AssigneeDirectory};
    use crate::domain::chat::ChatId;
    use crate::domain::issue::{Epic, EpicCatalog};

    use super::{prompt_assignee, prompt_epic, prompt_summary, ReplyBuilder};

    #[test]
    fn empty_rows_are_dropped() {
        let reply = ReplyBuilder::new(ChatId(1), "text").row(|_| {}).build();
        assert!(reply.keyboard.is_empty());
        assert!(!reply.has_buttons());
    }

    #[test]
    fn summary_prompt_has_no_buttons() {
        assert!(!prompt_summary(ChatId(1)).has_buttons());
    }

    #[test]
    fn assignee_prompt_offers_two_people_and_cancel() {
        let directory = AssigneeDirectory::new(
            Assignee { account_id: "acc-me".to_owned(), label: "Me".to_owned() },
            Assignee { account_id: "acc-dana".to_owned(), label: "Dana".to_owned() },
        );

        let reply = prompt_assignee(ChatId(9), &directory);

        assert_eq!(reply.button_data(), vec!["assignee_me", "assignee_other", "cancel"]);
        assert_eq!(reply.keyboard[0][1].label, "Dana");
    }

    #[test]
    fn epic_prompt_has_one_row_per_epic() {
        let catalog =
            EpicCatalog::from_epics([Epic::new("10", "Q3 Platform"), Epic::new("11", "Billing")]);

        let reply = prompt_epic(ChatId(9), &catalog);

        assert_eq!(reply.keyboard.len(), 3);
        assert_eq!(reply.button_data(), vec!["epic_10", "epic_11", "cancel"]);
        assert_eq!(reply.keyboard[1][0].label, "Billing");
    }
}
