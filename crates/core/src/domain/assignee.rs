use serde::{Deserialize, Serialize};

use crate::config::AssigneeConfig;

/// Which of the two configured assignees a button press refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssigneeChoice {
    Me,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignee {
    pub account_id: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssigneeDirectory {
    me: Assignee,
    other: Assignee,
}

impl AssigneeDirectory {
    pub fn new(me: Assignee, other: Assignee) -> Self {
        Self { me, other }
    }

    pub fn from_config(config: &AssigneeConfig) -> Self {
        Self::new(
            Assignee { account_id: config.me_id.clone(), label: config.me_label.clone() },
            Assignee { account_id: config.other_id.clone(), label: config.other_label.clone() },
        )
    }

    pub fn resolve(&self, choice: AssigneeChoice) -> &Assignee {
        match choice {
            AssigneeChoice::Me => &self.me,
            AssigneeChoice::Other => &self.other,
        }
    }

    pub fn choices(&self) -> [(AssigneeChoice, &Assignee); 2] {
        [(AssigneeChoice::Me, &self.me), (AssigneeChoice::Other, &self.other)]
    }
}
