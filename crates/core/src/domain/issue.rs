use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpicId(pub String);

impl fmt::Display for EpicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub id: EpicId,
    pub title: String,
}

impl Epic {
    /// A blank title falls back to the id so the epic still gets a
    /// usable button label.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let id = id.into();
        let title = title.into();
        let title = if title.trim().is_empty() { id.clone() } else { title };
        Self { id: EpicId(id), title }
    }
}

/// Epics offered to one session, keyed by id and kept in tracker order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicCatalog {
    epics: Vec<Epic>,
}

impl EpicCatalog {
    /// Later duplicates of an id are dropped; the first title wins.
    pub fn from_epics(epics: impl IntoIterator<Item = Epic>) -> Self {
        let mut catalog = Self::default();
        for epic in epics {
            if !catalog.contains(&epic.id) {
                catalog.epics.push(epic);
            }
        }
        catalog
    }

    pub fn contains(&self, id: &EpicId) -> bool {
        self.epics.iter().any(|epic| &epic.id == id)
    }

    pub fn title(&self, id: &EpicId) -> Option<&str> {
        self.epics.iter().find(|epic| &epic.id == id).map(|epic| epic.title.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Epic> {
        self.epics.iter()
    }

    pub fn len(&self) -> usize {
        self.epics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epics.is_empty()
    }
}

/// The four values submitted to the tracker for one completed session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub summary: String,
    pub description: String,
    pub assignee_id: String,
    pub epic_id: EpicId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub key: String,
}

impl CreatedIssue {
    pub fn browse_url(&self, web_base_url: &str) -> String {
        format!("{web_base_url}/browse/{}", self.key)
    }
}
