//! Jira REST v3 wire shapes used by [`crate::JiraClient`].

use serde::{Deserialize, Serialize};

use taskrelay_core::domain::issue::IssueRequest;

#[derive(Debug, Serialize)]
pub struct CreateIssueBody<'a> {
    pub fields: CreateIssueFields<'a>,
}

#[derive(Debug, Serialize)]
pub struct CreateIssueFields<'a> {
    pub project: KeyRef<'a>,
    pub summary: &'a str,
    pub description: AdfDocument<'a>,
    pub issuetype: NameRef<'a>,
    pub assignee: IdRef<'a>,
    pub parent: IdRef<'a>,
}

#[derive(Debug, Serialize)]
pub struct KeyRef<'a> {
    pub key: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NameRef<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct IdRef<'a> {
    pub id: &'a str,
}

/// Atlassian document holding one paragraph of plain text. Empty text
/// yields an empty paragraph, since ADF text nodes must not be blank.
#[derive(Debug, Serialize)]
pub struct AdfDocument<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: u8,
    pub content: [AdfParagraph<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct AdfParagraph<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: Vec<AdfText<'a>>,
}

#[derive(Debug, Serialize)]
pub struct AdfText<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
}

impl<'a> AdfDocument<'a> {
    pub fn plain(text: &'a str) -> Self {
        Self {
            kind: "doc",
            version: 1,
            content: [AdfParagraph {
                kind: "paragraph",
                content: if text.is_empty() {
                    Vec::new()
                } else {
                    vec![AdfText { kind: "text", text }]
                },
            }],
        }
    }
}

impl<'a> CreateIssueBody<'a> {
    pub fn new(project_key: &'a str, issue_type: &'a str, request: &'a IssueRequest) -> Self {
        Self {
            fields: CreateIssueFields {
                project: KeyRef { key: project_key },
                summary: &request.summary,
                description: AdfDocument::plain(&request.description),
                issuetype: NameRef { name: issue_type },
                assignee: IdRef { id: &request.assignee_id },
                parent: IdRef { id: &request.epic_id.0 },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatedIssueResponse {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
pub struct SearchIssue {
    pub id: String,
    #[serde(default)]
    pub fields: SearchFields,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchFields {
    #[serde(default)]
    pub summary: String,
}

/// Jira's error envelope; only used to build a diagnostic string.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default, rename = "errorMessages")]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub errors: serde_json::Map<String, serde_json::Value>,
}

impl ErrorBody {
    pub fn summarize(&self) -> Option<String> {
        let mut parts: Vec<String> = self.error_messages.clone();
        parts.extend(self.errors.iter().map(|(field, value)| match value.as_str() {
            Some(text) => format!("{field}: {text}"),
            None => format!("{field}: {value}"),
        }));
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use taskrelay_core::domain::issue::{EpicId, IssueRequest};

    use super::{CreateIssueBody, ErrorBody, SearchResponse};

    #[test]
    fn create_body_carries_exactly_the_four_inputs() {
        let request = IssueRequest {
            summary: "Fix login bug".to_owned(),
            description: "Button disabled on Safari".to_owned(),
            assignee_id: "acc-me".to_owned(),
            epic_id: EpicId("10".to_owned()),
        };

        let body = serde_json::to_value(CreateIssueBody::new("PROJ", "Task", &request))
            .expect("serialize");

        assert_eq!(
            body,
            json!({
                "fields": {
                    "project": { "key": "PROJ" },
                    "summary": "Fix login bug",
                    "description": {
                        "type": "doc",
                        "version": 1,
                        "content": [{
                            "type": "paragraph",
                            "content": [{ "type": "text", "text": "Button disabled on Safari" }]
                        }]
                    },
                    "issuetype": { "name": "Task" },
                    "assignee": { "id": "acc-me" },
                    "parent": { "id": "10" }
                }
            })
        );
    }

    #[test]
    fn empty_description_becomes_an_empty_paragraph() {
        let request = IssueRequest {
            summary: "Rotate keys".to_owned(),
            description: String::new(),
            assignee_id: "acc-other".to_owned(),
            epic_id: EpicId("11".to_owned()),
        };

        let body = serde_json::to_value(CreateIssueBody::new("PROJ", "Task", &request))
            .expect("serialize");

        assert_eq!(
            body["fields"]["description"],
            json!({
                "type": "doc",
                "version": 1,
                "content": [{ "type": "paragraph", "content": [] }]
            })
        );
    }

    #[test]
    fn search_response_tolerates_missing_fields() {
        let parsed: SearchResponse = serde_json::from_value(json!({
            "total": 2,
            "issues": [
                { "id": "10", "key": "PROJ-1", "fields": { "summary": "Q3 Platform" } },
                { "id": "11", "key": "PROJ-2" }
            ]
        }))
        .expect("parse");

        assert_eq!(parsed.issues.len(), 2);
        assert_eq!(parsed.issues[0].fields.summary, "Q3 Platform");
        assert_eq!(parsed.issues[1].fields.summary, "");
    }

    #[test]
    fn error_body_summary_joins_messages_and_field_errors() {
        let parsed: ErrorBody = serde_json::from_value(json!({
            "errorMessages": ["Issue does not exist"],
            "errors": { "parent": "Given parent is not an epic" }
        }))
        .expect("parse");

        assert_eq!(
            parsed.summarize().as_deref(),
            Some("Issue does not exist; parent: Given parent is not an epic")
        );
        assert_eq!(ErrorBody::default().summarize(), None);
    }
}
