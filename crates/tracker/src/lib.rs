//! Jira-backed implementation of the core `IssueTracker` port.

pub mod jira;
pub mod payload;

pub use jira::JiraClient;
