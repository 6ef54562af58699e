pub mod assignee;
pub mod chat;
pub mod issue;
pub mod session;
