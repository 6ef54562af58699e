pub mod access;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod inbound;
pub mod reply;
pub mod store;
pub mod tracker;

pub use access::AccessPolicy;
pub use coordinator::{Coordinator, CoordinatorSettings};
pub use domain::assignee::{Assignee, AssigneeChoice, AssigneeDirectory};
pub use domain::chat::{ChatId, UserId};
pub use domain::issue::{CreatedIssue, Epic, EpicCatalog, EpicId, IssueRequest};
pub use domain::session::Session;
pub use errors::{ApplicationError, DomainError};
pub use flows::{FlowEngine, FlowEvent, FlowState};
pub use inbound::{BotCommand, CallbackAction, InboundEvent, InboundKind};
pub use reply::{Reply, ReplyButton};
pub use store::SessionStore;
pub use tracker::{IssueTracker, TrackerError};
