use thiserror::Error;

use crate::{domain::issue::EpicId, flows::FlowTransitionError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("session field `{field}` cannot be set before `{requires}`")]
    OutOfOrderField { field: &'static str, requires: &'static str },
    #[error("session field `{0}` is already set")]
    FieldAlreadySet(&'static str),
    #[error("session is incomplete: `{0}` is missing")]
    IncompleteSession(&'static str),
    #[error("epic `{0}` is not among the session candidates")]
    UnknownEpic(EpicId),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid selection `{0}`")]
    InvalidSelection(String),
}

impl ApplicationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(_) => "Unexpected error. Please restart with /start.",
            Self::InvalidSelection(_) => "Invalid selection. Please restart with /start.",
        }
    }
}
