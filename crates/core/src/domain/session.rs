use crate::domain::chat::{ChatId, UserId};
use crate::domain::issue::{EpicCatalog, EpicId, IssueRequest};
use crate::errors::DomainError;
use crate::flows::FlowState;

/// In-flight answers for one user's issue-creation conversation.
///
/// Fields fill strictly in order: summary, description, assignee, epic
/// candidates. Each `record_*` call refuses to set a field whose predecessor
/// is still empty, and none of them overwrite an existing value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    user_id: UserId,
    chat_id: ChatId,
    state: FlowState,
    summary: Option<String>,
    description: Option<String>,
    assignee_id: Option<String>,
    epic_candidates: Option<EpicCatalog>,
}

impl Session {
    pub fn new(user_id: UserId, chat_id: ChatId) -> Self {
        Self {
            user_id,
            chat_id,
            state: FlowState::AwaitingSummary,
            summary: None,
            description: None,
            assignee_id: None,
            epic_candidates: None,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn assignee_id(&self) -> Option<&str> {
        self.assignee_id.as_deref()
    }

    pub fn epic_candidates(&self) -> Option<&EpicCatalog> {
        self.epic_candidates.as_ref()
    }

    pub(crate) fn advance(&mut self, state: FlowState) {
        self.state = state;
    }

    pub fn record_summary(&mut self, summary: impl Into<String>) -> Result<(), DomainError> {
        if self.summary.is_some() {
            return Err(DomainError::FieldAlreadySet("summary"));
        }
        self.summary = Some(summary.into());
        Ok(())
    }

    pub fn record_description(&mut self, description: impl Into<String>) -> Result<(), DomainError> {
        require(&self.summary, "description", "summary")?;
        if self.description.is_some() {
            return Err(DomainError::FieldAlreadySet("description"));
        }
        self.description = Some(description.into());
        Ok(())
    }

    pub fn record_assignee(&mut self, assignee_id: impl Into<String>) -> Result<(), DomainError> {
        require(&self.description, "assignee", "description")?;
        if self.assignee_id.is_some() {
            return Err(DomainError::FieldAlreadySet("assignee"));
        }
        self.assignee_id = Some(assignee_id.into());
        Ok(())
    }

    pub fn attach_epics(&mut self, catalog: EpicCatalog) -> Result<(), DomainError> {
        require(&self.assignee_id, "epic_candidates", "assignee")?;
        if self.epic_candidates.is_some() {
            return Err(DomainError::FieldAlreadySet("epic_candidates"));
        }
        self.epic_candidates = Some(catalog);
        Ok(())
    }

    pub fn issue_request(&self, epic_id: &EpicId) -> Result<IssueRequest, DomainError> {
        let summary = self.summary.clone().ok_or(DomainError::IncompleteSession("summary"))?;
        let description =
            self.description.clone().ok_or(DomainError::IncompleteSession("description"))?;
        let assignee_id =
            self.assignee_id.clone().ok_or(DomainError::IncompleteSession("assignee"))?;
        let candidates =
            self.epic_candidates.as_ref().ok_or(DomainError::IncompleteSession("epic_candidates"))?;
        if !candidates.contains(epic_id) {
            return Err(DomainError::UnknownEpic(epic_id.clone()));
        }

        Ok(IssueRequest { summary, description, assignee_id, epic_id: epic_id.clone() })
    }
}

fn require<T>(
    predecessor: &Option<T>,
    field: &'static str,
    requires: &'static str,
) -> Result<(), DomainError> {
    if predecessor.is_none() {
        return Err(DomainError::OutOfOrderField { field, requires });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::domain::chat::{ChatId, UserId};
    use crate::domain::issue::{Epic, EpicCatalog, EpicId};
    use crate::errors::DomainError;

    use super::Session;

    fn session() -> Session {
        Session::new(UserId(42), ChatId(4200))
    }

    #[test]
    fn fields_fill_in_order_and_produce_request() {
        let mut session = session();
        session.record_summary("Fix login bug").expect("summary");
        session.record_description("Button disabled on Safari").expect("description");
        session.record_assignee("acc-me").expect("assignee");
        session.attach_epics(EpicCatalog::from_epics([Epic::new("10", "Q3 Platform")])).expect("epics");

        let request = session.issue_request(&EpicId("10".to_owned())).expect("request");
        assert_eq!(request.summary, "Fix login bug");
        assert_eq!(request.description, "Button disabled on Safari");
        assert_eq!(request.assignee_id, "acc-me");
        assert_eq!(request.epic_id, EpicId("10".to_owned()));
    }

    #[test]
    fn later_field_is_rejected_while_earlier_is_absent() {
        let mut session = session();

        let error = session.record_description("too early").expect_err("needs summary");
        assert_eq!(
            error,
            DomainError::OutOfOrderField { field: "description", requires: "summary" }
        );
        assert!(session.description().is_none());

        let error = session.attach_epics(EpicCatalog::default()).expect_err("needs assignee");
        assert!(matches!(error, DomainError::OutOfOrderField { field: "epic_candidates", .. }));
    }

    #[test]
    fn fields_are_not_overwritten() {
        let mut session = session();
        session.record_summary("first").expect("summary");

        let error = session.record_summary("second").expect_err("summary is set once");
        assert_eq!(error, DomainError::FieldAlreadySet("summary"));
        assert_eq!(session.summary(), Some("first"));
    }

    #[test]
    fn empty_text_is_accepted_verbatim() {
        let mut session = session();
        session.record_summary("").expect("empty summary");
        session.record_description("").expect("empty description");
        assert_eq!(session.summary(), Some(""));
        assert_eq!(session.description(), Some(""));
    }

    #[test]
    fn request_requires_known_epic() {
        let mut session = session();
        session.record_summary("s").expect("summary");
        session.record_description("d").expect("description");
        session.record_assignee("a").expect("assignee");
        session.attach_epics(EpicCatalog::from_epics([Epic::new("10", "Q3")])).expect("epics");

        let error = session.issue_request(&EpicId("99".to_owned())).expect_err("unknown epic");
        assert_eq!(error, DomainError::UnknownEpic(EpicId("99".to_owned())));
    }
}
