use std::collections::HashSet;

use crate::config::AccessConfig;
use crate::domain::chat::UserId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    authorized: HashSet<UserId>,
}

impl AccessPolicy {
    pub fn new(authorized: impl IntoIterator<Item = UserId>) -> Self {
        Self { authorized: authorized.into_iter().collect() }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(config.authorized_user_ids.iter().copied().map(UserId))
    }

    pub fn is_authorized(&self, user_id: UserId) -> bool {
        self.authorized.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::AccessPolicy;
    use crate::config::AccessConfig;
    use crate::domain::chat::UserId;

    #[test]
    fn only_listed_users_are_authorized() {
        let policy = AccessPolicy::from_config(&AccessConfig { authorized_user_ids: vec![42, 7] });

        assert!(policy.is_authorized(UserId(42)));
        assert!(policy.is_authorized(UserId(7)));
        assert!(!policy.is_authorized(UserId(99)));
    }

    #[test]
    fn empty_policy_rejects_everyone() {
        assert!(!AccessPolicy::default().is_authorized(UserId(42)));
    }
}
