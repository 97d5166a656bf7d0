use std::collections::HashSet;

use crate::config::AccessConfig;
use crate::types::UserId;

/// Decides who may run privileged operations (roster import, export).
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admins: HashSet<i64>,
}

impl AccessPolicy {
    pub fn new(admin_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            admins: admin_ids.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(config.admin_ids.iter().copied())
    }

    pub fn is_privileged(&self, user: UserId) -> bool {
        self.admins.contains(&user.0)
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_privileged() {
        let policy = AccessPolicy::new([1, 2]);
        assert!(policy.is_privileged(UserId(1)));
        assert!(!policy.is_privileged(UserId(3)));
    }

    #[test]
    fn test_empty_policy_denies_everyone() {
        let policy = AccessPolicy::from_config(&AccessConfig::default());
        assert!(!policy.is_privileged(UserId(0)));
        assert!(policy.is_empty());
    }
}
