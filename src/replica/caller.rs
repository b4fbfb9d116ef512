//! Identity of the person driving the replica

use crate::types::{JoinRequest, LeaveRequest, MemberId};
use std::collections::HashSet;

/// The person on whose behalf operations are issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub member_id: MemberId,
    pub display_name: Option<String>,
    pub handle: Option<String>,
    /// Whether the caller may clear or delete queues
    pub privileged: bool,
}

impl Caller {
    pub fn join_request(&self) -> JoinRequest {
        JoinRequest {
            member_id: Some(self.member_id.clone()),
            display_name: self.display_name.clone(),
            handle: self.handle.clone(),
        }
    }

    pub fn leave_request(&self) -> LeaveRequest {
        LeaveRequest::new(self.member_id.clone())
    }
}

/// Decides which callers are privileged, by handle
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    privileged_handles: HashSet<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            privileged_handles: handles
                .into_iter()
                .map(|h| normalize_handle(h.as_ref()))
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn is_privileged(&self, handle: Option<&str>) -> bool {
        handle
            .map(normalize_handle)
            .is_some_and(|h| self.privileged_handles.contains(&h))
    }

    /// Build a caller, deriving the privileged flag from its handle
    pub fn caller(
        &self,
        member_id: impl Into<MemberId>,
        display_name: Option<String>,
        handle: Option<String>,
    ) -> Caller {
        let privileged = self.is_privileged(handle.as_deref());
        Caller {
            member_id: member_id.into(),
            display_name,
            handle,
            privileged,
        }
    }
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privileged_handles_match_case_insensitively() {
        let policy = AccessPolicy::new(["admin", "@Desk_Lead"]);
        assert!(policy.is_privileged(Some("ADMIN")));
        assert!(policy.is_privileged(Some("@desk_lead")));
        assert!(!policy.is_privileged(Some("guest")));
        assert!(!policy.is_privileged(None));
    }

    #[test]
    fn test_caller_requests_carry_identity() {
        let policy = AccessPolicy::new(["admin"]);
        let caller = policy.caller("42", Some("Ann".into()), Some("admin".into()));
        assert!(caller.privileged);

        let join = caller.join_request();
        assert_eq!(join.member_id.as_deref(), Some("42"));
        assert_eq!(join.display_name.as_deref(), Some("Ann"));
        assert_eq!(caller.leave_request().member_id.as_deref(), Some("42"));
    }
}
