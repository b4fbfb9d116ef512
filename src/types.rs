//! Common types used throughout the waitline service

use crate::error::{QueueError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Unique identifier for queues
pub type QueueId = String;

/// Externally supplied identity of a queue member
pub type MemberId = String;

/// Reserved id of the queue that always exists
pub const DEFAULT_QUEUE_ID: &str = "default";

/// Display name given to the reserved queue
pub const DEFAULT_QUEUE_NAME: &str = "Main queue";

/// Wait-per-person figure used before any service duration was observed
pub const DEFAULT_AVG_MINUTES: f64 = 5.0;

/// Lower bound of the wait-per-person figure
pub const MIN_AVG_MINUTES: f64 = 0.1;

/// Default capacity of the rolling service duration window
pub const DEFAULT_SAMPLE_CAPACITY: usize = 100;

/// A person waiting in a queue. Fields are fixed at join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_at: DateTime<Utc>,
}

/// Summary of a queue as returned by list and create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMeta {
    pub id: QueueId,
    pub name: String,
    pub size: usize,
    pub avg_service_minutes: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Full view of one queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDetail {
    pub id: QueueId,
    pub name: String,
    pub members: Vec<Member>,
    pub avg_service_minutes: f64,
}

impl QueueDetail {
    /// 1-based position of a member, 0 when absent
    pub fn position_of(&self, member_id: &str) -> usize {
        self.members
            .iter()
            .position(|m| m.id == member_id)
            .map(|index| index + 1)
            .unwrap_or(0)
    }

    /// Estimated wait in minutes for a member, `None` when not queued
    pub fn eta_for(&self, member_id: &str) -> Option<f64> {
        match self.position_of(member_id) {
            0 => None,
            position => Some(crate::wait_time::estimated_wait_minutes(
                position,
                self.avg_service_minutes,
            )),
        }
    }
}

/// Queue list plus the detail of the queue currently being looked at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueView {
    pub queues: Vec<QueueMeta>,
    pub selected: QueueDetail,
}

/// Request to create a queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueueRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl CreateQueueRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Trimmed, non-empty queue name
    pub fn validate(&self) -> Result<String> {
        non_blank(self.name.as_deref())
            .map(str::to_string)
            .ok_or_else(|| QueueError::validation("queue name required"))
    }

    /// Trimmed, lowercased requested id, if one was supplied
    pub fn requested_id(&self) -> Option<String> {
        non_blank(self.id.as_deref()).map(str::to_lowercase)
    }
}

/// Request to join a queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default, alias = "userId", deserialize_with = "string_or_number")]
    pub member_id: Option<MemberId>,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default, alias = "username")]
    pub handle: Option<String>,
}

impl JoinRequest {
    pub fn new(member_id: impl Into<MemberId>) -> Self {
        Self {
            member_id: Some(member_id.into()),
            display_name: None,
            handle: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn validate(&self) -> Result<MemberId> {
        required_member_id(self.member_id.as_deref())
    }
}

/// Request to leave a queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    #[serde(default, alias = "userId", deserialize_with = "string_or_number")]
    pub member_id: Option<MemberId>,
}

impl LeaveRequest {
    pub fn new(member_id: impl Into<MemberId>) -> Self {
        Self {
            member_id: Some(member_id.into()),
        }
    }

    pub fn validate(&self) -> Result<MemberId> {
        required_member_id(self.member_id.as_deref())
    }
}

// HTTP wire bodies shared by the reference binding and its client

/// Response of the list operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueListResponse {
    pub queues: Vec<QueueMeta>,
}

/// Response of the create operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueResponse {
    pub ok: bool,
    pub queue: QueueMeta,
}

/// Response of the join operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub ok: bool,
    pub position: usize,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Body of every rejected request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    #[serde(default)]
    pub kind: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required_member_id(value: Option<&str>) -> Result<MemberId> {
    non_blank(value)
        .map(str::to_string)
        .ok_or_else(|| QueueError::validation("memberId required"))
}

/// Member ids arrive either as strings or as integers from chat platforms
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(text) => text,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_requires_trimmed_name() {
        assert!(CreateQueueRequest::new("   ").validate().is_err());
        assert!(CreateQueueRequest::default().validate().is_err());
        assert_eq!(
            CreateQueueRequest::new("  Front Desk ").validate().unwrap(),
            "Front Desk"
        );
    }

    #[test]
    fn test_requested_id_is_normalised() {
        let request = CreateQueueRequest::new("x").with_id("  Lab-A ");
        assert_eq!(request.requested_id().as_deref(), Some("lab-a"));
        assert_eq!(CreateQueueRequest::new("x").with_id("  ").requested_id(), None);
    }

    #[test]
    fn test_join_request_accepts_legacy_field_names() {
        let request: JoinRequest =
            serde_json::from_str(r#"{"userId": 42, "name": "Ann", "username": "ann"}"#).unwrap();
        assert_eq!(request.member_id.as_deref(), Some("42"));
        assert_eq!(request.display_name.as_deref(), Some("Ann"));
        assert_eq!(request.handle.as_deref(), Some("ann"));

        let request: JoinRequest = serde_json::from_str(r#"{"memberId": "u1"}"#).unwrap();
        assert_eq!(request.validate().unwrap(), "u1");
    }

    #[test]
    fn test_missing_member_id_is_validation_error() {
        let request: LeaveRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            request.validate(),
            Err(QueueError::Validation { .. })
        ));
        assert!(LeaveRequest::new(" ").validate().is_err());
    }

    #[test]
    fn test_detail_position_and_eta() {
        let now = Utc::now();
        let member = |id: &str| Member {
            id: id.to_string(),
            display_name: None,
            handle: None,
            joined_at: now,
        };
        let detail = QueueDetail {
            id: "q1".to_string(),
            name: "Q1".to_string(),
            members: vec![member("a"), member("b"), member("c")],
            avg_service_minutes: 2.5,
        };

        assert_eq!(detail.position_of("c"), 3);
        assert_eq!(detail.position_of("zzz"), 0);
        assert_eq!(detail.eta_for("a"), Some(0.0));
        assert_eq!(detail.eta_for("c"), Some(5.0));
        assert_eq!(detail.eta_for("zzz"), None);
    }

    #[test]
    fn test_member_timestamps_serialise_as_millis() {
        let member = Member {
            id: "u1".to_string(),
            display_name: Some("Ann".to_string()),
            handle: None,
            joined_at: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
        };
        let json = serde_json::to_value(&member).unwrap();
        assert_eq!(json["joinedAt"], 1_700_000_000_123i64);
        assert_eq!(json["displayName"], "Ann");
    }
}
