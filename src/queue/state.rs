//! A single waiting line
//!
//! Membership is FIFO by join time and only ever changes by appending on join
//! or removing on leave/clear.

use crate::types::{Member, MemberId, QueueDetail, QueueId, QueueMeta};
use crate::utils::to_millis;
use crate::wait_time::DurationEstimator;
use chrono::{DateTime, Utc};
use tracing::debug;

/// One queue: identity, ordered members and service duration estimator
#[derive(Debug, Clone, PartialEq)]
pub struct QueueState {
    id: QueueId,
    name: String,
    created_at: DateTime<Utc>,
    members: Vec<Member>,
    estimator: DurationEstimator,
}

impl QueueState {
    /// Create an empty queue
    pub fn new(
        id: impl Into<QueueId>,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        sample_capacity: usize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: to_millis(created_at),
            members: Vec::new(),
            estimator: DurationEstimator::new(sample_capacity),
        }
    }

    /// Restore a queue from previously persisted parts.
    ///
    /// Duplicate member ids keep their first occurrence.
    pub fn from_parts(
        id: QueueId,
        name: String,
        created_at: DateTime<Utc>,
        members: Vec<Member>,
        estimator: DurationEstimator,
    ) -> Self {
        let mut state = Self {
            id,
            name,
            created_at,
            members: Vec::with_capacity(members.len()),
            estimator,
        };
        for member in members {
            if state.position_of(&member.id) == 0 {
                state.members.push(member);
            }
        }
        state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adopt `name` only if the queue has no display name yet
    pub fn name_if_empty(&mut self, name: &str) {
        if self.name.is_empty() && !name.is_empty() {
            self.name = name.to_string();
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn estimator(&self) -> &DurationEstimator {
        &self.estimator
    }

    pub fn avg_service_minutes(&self) -> f64 {
        self.estimator.avg_service_minutes()
    }

    /// Append a member unless the id is already queued; returns the 1-based position
    pub fn join(
        &mut self,
        member_id: &str,
        display_name: Option<String>,
        handle: Option<String>,
        now: DateTime<Utc>,
    ) -> usize {
        if let Some(position) = self.position(member_id) {
            debug!(
                "Member '{}' already in queue '{}' at position {}",
                member_id, self.id, position
            );
            return position;
        }

        self.members.push(Member {
            id: MemberId::from(member_id),
            display_name,
            handle,
            joined_at: to_millis(now),
        });
        self.members.len()
    }

    /// Remove a member and feed the time they spent queued into the estimator.
    ///
    /// Absent members are ignored.
    pub fn leave(&mut self, member_id: &str, now: DateTime<Utc>) -> Option<Member> {
        let index = self.members.iter().position(|m| m.id == member_id)?;
        let member = self.members.remove(index);

        let joined_at = member.joined_at;
        let now = to_millis(now);
        if joined_at.timestamp_millis() > 0 && joined_at <= now {
            let elapsed_ms = (now - joined_at).num_milliseconds() as f64;
            self.estimator.record(elapsed_ms);
        }

        debug!(
            "Member '{}' left queue '{}', avg service now {} min",
            member_id,
            self.id,
            self.estimator.avg_service_minutes()
        );
        Some(member)
    }

    /// Remove every member and forget all observed durations
    pub fn clear(&mut self) {
        self.members.clear();
        self.estimator.reset();
    }

    /// 1-based position of a member, 0 when absent
    pub fn position_of(&self, member_id: &str) -> usize {
        self.position(member_id).unwrap_or(0)
    }

    fn position(&self, member_id: &str) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.id == member_id)
            .map(|index| index + 1)
    }

    pub fn meta(&self) -> QueueMeta {
        QueueMeta {
            id: self.id.clone(),
            name: self.name.clone(),
            size: self.members.len(),
            avg_service_minutes: self.avg_service_minutes(),
            created_at: self.created_at,
        }
    }

    pub fn detail(&self) -> QueueDetail {
        QueueDetail {
            id: self.id.clone(),
            name: self.name.clone(),
            members: self.members.clone(),
            avg_service_minutes: self.avg_service_minutes(),
        }
    }
}
