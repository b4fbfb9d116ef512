//! Locally persisted mirror store
//!
//! Used while the authoritative store is unreachable. Every mutation is applied
//! to a copy of the mirror state, written to the snapshot file, and only then
//! becomes the live state, so the in-memory and on-disk views never diverge.

use crate::error::{QueueError, Result};
use crate::queue::{QueueRegistry, QueueState};
use crate::store::QueueStore;
use crate::types::{
    CreateQueueRequest, JoinRequest, LeaveRequest, Member, QueueDetail, QueueId, QueueMeta,
    QueueView, DEFAULT_QUEUE_ID,
};
use crate::utils::{Clock, SystemClock};
use crate::wait_time::DurationEstimator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// On-disk form of the mirror
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSnapshot {
    #[serde(default)]
    pub queues: BTreeMap<QueueId, QueueSnapshot>,
    #[serde(default)]
    pub selected_queue_id: Option<QueueId>,
}

/// On-disk form of one mirrored queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    #[serde(default)]
    pub id: Option<QueueId>,
    #[serde(default)]
    pub name: Option<String>,
    /// Index of the queue in the registry's creation order
    #[serde(default)]
    pub position: Option<usize>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub samples: Vec<f64>,
    #[serde(default)]
    pub avg_service_minutes: Option<f64>,
}

impl QueueSnapshot {
    fn capture(queue: &QueueState, position: usize) -> Self {
        Self {
            id: Some(queue.id().to_string()),
            name: Some(queue.name().to_string()),
            position: Some(position),
            created_at: Some(queue.created_at()),
            members: queue.members().to_vec(),
            samples: queue.estimator().samples().collect(),
            avg_service_minutes: Some(queue.avg_service_minutes()),
        }
    }

    fn restore(self, key: &str, sample_capacity: usize, now: DateTime<Utc>) -> QueueState {
        // The average is always re-derived from the persisted samples.
        let estimator = DurationEstimator::from_samples(self.samples, sample_capacity);
        let id = self.id.unwrap_or_else(|| key.to_string());
        let name = self.name.unwrap_or_else(|| key.to_string());
        QueueState::from_parts(
            id,
            name,
            self.created_at.unwrap_or(now),
            self.members,
            estimator,
        )
    }
}

/// Live mirror state: the registry plus the queue the user was looking at
#[derive(Debug, Clone)]
struct MirrorState {
    registry: QueueRegistry,
    selected_queue_id: QueueId,
}

impl MirrorState {
    fn fresh(sample_capacity: usize, now: DateTime<Utc>) -> Self {
        Self {
            registry: QueueRegistry::new(sample_capacity, now),
            selected_queue_id: DEFAULT_QUEUE_ID.to_string(),
        }
    }

    fn from_snapshot(snapshot: MirrorSnapshot, sample_capacity: usize, now: DateTime<Utc>) -> Self {
        // Snapshots without positions fall back to (createdAt, id) after the
        // positioned queues.
        let mut queues: Vec<(Option<usize>, QueueState)> = snapshot
            .queues
            .into_iter()
            .map(|(key, queue)| (queue.position, queue.restore(&key, sample_capacity, now)))
            .collect();
        queues.sort_by(|(pos_a, a), (pos_b, b)| {
            pos_a
                .unwrap_or(usize::MAX)
                .cmp(&pos_b.unwrap_or(usize::MAX))
                .then_with(|| a.created_at().cmp(&b.created_at()))
                .then_with(|| a.id().cmp(b.id()))
        });
        let queues = queues.into_iter().map(|(_, queue)| queue);

        let registry = QueueRegistry::from_queues(queues, sample_capacity, now);
        let selected_queue_id = snapshot
            .selected_queue_id
            .filter(|id| registry.contains(id))
            .or_else(|| registry.first_id().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_QUEUE_ID.to_string());

        Self {
            registry,
            selected_queue_id,
        }
    }

    fn to_snapshot(&self) -> MirrorSnapshot {
        MirrorSnapshot {
            queues: self
                .registry
                .iter()
                .enumerate()
                .map(|(position, queue)| {
                    (
                        queue.id().to_string(),
                        QueueSnapshot::capture(queue, position),
                    )
                })
                .collect(),
            selected_queue_id: Some(self.selected_queue_id.clone()),
        }
    }

    fn reselect_if_missing(&mut self) {
        if !self.registry.contains(&self.selected_queue_id) {
            self.selected_queue_id = self
                .registry
                .first_id()
                .unwrap_or(DEFAULT_QUEUE_ID)
                .to_string();
        }
    }
}

/// Queue store backed by a JSON snapshot file on the local device
pub struct SnapshotQueueStore {
    path: PathBuf,
    state: Mutex<MirrorState>,
    clock: Arc<dyn Clock>,
}

impl SnapshotQueueStore {
    /// Open (or start) the mirror at `path` using the wall clock
    pub fn open(path: impl AsRef<Path>, sample_capacity: usize) -> Result<Self> {
        Self::open_with_clock(path, sample_capacity, Arc::new(SystemClock))
    }

    /// Open the mirror with a custom clock.
    ///
    /// A missing file starts a fresh mirror; an unreadable snapshot is
    /// discarded with a warning.
    pub fn open_with_clock(
        path: impl AsRef<Path>,
        sample_capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let now = clock.now();

        let state = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<MirrorSnapshot>(&bytes) {
                Ok(snapshot) => {
                    debug!(
                        "Loaded mirror snapshot with {} queues from {}",
                        snapshot.queues.len(),
                        path.display()
                    );
                    MirrorState::from_snapshot(snapshot, sample_capacity, now)
                }
                Err(e) => {
                    warn!(
                        "Discarding unreadable mirror snapshot {}: {}",
                        path.display(),
                        e
                    );
                    MirrorState::fresh(sample_capacity, now)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No mirror snapshot at {}, starting fresh", path.display());
                MirrorState::fresh(sample_capacity, now)
            }
            Err(e) => {
                return Err(QueueError::storage(format!(
                    "Failed to read snapshot {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue the mirror currently points at
    pub fn selected_queue_id(&self) -> Result<QueueId> {
        self.read(|state| state.selected_queue_id.clone())
    }

    /// Current persisted form of the mirror
    pub fn snapshot(&self) -> Result<MirrorSnapshot> {
        self.read(MirrorState::to_snapshot)
    }

    fn read<R>(&self, op: impl FnOnce(&MirrorState) -> R) -> Result<R> {
        let state = self
            .state
            .lock()
            .map_err(|_| QueueError::internal("Failed to acquire mirror lock"))?;
        Ok(op(&state))
    }

    /// Apply `op` to a copy of the state, persist it, then publish it
    fn mutate<R>(&self, op: impl FnOnce(&mut MirrorState, DateTime<Utc>) -> Result<R>) -> Result<R> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| QueueError::internal("Failed to acquire mirror lock"))?;

        let mut next = state.clone();
        let result = op(&mut next, self.clock.now())?;
        next.reselect_if_missing();
        write_snapshot(&self.path, &next.to_snapshot())?;
        *state = next;
        Ok(result)
    }
}

/// Write the snapshot atomically (synced temp file + rename)
fn write_snapshot(path: &Path, snapshot: &MirrorSnapshot) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| QueueError::storage(format!("Failed to encode snapshot: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            QueueError::storage(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let write_err = |e: std::io::Error| {
        QueueError::storage(format!("Failed to write {}: {}", tmp.display(), e))
    };
    let mut file = File::create(&tmp).map_err(write_err)?;
    file.write_all(&bytes).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| {
        QueueError::storage(format!("Failed to replace {}: {}", path.display(), e))
    })?;
    Ok(())
}

#[async_trait]
impl QueueStore for SnapshotQueueStore {
    fn backend(&self) -> &'static str {
        "snapshot"
    }

    async fn list(&self) -> Result<Vec<QueueMeta>> {
        self.read(|state| state.registry.list())
    }

    async fn create(&self, request: CreateQueueRequest) -> Result<QueueMeta> {
        self.mutate(|state, now| {
            let meta = state.registry.create(&request, now)?;
            state.selected_queue_id = meta.id.clone();
            Ok(meta)
        })
    }

    async fn detail(&self, queue_id: &str) -> Result<QueueDetail> {
        let existing =
            self.read(|state| state.registry.get(queue_id.trim()).map(QueueState::detail))?;
        if let Some(detail) = existing {
            return Ok(detail);
        }
        self.mutate(|state, now| Ok(state.registry.ensure(queue_id, None, now).detail()))
    }

    async fn join(&self, queue_id: &str, request: JoinRequest) -> Result<usize> {
        let member_id = request.validate()?;
        self.mutate(|state, now| {
            let queue = state.registry.ensure(queue_id, None, now);
            let position = queue.join(&member_id, request.display_name, request.handle, now);
            state.selected_queue_id = queue.id().to_string();
            Ok(position)
        })
    }

    async fn leave(&self, queue_id: &str, request: LeaveRequest) -> Result<()> {
        let member_id = request.validate()?;
        self.mutate(|state, now| {
            state.registry.ensure(queue_id, None, now).leave(&member_id, now);
            Ok(())
        })
    }

    async fn clear(&self, queue_id: &str) -> Result<()> {
        self.mutate(|state, now| {
            state.registry.ensure(queue_id, None, now).clear();
            Ok(())
        })
    }

    async fn delete(&self, queue_id: &str) -> Result<()> {
        self.mutate(|state, now| state.registry.delete(queue_id, now))
    }

    /// Resolve to the requested queue, else the remembered selection, else the
    /// first queue; the resolution is persisted as the new selection.
    async fn select(&self, queue_id: &str) -> Result<QueueView> {
        self.mutate(|state, _now| {
            let wanted = queue_id.trim();
            let resolved = if state.registry.contains(wanted) {
                wanted.to_string()
            } else if state.registry.contains(&state.selected_queue_id) {
                state.selected_queue_id.clone()
            } else {
                state
                    .registry
                    .first_id()
                    .unwrap_or(DEFAULT_QUEUE_ID)
                    .to_string()
            };
            state.selected_queue_id = resolved.clone();

            let selected = state
                .registry
                .get(&resolved)
                .map(QueueState::detail)
                .ok_or_else(|| QueueError::NotFound {
                    queue_id: resolved.clone(),
                })?;
            Ok(QueueView {
                queues: state.registry.list(),
                selected,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use tempfile::TempDir;

    fn open(dir: &TempDir, clock: Arc<ManualClock>) -> SnapshotQueueStore {
        SnapshotQueueStore::open_with_clock(dir.path().join("mirror.json"), 10, clock).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_mirror_has_default_queue() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, Arc::new(ManualClock::default()));
        let queues = store.list().await.unwrap();
        assert_eq!(queues.len(), 1);
        assert_eq!(queues[0].id, DEFAULT_QUEUE_ID);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_mutations_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        {
            let store = open(&dir, clock.clone());
            store.create(CreateQueueRequest::new("Front Desk")).await.unwrap();
            store.join("front-desk", JoinRequest::new("u1")).await.unwrap();
            store.join("front-desk", JoinRequest::new("u2")).await.unwrap();
            clock.advance_millis(180_000);
            store.leave("front-desk", LeaveRequest::new("u1")).await.unwrap();
        }

        let reopened = open(&dir, clock);
        let detail = reopened.detail("front-desk").await.unwrap();
        assert_eq!(detail.members.len(), 1);
        assert_eq!(detail.members[0].id, "u2");
        assert_eq!(detail.avg_service_minutes, 3.0);
        assert_eq!(reopened.selected_queue_id().unwrap(), "front-desk");

        let ids: Vec<_> = reopened.list().await.unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![DEFAULT_QUEUE_ID, "front-desk"]);
    }

    #[tokio::test]
    async fn test_snapshot_file_format() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, Arc::new(ManualClock::default()));
        store.join(DEFAULT_QUEUE_ID, JoinRequest::new("u1")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["selectedQueueId"], DEFAULT_QUEUE_ID);
        let queue = &raw["queues"][DEFAULT_QUEUE_ID];
        assert_eq!(queue["id"], DEFAULT_QUEUE_ID);
        assert_eq!(queue["members"][0]["id"], "u1");
        assert!(queue["samples"].as_array().unwrap().is_empty());
        assert_eq!(queue["avgServiceMinutes"], 5.0);
        assert!(queue["createdAt"].is_i64());
    }

    #[tokio::test]
    async fn test_reopen_keeps_creation_order_within_one_millisecond() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let before: Vec<_> = {
            let store = open(&dir, clock.clone());
            store.create(CreateQueueRequest::new("Zeta")).await.unwrap();
            store.create(CreateQueueRequest::new("Alpha")).await.unwrap();
            store.list().await.unwrap().into_iter().map(|q| q.id).collect()
        };
        assert_eq!(before, vec![DEFAULT_QUEUE_ID, "zeta", "alpha"]);

        let reopened = open(&dir, clock);
        let after: Vec<_> = reopened.list().await.unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_reopen_matches_live_membership() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let store = open(&dir, clock.clone());
        store.join("lab", JoinRequest::new("u1")).await.unwrap();
        clock.advance_millis(1);
        store.join("lab", JoinRequest::new("u2")).await.unwrap();

        let reopened = open(&dir, clock);
        assert_eq!(
            reopened.detail("lab").await.unwrap(),
            store.detail("lab").await.unwrap()
        );
        assert!(!dir.path().join("mirror.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mirror.json");
        fs::write(&path, b"{not json").unwrap();

        let store = SnapshotQueueStore::open(&path, 10).unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_snapshot_is_repaired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mirror.json");
        fs::write(
            &path,
            br#"{"queues": {"lab": {"members": [], "samples": [120000, -1]}}, "selectedQueueId": "gone"}"#,
        )
        .unwrap();

        let store = SnapshotQueueStore::open(&path, 10).unwrap();
        let lab = store.detail("lab").await.unwrap();
        assert_eq!(lab.name, "lab");
        assert_eq!(lab.avg_service_minutes, 2.0);
        assert!(store.list().await.unwrap().iter().any(|q| q.id == DEFAULT_QUEUE_ID));
        assert_eq!(store.selected_queue_id().unwrap(), "lab");
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, Arc::new(ManualClock::default()));
        let result = store.delete(DEFAULT_QUEUE_ID).await;
        assert!(matches!(result, Err(QueueError::InvalidOperation { .. })));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_delete_selected_queue_moves_selection() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, Arc::new(ManualClock::default()));
        let meta = store.create(CreateQueueRequest::new("Lab")).await.unwrap();
        assert_eq!(store.selected_queue_id().unwrap(), meta.id);

        store.delete(&meta.id).await.unwrap();
        assert_eq!(store.selected_queue_id().unwrap(), DEFAULT_QUEUE_ID);
    }

    #[tokio::test]
    async fn test_select_falls_back_to_remembered_queue() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, Arc::new(ManualClock::default()));
        store.create(CreateQueueRequest::new("Lab")).await.unwrap();

        let view = store.select("unknown").await.unwrap();
        assert_eq!(view.selected.id, "lab");
        assert_eq!(view.queues.len(), 2);

        let view = store.select(DEFAULT_QUEUE_ID).await.unwrap();
        assert_eq!(view.selected.id, DEFAULT_QUEUE_ID);
        assert_eq!(store.selected_queue_id().unwrap(), DEFAULT_QUEUE_ID);
    }
}
