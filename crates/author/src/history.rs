//! Snapshot-based undo/redo.
//!
//! Callers checkpoint before mutating: [`History::checkpoint`] records scene
//! membership and freezes the named nodes. Undo and redo diff the popped
//! snapshot against the live scene by ID.
//!
//! # Invariants
//! - History is linear: a new checkpoint clears the redo stack.
//! - Both stacks are bounded by `max_depth`; the oldest snapshot is dropped
//!   on overflow.
//! - Undo/redo never nest. Checkpoints taken during one are ignored.
//! - A node edited without a checkpoint is reported as stale, not silently
//!   treated as restored.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use docscene_common::NodeId;
use docscene_kernel::{Scene, SceneError, SceneEvent};

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum snapshots per stack. Zero disables history.
    pub max_depth: usize,
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            enabled: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("undo/redo called while an undo/redo is already in progress")]
    Reentrant,
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// What applying one snapshot did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndoOutcome {
    /// False when the stack was empty.
    pub applied: bool,
    /// Nodes put back into the scene.
    pub restored: usize,
    /// Nodes taken out of the scene.
    pub removed: usize,
    /// Live nodes whose content was replaced from a frozen clone.
    pub overwritten: usize,
    /// Nodes edited since the snapshot without being checkpointed.
    pub stale: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

#[derive(Debug, Default)]
pub struct History {
    config: HistoryConfig,
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    in_undo: bool,
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.max_depth > 0
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Change the stack bound, pruning the oldest snapshots if needed.
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.config.max_depth = max_depth;
        prune(&mut self.undo, max_depth);
        prune(&mut self.redo, max_depth);
    }

    /// True while an undo or redo is being applied.
    pub fn in_progress(&self) -> bool {
        self.in_undo
    }

    /// Record the scene before a mutation of the nodes in `ids`.
    ///
    /// Returns false when nothing was recorded: history is disabled or an
    /// undo/redo is in progress.
    pub fn checkpoint(&mut self, scene: &Scene, ids: &[&str]) -> bool {
        let Some(mut snapshot) = self.begin_checkpoint(scene) else {
            return false;
        };
        for id in ids {
            if !snapshot.freeze(id) {
                tracing::debug!(%id, "checkpointed node is not in the scene");
            }
        }
        self.push_undo(snapshot);
        true
    }

    /// Record the scene before a mutation that may touch any node.
    pub fn checkpoint_all(&mut self, scene: &Scene) -> bool {
        let Some(mut snapshot) = self.begin_checkpoint(scene) else {
            return false;
        };
        snapshot.freeze_all();
        self.push_undo(snapshot);
        true
    }

    pub fn undo(&mut self, scene: &mut Scene) -> Result<UndoOutcome, HistoryError> {
        self.step(scene, Direction::Undo)
    }

    pub fn redo(&mut self, scene: &mut Scene) -> Result<UndoOutcome, HistoryError> {
        self.step(scene, Direction::Redo)
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        let dropped = self.undo.len() + self.redo.len();
        self.undo.clear();
        self.redo.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "history cleared");
        }
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    fn begin_checkpoint(&mut self, scene: &Scene) -> Option<Snapshot> {
        if self.in_undo {
            tracing::debug!("checkpoint ignored during undo/redo");
            return None;
        }
        if !self.is_enabled() {
            return None;
        }
        self.redo.clear();
        Some(Snapshot::capture(scene))
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        tracing::debug!(
            members = snapshot.len(),
            frozen = snapshot.frozen_count(),
            depth = self.undo.len() + 1,
            "checkpoint"
        );
        self.undo.push_back(snapshot);
        prune(&mut self.undo, self.config.max_depth);
    }

    fn step(&mut self, scene: &mut Scene, direction: Direction) -> Result<UndoOutcome, HistoryError> {
        if self.in_undo {
            tracing::error!(?direction, "reentrant undo/redo rejected");
            return Err(HistoryError::Reentrant);
        }
        let source = match direction {
            Direction::Undo => &mut self.undo,
            Direction::Redo => &mut self.redo,
        };
        let Some(target) = source.pop_back() else {
            return Ok(UndoOutcome::default());
        };

        let _span = tracing::info_span!("history", ?direction).entered();
        self.in_undo = true;
        let mut mirror = Snapshot::capture(scene);
        let result = apply(scene, &target, &mut mirror);
        self.in_undo = false;

        let outcome = result?;
        let mirror_stack = match direction {
            Direction::Undo => &mut self.redo,
            Direction::Redo => &mut self.undo,
        };
        mirror_stack.push_back(mirror);
        prune(mirror_stack, self.config.max_depth);

        tracing::info!(
            restored = outcome.restored,
            removed = outcome.removed,
            overwritten = outcome.overwritten,
            stale = outcome.stale,
            "applied snapshot"
        );
        scene.notify(SceneEvent::SceneModified);
        Ok(outcome)
    }
}

/// Make `scene` match `target`, recording what the scene looked like into
/// `mirror` so the step can be reversed.
fn apply(scene: &mut Scene, target: &Snapshot, mirror: &mut Snapshot) -> Result<UndoOutcome, HistoryError> {
    let mut outcome = UndoOutcome {
        applied: true,
        ..UndoOutcome::default()
    };
    let wanted: HashSet<&str> = target.entries().iter().map(|e| e.id.as_str()).collect();

    let extra: Vec<NodeId> = scene
        .ids()
        .into_iter()
        .filter(|id| !wanted.contains(id.as_str()))
        .collect();
    for id in &extra {
        if scene.remove_node_without_notify(id).is_some() {
            outcome.removed += 1;
        }
    }

    for entry in target.entries() {
        let Some(live) = scene.get(&entry.id) else {
            if entry.frozen {
                entry.handle.restore_revision(entry.revision);
            } else if entry.handle.revision() != entry.revision {
                tracing::warn!(
                    id = %entry.id,
                    "removed node was edited without a checkpoint, restoring its edited state"
                );
                outcome.stale += 1;
            }
            let current = entry.handle.id();
            if current != entry.id {
                tracing::debug!(id = %entry.id, %current, "node was renamed since capture, restoring its ID");
                entry.handle.borrow_mut_untracked().header_mut().id = entry.id.clone();
            }
            scene.restore_node(entry.handle.clone())?;
            outcome.restored += 1;
            continue;
        };
        if live.ptr_eq(&entry.handle) {
            if live.revision() != entry.revision {
                tracing::warn!(
                    id = %entry.id,
                    "node was edited without a checkpoint, its change cannot be undone"
                );
                outcome.stale += 1;
            }
            continue;
        }
        if live.borrow().content_eq(&*entry.handle.borrow()) {
            continue;
        }
        mirror.freeze(&entry.id);
        if !live.overwrite_from(&entry.handle) {
            tracing::warn!(id = %entry.id, "snapshot entry has a different type than the live node");
            continue;
        }
        live.restore_revision(entry.revision);
        scene.sync_references(&entry.id);
        outcome.overwritten += 1;
    }

    scene.restore_order(&target.ids());
    if outcome.restored > 0 {
        scene.refresh_references();
    }
    Ok(outcome)
}

fn prune(stack: &mut VecDeque<Snapshot>, max_depth: usize) {
    while stack.len() > max_depth {
        stack.pop_front();
        tracing::debug!(max_depth, "pruned oldest snapshot");
    }
}
