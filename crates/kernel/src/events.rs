use std::fmt;

use docscene_common::NodeId;

/// Notifications fired synchronously before the triggering call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    SceneClosing,
    SceneClosed,
    /// Fired once per distinct type tag after a bulk import. `node` is the
    /// last imported node of that type.
    DocumentLoaded { type_tag: String, node: NodeId },
    NodeAdded { id: NodeId, type_tag: String },
    NodeRemoved { id: NodeId, type_tag: String },
    SceneModified,
}

/// Token returned by [`crate::Scene::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback = Box<dyn FnMut(&SceneEvent)>;

/// Registered observers. Callbacks only ever see the event, never the scene,
/// so they cannot re-enter a mutation that is still in progress.
#[derive(Default)]
pub(crate) struct Observers {
    next: u64,
    callbacks: Vec<(ObserverId, Callback)>,
}

impl Observers {
    pub(crate) fn subscribe(&mut self, callback: Callback) -> ObserverId {
        self.next += 1;
        let id = ObserverId(self.next);
        self.callbacks.push((id, callback));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cb_id, _)| *cb_id != id);
        before != self.callbacks.len()
    }

    pub(crate) fn notify(&mut self, event: &SceneEvent) {
        tracing::trace!(?event, "scene event");
        for (_, callback) in &mut self.callbacks {
            callback(event);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}
