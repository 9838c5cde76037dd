use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::node::Node;
use crate::types::NodeId;

struct NodeCell {
    node: RefCell<Box<dyn Node>>,
    /// Advanced on every tracked mutable borrow.
    revision: Cell<u64>,
}

/// Shared, single-threaded handle to a node.
///
/// The scene's ordered collection and undo snapshots both hold handles; a
/// node removed from the scene stays alive while a snapshot still refers to
/// it, which is what lets undo hand it back.
#[derive(Clone)]
pub struct NodeHandle(Rc<NodeCell>);

impl NodeHandle {
    pub fn new(node: Box<dyn Node>) -> Self {
        Self(Rc::new(NodeCell {
            node: RefCell::new(node),
            revision: Cell::new(0),
        }))
    }

    pub fn from_node<N: Node>(node: N) -> Self {
        Self::new(Box::new(node))
    }

    pub fn borrow(&self) -> Ref<'_, dyn Node + 'static> {
        Ref::map(self.0.node.borrow(), |node| &**node)
    }

    /// Mutable access for host edits. Advances the edit revision.
    pub fn borrow_mut(&self) -> RefMut<'_, dyn Node + 'static> {
        self.bump();
        self.borrow_mut_untracked()
    }

    /// Mutable access that leaves the edit revision alone.
    ///
    /// Reserved for scene bookkeeping (reference rewrites, undo restores)
    /// that must not look like an unrecorded host edit.
    pub fn borrow_mut_untracked(&self) -> RefMut<'_, dyn Node + 'static> {
        RefMut::map(self.0.node.borrow_mut(), |node| &mut **node)
    }

    pub fn downcast<T: Node>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.0.node.borrow(), |node| node.as_any().downcast_ref::<T>()).ok()
    }

    pub fn downcast_mut<T: Node>(&self) -> Option<RefMut<'_, T>> {
        let node = RefMut::filter_map(self.0.node.borrow_mut(), |node| {
            node.as_any_mut().downcast_mut::<T>()
        })
        .ok()?;
        self.bump();
        Some(node)
    }

    pub fn revision(&self) -> u64 {
        self.0.revision.get()
    }

    pub fn ptr_eq(&self, other: &NodeHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn id(&self) -> NodeId {
        self.borrow().id().clone()
    }

    pub fn type_tag(&self) -> String {
        self.borrow().type_tag().to_owned()
    }

    /// Detached deep copy of the node's current state.
    pub fn freeze(&self) -> NodeHandle {
        NodeHandle::new(self.borrow().clone_node())
    }

    /// Replace this node's content with `source`'s, keeping this node's ID.
    pub fn overwrite_from(&self, source: &NodeHandle) -> bool {
        if self.ptr_eq(source) {
            return true;
        }
        let source = source.borrow();
        self.borrow_mut_untracked().copy_from(&*source)
    }

    /// Put the edit revision back to a recorded value after undo restored the
    /// content that revision described.
    pub fn restore_revision(&self, revision: u64) {
        self.0.revision.set(revision);
    }

    fn bump(&self) {
        self.0.revision.set(self.0.revision.get().wrapping_add(1));
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.node.try_borrow() {
            Ok(node) => f
                .debug_struct("NodeHandle")
                .field("id", node.id())
                .field("type", &node.type_tag())
                .field("revision", &self.revision())
                .finish(),
            Err(_) => f.write_str("NodeHandle(<borrowed>)"),
        }
    }
}
