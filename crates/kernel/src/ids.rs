use std::collections::HashMap;

use docscene_common::NodeId;

/// Per-type ID allocation by probing `TypeTag + index`.
///
/// The last index handed out per tag is memoized so bulk allocation does not
/// rescan from 1. Freed lower indices are not reused; probing only moves forward
/// from the memo until the hints are reset.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    hints: HashMap<String, u64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the first `tag{index}` for which `is_taken` is false, starting
    /// at the memoized index for `tag`.
    pub fn allocate(&mut self, tag: &str, is_taken: impl Fn(&str) -> bool) -> NodeId {
        let mut index = self.next_index(tag);
        let mut candidate = format!("{tag}{index}");
        while is_taken(&candidate) {
            index += 1;
            candidate = format!("{tag}{index}");
        }
        self.hints.insert(tag.to_owned(), index + 1);
        NodeId::new(candidate)
    }

    /// Index the next probe for `tag` starts at.
    pub fn next_index(&self, tag: &str) -> u64 {
        self.hints.get(tag).copied().unwrap_or(1)
    }

    /// Forget all hints. Probing restarts at 1 for every tag.
    pub fn reset(&mut self) {
        self.hints.clear();
    }
}
