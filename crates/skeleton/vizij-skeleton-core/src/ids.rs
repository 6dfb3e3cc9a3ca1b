//! Identifiers and a simple allocator for playback threads.

use serde::{Deserialize, Serialize};

/// Handle to a playback thread owned by a `ShapeInstance`.
///
/// Ids are never reused within one instance, so a stale id fails lookups
/// instead of aliasing a newer thread.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ThreadId(pub u32);

/// Monotonic allocator for ThreadId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_thread: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_thread(&mut self) -> ThreadId {
        let id = ThreadId(self.next_thread);
        self.next_thread = self.next_thread.wrapping_add(1);
        id
    }
}
