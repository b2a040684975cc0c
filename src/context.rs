/*!
The per-export scratch state shared by the size pass and the write pass.

The size pass reserves a slot per embedded message in pre-order and fills it
with the message's body length. The write pass replays the queue from the
front, so both passes must visit messages in exactly the same order. That
ordering contract is kept internal to this crate: the only way through both
passes is [`BatchMarshaler::marshal`](crate::BatchMarshaler::marshal), which
drives them from a single traversal.

A context retains its allocations across [`reset`](MarshalerContext::reset),
which is what makes the reusable export mode allocation-free once warm.
*/

/// A named slot in a [`MarshalerContext`], allocated with
/// [`MarshalerContext::key`].
///
/// Keys give sibling components their own cache entry so they can't clobber
/// each other through the implicit queue. A key stays valid for the lifetime
/// of the context that produced it, across resets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ContextKey(usize);

#[derive(Default)]
pub struct MarshalerContext {
    sizes: Vec<usize>,
    read_idx: usize,
    slots: Vec<usize>,
}

impl MarshalerContext {
    pub fn new() -> Self {
        MarshalerContext::default()
    }

    /// Append a zeroed entry to the size queue, returning its position so it
    /// can be filled once the subtree below it has been measured.
    pub(crate) fn reserve_size(&mut self) -> usize {
        self.sizes.push(0);
        self.sizes.len() - 1
    }

    pub(crate) fn set_size(&mut self, at: usize, size: usize) {
        self.sizes[at] = size;
    }

    /// Pop the next entry off the front of the size queue. Call order here
    /// must mirror the reserve order of the size pass exactly.
    pub(crate) fn next_size(&mut self) -> usize {
        let size = self.sizes[self.read_idx];
        self.read_idx += 1;
        size
    }

    /// True once the write pass has consumed every size the size pass
    /// recorded. Used by tests and debug assertions to catch divergence.
    pub(crate) fn is_drained(&self) -> bool {
        self.read_idx == self.sizes.len()
    }

    /// Allocate a fresh named slot.
    pub fn key(&mut self) -> ContextKey {
        self.slots.push(0);
        ContextKey(self.slots.len() - 1)
    }

    pub fn set(&mut self, key: ContextKey, value: usize) {
        self.slots[key.0] = value;
    }

    pub fn get(&self, key: ContextKey) -> usize {
        self.slots[key.0]
    }

    /// Rewind the size queue so the data recorded by the size pass can be
    /// replayed again, as for a retried write.
    pub fn reset_read_index(&mut self) {
        self.read_idx = 0;
    }

    /// Clear all recorded state, keeping allocations and named slots so a
    /// pooled context is safe to hand to the next export call.
    pub fn reset(&mut self) {
        self.sizes.clear();
        self.read_idx = 0;

        for slot in &mut self.slots {
            *slot = 0;
        }
    }
}
