use shardset_transport::FetchHandle;

/// One of the two owned fetch-handle records for a chunk: two slots per
/// chunk index, since a straddling chunk requires two concurrent
/// sub-fetches.
///
/// This is modeled as an owned resource with an explicit completion
/// obligation (design note: "a missed drain is a type error, not a runtime
/// bug"): the only way to get the handle back out is [`HandleSlot::take`],
/// and dropping a slot that still holds a live handle trips a debug
/// assertion rather than silently leaking the obligation.
#[derive(Default)]
pub(crate) struct HandleSlot {
    handle: Option<FetchHandle>,
}

impl HandleSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Populates an idle slot with a freshly issued handle.
    pub(crate) fn set(&mut self, handle: FetchHandle) {
        debug_assert!(
            self.handle.is_none(),
            "handle slot reused while still holding a live fetch handle"
        );
        self.handle = Some(handle);
    }

    /// Takes the handle out, returning the slot to idle. Callers are
    /// responsible for waiting on the returned handle — the slot itself
    /// doesn't wait, since `shardset_transport::Transport::wait` is the
    /// only thing that knows how.
    pub(crate) fn take(&mut self) -> Option<FetchHandle> {
        self.handle.take()
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for HandleSlot {
    fn drop(&mut self) {
        debug_assert!(
            self.handle.is_none(),
            "HandleSlot dropped while a fetch handle was still outstanding"
        );
    }
}
