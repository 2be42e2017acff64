/// Identifies one requested display-refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// One-shot request/cancel scheduling for display-refresh callbacks.
///
/// At most one callback is pending. Requesting a new one supersedes the
/// previous id; a cancelled or superseded id is stale and must be ignored
/// when it arrives.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    next: u64,
    pending: Option<CallbackId>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self) -> CallbackId {
        self.next += 1;
        let id = CallbackId(self.next);
        self.pending = Some(id);
        id
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<CallbackId> {
        self.pending
    }

    /// Consumes `id` if it is the pending callback. Returns `false` for a
    /// stale id, leaving any pending callback in place.
    pub fn fire(&mut self, id: CallbackId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_consumes_pending() {
        let mut s = FrameScheduler::new();
        let id = s.request();
        assert!(s.fire(id));
        assert!(s.pending().is_none());
        assert!(!s.fire(id));
    }

    #[test]
    fn test_cancelled_id_is_stale() {
        let mut s = FrameScheduler::new();
        let id = s.request();
        s.cancel();
        assert!(!s.fire(id));
    }

    #[test]
    fn test_new_request_supersedes_old() {
        let mut s = FrameScheduler::new();
        let old = s.request();
        let new = s.request();
        assert_ne!(old, new);
        assert!(!s.fire(old));
        assert_eq!(s.pending(), Some(new));
        assert!(s.fire(new));
    }
}
