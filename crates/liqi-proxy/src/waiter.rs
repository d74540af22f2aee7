//! Thread-safe request/response correlation: a caller registers a waiter
//! for an outstanding `msg_id` before injecting the request, then blocks
//! until the matching response arrives or a deadline passes.
//!
//! Grounded on `WsAddon`'s `_waiters_sync` map: a lock-guarded dict of
//! `{event, response}` pairs, resolved from the proxy loop and awaited
//! from arbitrary caller threads.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use liqi_wire::FrameView;

use crate::error::WaiterError;

struct Slot {
    response: Option<FrameView>,
}

/// A registry of in-flight waiters keyed by `msg_id`. Safe to share across
/// the proxy loop (which calls [`WaiterRegistry::resolve`]) and any number
/// of caller threads (which call [`WaiterRegistry::wait`]).
pub struct WaiterRegistry {
    slots: Mutex<HashMap<u16, Slot>>,
    signal: Condvar,
}

impl Default for WaiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            signal: Condvar::new(),
        }
    }

    /// Registers a new waiter. Must be called before the corresponding
    /// request is injected, to avoid a race where the response arrives
    /// before the waiter exists.
    pub fn register(&self, msg_id: u16) -> Result<(), WaiterError> {
        let mut slots = self.slots.lock().unwrap();
        if slots.contains_key(&msg_id) {
            return Err(WaiterError::DuplicateWaiter(msg_id));
        }
        slots.insert(msg_id, Slot { response: None });
        Ok(())
    }

    /// Called from the inbound frame path when a `Res`/`Notify` carrying
    /// `msg_id` arrives. A no-op if no waiter is registered — late or
    /// unsolicited responses must never error.
    pub fn resolve(&self, msg_id: u16, response: FrameView) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(&msg_id) {
            slot.response = Some(response);
            self.signal.notify_all();
        }
    }

    /// Blocks the calling thread until `msg_id` resolves or `deadline`
    /// elapses. Returns `true` if resolved, `false` on timeout (the
    /// waiter is left registered either way; callers should follow up
    /// with [`Self::pop_response`] or [`Self::discard`]).
    pub fn wait(&self, msg_id: u16, deadline: Duration) -> bool {
        let slots = self.slots.lock().unwrap();
        let (guard, timeout_result) = self
            .signal
            .wait_timeout_while(slots, deadline, |slots| {
                slots.get(&msg_id).is_some_and(|s| s.response.is_none())
            })
            .unwrap();
        drop(guard);
        !timeout_result.timed_out()
    }

    /// Removes and returns the resolved response, if any.
    pub fn pop_response(&self, msg_id: u16) -> Option<FrameView> {
        let mut slots = self.slots.lock().unwrap();
        slots.remove(&msg_id).and_then(|s| s.response)
    }

    /// Removes a waiter without requiring a response — used on timeout.
    pub fn discard(&self, msg_id: u16) {
        self.slots.lock().unwrap().remove(&msg_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn dummy_response(msg_id: u16) -> FrameView {
        FrameView {
            kind: liqi_wire::FrameKind::Res,
            msg_id: Some(msg_id),
            method: ".lq.Lobby.amuletActivityBuy".into(),
            body: Default::default(),
            from_client: false,
            raw: vec![],
            notify_inner_name: None,
        }
    }

    #[test]
    fn resolve_wakes_a_blocked_waiter() {
        let registry = Arc::new(WaiterRegistry::new());
        registry.register(42).unwrap();

        let reg2 = Arc::clone(&registry);
        let handle = thread::spawn(move || reg2.wait(42, Duration::from_secs(2)));

        thread::sleep(Duration::from_millis(20));
        registry.resolve(42, dummy_response(42));

        assert!(handle.join().unwrap());
        let resp = registry.pop_response(42).unwrap();
        assert_eq!(resp.msg_id, Some(42));
    }

    #[test]
    fn wait_times_out_without_resolve() {
        let registry = WaiterRegistry::new();
        registry.register(7).unwrap();
        let resolved = registry.wait(7, Duration::from_millis(30));
        assert!(!resolved);
        registry.discard(7);
        assert!(registry.pop_response(7).is_none());
    }

    #[test]
    fn duplicate_register_errors() {
        let registry = WaiterRegistry::new();
        registry.register(1).unwrap();
        assert!(registry.register(1).is_err());
    }

    #[test]
    fn late_resolve_on_unknown_id_is_a_noop() {
        let registry = WaiterRegistry::new();
        registry.resolve(999, dummy_response(999));
        assert!(registry.pop_response(999).is_none());
    }
}
