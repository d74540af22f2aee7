//! Per-flow MITM context: owns one [`Codec`]/[`WaiterRegistry`] pair per
//! live flow, tracks the "preferred" flow, and runs the hook pipeline for
//! every message. Grounded on `WsAddon` in the reference implementation.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use liqi_wire::{Codec, Descriptor, FrameKind, FrameView};
use tracing::{error, warn};

use crate::error::InjectError;
use crate::hook::{BaseAction, Hook, HookOutcome, InjectSpec};
use crate::host::InjectHost;
use crate::waiter::WaiterRegistry;

/// Methods whose presence on a flow marks it as the "game" session, used
/// as the default injection target when a caller doesn't name one.
const PREFERRED_METHODS: &[&str] = &[
    ".lq.Lobby.fetchAmuletActivityData",
    ".lq.Lobby.amuletActivityUpgrade",
    ".lq.Lobby.amuletActivityOperate",
];

pub struct Flow {
    pub peer_key: String,
    pub codec: Codec,
    pub waiters: Arc<WaiterRegistry>,
}

type Subscriber = Box<dyn Fn(&FrameView) + Send + Sync>;

pub struct Addon<H: InjectHost> {
    host: H,
    descriptor: Descriptor,
    flows: HashMap<String, Flow>,
    preferred_flow: Option<String>,
    last_flow: Option<String>,
    outbound_hook: Option<Hook>,
    inbound_hook: Option<Hook>,
    subscribers: Vec<Subscriber>,
}

impl<H: InjectHost> Addon<H> {
    pub fn new(descriptor: Descriptor, host: H) -> Self {
        Self {
            host,
            descriptor,
            flows: HashMap::new(),
            preferred_flow: None,
            last_flow: None,
            outbound_hook: None,
            inbound_hook: None,
            subscribers: Vec::new(),
        }
    }

    pub fn set_outbound_hook(&mut self, hook: Hook) {
        self.outbound_hook = Some(hook);
    }

    pub fn set_inbound_hook(&mut self, hook: Hook) {
        self.inbound_hook = Some(hook);
    }

    pub fn add_subscriber(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    pub fn waiters_for(&self, peer_key: &str) -> Option<Arc<WaiterRegistry>> {
        self.flows.get(peer_key).map(|f| Arc::clone(&f.waiters))
    }

    pub fn preferred_flow(&self) -> Option<&str> {
        self.preferred_flow.as_deref()
    }

    fn ensure_flow(&mut self, peer_key: &str) -> &mut Flow {
        self.flows.entry(peer_key.to_owned()).or_insert_with(|| Flow {
            peer_key: peer_key.to_owned(),
            codec: Codec::new(self.descriptor.clone()),
            waiters: Arc::new(WaiterRegistry::new()),
        })
    }

    pub fn on_flow_end(&mut self, peer_key: &str) {
        self.flows.remove(peer_key);
        if self.preferred_flow.as_deref() == Some(peer_key) {
            self.preferred_flow = None;
        }
        if self.last_flow.as_deref() == Some(peer_key) {
            self.last_flow = None;
        }
    }

    fn pick_flow(&self, peer_key: Option<&str>) -> Option<String> {
        peer_key
            .map(str::to_owned)
            .or_else(|| self.preferred_flow.clone())
            .or_else(|| self.last_flow.clone())
    }

    /// Runs the full pipeline for one raw frame: parse, bookkeeping,
    /// subscriber fan-out, hook dispatch, action application. Returns the
    /// bytes to forward (`None` means drop).
    pub fn handle_message(
        &mut self,
        peer_key: &str,
        raw: &[u8],
        from_client: bool,
    ) -> Option<Vec<u8>> {
        self.last_flow = Some(peer_key.to_owned());
        self.ensure_flow(peer_key);

        let view = {
            let flow = self.flows.get_mut(peer_key).expect("just ensured");
            match flow.codec.parse_frame(raw, from_client) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "failed to parse frame, forwarding unchanged");
                    return Some(raw.to_vec());
                }
            }
        };

        if !from_client && PREFERRED_METHODS.contains(&view.method.as_str()) {
            self.preferred_flow = Some(peer_key.to_owned());
        }

        if !from_client && matches!(view.kind, FrameKind::Res | FrameKind::Notify) {
            if let Some(msg_id) = view.msg_id {
                if let Some(flow) = self.flows.get(peer_key) {
                    flow.waiters.resolve(msg_id, view.clone());
                }
            }
        }

        for subscriber in &self.subscribers {
            let view_ref = &view;
            if catch_unwind(AssertUnwindSafe(|| subscriber(view_ref))).is_err() {
                error!("subscriber panicked; continuing with remaining subscribers");
            }
        }

        let hook = if from_client {
            &self.outbound_hook
        } else {
            &self.inbound_hook
        };
        let outcome = hook.as_ref().map(|h| h(&view)).unwrap_or_default();

        let emitted = self.apply_action(peer_key, &view, &outcome);

        for spec in &outcome.injects {
            if let Err(e) = self.inject_spec(peer_key, spec) {
                warn!(error = %e.as_reason(), "hook-requested injection failed");
            }
        }

        emitted
    }

    fn apply_action(
        &mut self,
        peer_key: &str,
        view: &FrameView,
        outcome: &HookOutcome,
    ) -> Option<Vec<u8>> {
        match outcome.action_or_pass() {
            BaseAction::Pass => Some(view.raw.clone()),
            BaseAction::Modify(body) => {
                let mut modified = view.clone();
                modified.body = body;
                let flow = self.flows.get(peer_key)?;
                match flow.codec.build_frame(&modified) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        error!(error = %e, "failed to rebuild modified frame, passing through");
                        Some(view.raw.clone())
                    }
                }
            }
            BaseAction::Drop => {
                if matches!(view.kind, FrameKind::Res | FrameKind::Notify) {
                    if let (Some(flow), Some(msg_id)) = (self.flows.get(peer_key), view.msg_id) {
                        flow.waiters.resolve(msg_id, view.clone());
                    }
                }
                None
            }
        }
    }

    fn inject_spec(&mut self, peer_key: &str, spec: &InjectSpec) -> Result<u16, InjectError> {
        let kind = if spec.to_client {
            FrameKind::Res
        } else {
            FrameKind::Req
        };
        self.inject_on_flow(Some(peer_key), kind, &spec.method, spec.body.clone(), spec.to_client, None)
    }

    /// Synthesizes and schedules one frame. Returns the allocated
    /// `msg_id` so the caller can register a waiter immediately after —
    /// by the time this call returns, the frame has been handed to the
    /// host, but transmission and any response are necessarily later, so
    /// there's no race as long as the waiter is registered before control
    /// returns to whatever might observe the response.
    pub fn inject(
        &mut self,
        peer_key: Option<&str>,
        kind: FrameKind,
        method: &str,
        body: liqi_wire::LiqiValue,
        to_client: bool,
        force_id: Option<u16>,
    ) -> Result<u16, InjectError> {
        self.inject_on_flow(peer_key, kind, method, body, to_client, force_id)
    }

    fn inject_on_flow(
        &mut self,
        peer_key: Option<&str>,
        kind: FrameKind,
        method: &str,
        body: liqi_wire::LiqiValue,
        to_client: bool,
        force_id: Option<u16>,
    ) -> Result<u16, InjectError> {
        let target = self.pick_flow(peer_key).ok_or(InjectError::NoActiveFlow)?;
        let flow = self.flows.get_mut(&target).ok_or(InjectError::NoActiveFlow)?;

        let msg_id = match kind {
            FrameKind::Notify => None,
            FrameKind::Req | FrameKind::Res => {
                Some(force_id.unwrap_or_else(|| flow.codec.allocate_inject_id()))
            }
        };

        let view = FrameView {
            kind,
            msg_id,
            method: method.to_owned(),
            body,
            from_client: !to_client,
            raw: vec![],
            notify_inner_name: None,
        };
        let bytes = flow.codec.build_frame(&view)?;

        if let (FrameKind::Req, Some(id)) = (kind, msg_id) {
            flow.codec.register_injected_request(id, method);
        }

        self.host.inject(&target, to_client, bytes)?;

        Ok(msg_id.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liqi_wire::MethodTypes;
    use std::sync::Mutex;

    struct RecordingHost {
        sent: Mutex<Vec<(String, bool, Vec<u8>)>>,
    }

    impl InjectHost for RecordingHost {
        fn inject(&self, peer_key: &str, to_client: bool, bytes: Vec<u8>) -> Result<(), InjectError> {
            self.sent
                .lock()
                .unwrap()
                .push((peer_key.to_owned(), to_client, bytes));
            Ok(())
        }
    }

    fn descriptor() -> Descriptor {
        let mut d = Descriptor::empty();
        d.insert(
            ".lq.Lobby.amuletActivityBuy",
            MethodTypes {
                request_type: "Req".into(),
                response_type: "Res".into(),
            },
        );
        d
    }

    #[test]
    fn drop_still_resolves_waiters_before_suppressing() {
        let host = RecordingHost {
            sent: Mutex::new(vec![]),
        };
        let mut addon = Addon::new(descriptor(), host);
        addon.set_inbound_hook(Box::new(|_| HookOutcome::drop_frame()));

        addon.handle_message("peer", &[1, 0x01], true); // touch flow so it exists
        let flow = addon.ensure_flow("peer");
        let req = FrameView {
            kind: FrameKind::Req,
            msg_id: Some(10),
            method: ".lq.Lobby.amuletActivityBuy".into(),
            body: Default::default(),
            from_client: true,
            raw: vec![],
            notify_inner_name: None,
        };
        let req_bytes = flow.codec.build_frame(&req).unwrap();
        addon.handle_message("peer", &req_bytes, true);

        let waiters = addon.waiters_for("peer").unwrap();
        waiters.register(10).unwrap();

        let flow = addon.ensure_flow("peer");
        let res = FrameView {
            kind: FrameKind::Res,
            msg_id: Some(10),
            method: String::new(),
            body: Default::default(),
            from_client: false,
            raw: vec![],
            notify_inner_name: None,
        };
        let res_bytes = flow.codec.build_frame(&res).unwrap();
        let emitted = addon.handle_message("peer", &res_bytes, false);

        assert!(emitted.is_none());
        assert!(waiters.pop_response(10).is_some());
    }

    #[test]
    fn inject_allocates_id_and_hands_off_to_host() {
        let host = RecordingHost {
            sent: Mutex::new(vec![]),
        };
        let mut addon = Addon::new(descriptor(), host);
        addon.ensure_flow("peer");
        let msg_id = addon
            .inject(
                Some("peer"),
                FrameKind::Req,
                ".lq.Lobby.amuletActivityBuy",
                Default::default(),
                false,
                None,
            )
            .unwrap();
        assert!(addon.host.sent.lock().unwrap().iter().any(|(p, _, _)| p == "peer"));
        assert_ne!(msg_id, 0);
    }
}
