//! Frame parsing/building and the per-connection request/response map.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::descriptor::{split_method, Descriptor};
use crate::error::CodecError;
use crate::value::{decode_fields, encode_fields, single_bytes, single_str, LiqiValue};
use crate::xor::xor;

/// Methods logged at `trace` rather than `debug`/`info` — high-frequency
/// bookkeeping traffic that would otherwise drown out everything else.
const QUIET_METHODS: &[&str] = &[
    ".lq.Lobby.oauth2Login",
    ".lq.Lobby.heartbeat",
    ".lq.Lobby.prepareLogin",
    ".lq.Lobby.requestConnection",
    ".lq.Lobby.fetchServerTime",
    ".lq.Lobby.loginSuccess",
    ".lq.Lobby.loginBeat",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Notify,
    Req,
    Res,
}

impl FrameKind {
    fn tag(self) -> u8 {
        match self {
            FrameKind::Notify => 1,
            FrameKind::Req => 2,
            FrameKind::Res => 3,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            1 => Ok(FrameKind::Notify),
            2 => Ok(FrameKind::Req),
            3 => Ok(FrameKind::Res),
            other => Err(CodecError::UnknownKind(other)),
        }
    }
}

/// A fully parsed frame. `method` is empty for opaque/unknown-method `Res`
/// frames (the response arrived after its waiter entry was lost, or was
/// never registered).
#[derive(Debug, Clone)]
pub struct FrameView {
    pub kind: FrameKind,
    pub msg_id: Option<u16>,
    pub method: String,
    pub body: LiqiValue,
    pub from_client: bool,
    pub raw: Vec<u8>,
    /// `Some(name)` when this Notify's body arrived wrapped as an
    /// obfuscated inner message (outer field 1 = inner type name, field 2 =
    /// XOR'd inner bytes) — `body` is already the *unwrapped* inner fields
    /// in that case, and `name` must be threaded back through
    /// [`Codec::build_frame`] to re-wrap symmetrically. `None` for
    /// everything else (Req/Res frames, and Notify frames whose payload
    /// decoded directly with no wrap).
    pub notify_inner_name: Option<String>,
}

impl FrameView {
    pub fn is_response_opaque(&self) -> bool {
        self.kind == FrameKind::Res && self.method.is_empty()
    }
}

fn log_method(method: &str, from_client: bool) {
    let direction = if from_client { "->" } else { "<-" };
    if QUIET_METHODS.contains(&method) {
        trace!(method, direction, "liqi frame");
    } else {
        debug!(method, direction, "liqi frame");
    }
}

/// Per-connection codec state: the descriptor table (shared, read-only
/// after load) plus the live `msg_id -> (method, response_type)` map that
/// lets a `Res` frame be decoded with the right type.
pub struct Codec {
    descriptor: Descriptor,
    resp_map: HashMap<u16, (String, String)>,
    last_client_req_id: Option<u16>,
}

impl Codec {
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            resp_map: HashMap::new(),
            last_client_req_id: None,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn resp_map_len(&self) -> usize {
        self.resp_map.len()
    }

    pub fn last_client_req_id(&self) -> Option<u16> {
        self.last_client_req_id
    }

    /// Parses raw bytes into a [`FrameView`], updating `resp_map` and
    /// `last_client_req_id` bookkeeping as a side effect.
    pub fn parse_frame(&mut self, raw: &[u8], from_client: bool) -> Result<FrameView, CodecError> {
        let &tag = raw.first().ok_or(CodecError::Truncated)?;
        let kind = FrameKind::from_tag(tag)?;
        let mut pos = 1usize;

        let msg_id = match kind {
            FrameKind::Notify => None,
            FrameKind::Req | FrameKind::Res => {
                let lo = *raw.get(pos).ok_or(CodecError::Truncated)? as u16;
                let hi = *raw.get(pos + 1).ok_or(CodecError::Truncated)? as u16;
                pos += 2;
                Some(lo | (hi << 8))
            }
        };

        let envelope = decode_fields(&raw[pos..])?;
        let method = single_str(&envelope, 1).unwrap_or_default();
        let payload = single_bytes(&envelope, 2).unwrap_or_default();

        let view = match kind {
            FrameKind::Notify => self.decode_notify(&method, &payload, from_client, raw)?,
            FrameKind::Req => {
                let msg_id = msg_id.expect("Req always carries a msg_id");
                self.decode_req(msg_id, &method, &payload, from_client, raw)?
            }
            FrameKind::Res => {
                let msg_id = msg_id.expect("Res always carries a msg_id");
                self.decode_res(msg_id, &payload, from_client, raw)?
            }
        };

        log_method(&view.method, from_client);
        Ok(view)
    }

    fn decode_notify(
        &self,
        method: &str,
        payload: &[u8],
        from_client: bool,
        raw: &[u8],
    ) -> Result<FrameView, CodecError> {
        // Notify bodies may wrap an inner, XOR-obfuscated sub-message named
        // by a `name` field alongside raw `data` bytes. If that shape isn't
        // present the payload is decoded directly as the notify body.
        let (body, notify_inner_name) = match decode_fields(payload) {
            Ok(fields) => {
                let inner_name = single_str(&fields, 1);
                match (inner_name, single_bytes(&fields, 2)) {
                    (Some(name), Some(inner)) => match decode_fields(&xor(&inner)) {
                        Ok(inner_fields) => (inner_fields, Some(name)),
                        Err(_) => (fields, None),
                    },
                    _ => (fields, None),
                }
            }
            Err(_) => (LiqiValue::new(), None),
        };
        Ok(FrameView {
            kind: FrameKind::Notify,
            msg_id: None,
            method: method.to_owned(),
            body,
            from_client,
            raw: raw.to_vec(),
            notify_inner_name,
        })
    }

    fn decode_req(
        &mut self,
        msg_id: u16,
        method: &str,
        payload: &[u8],
        from_client: bool,
        raw: &[u8],
    ) -> Result<FrameView, CodecError> {
        let types = self.descriptor.lookup(method);
        let response_type = types
            .map(|t| t.response_type.clone())
            .unwrap_or_default();
        self.resp_map
            .insert(msg_id, (method.to_owned(), response_type));
        if from_client {
            self.last_client_req_id = Some(msg_id);
        }
        let body = decode_fields(payload).unwrap_or_default();
        Ok(FrameView {
            kind: FrameKind::Req,
            msg_id: Some(msg_id),
            method: method.to_owned(),
            body,
            from_client,
            raw: raw.to_vec(),
            notify_inner_name: None,
        })
    }

    fn decode_res(
        &mut self,
        msg_id: u16,
        payload: &[u8],
        from_client: bool,
        raw: &[u8],
    ) -> Result<FrameView, CodecError> {
        let body = decode_fields(payload).unwrap_or_default();
        match self.resp_map.remove(&msg_id) {
            Some((method, _response_type)) => Ok(FrameView {
                kind: FrameKind::Res,
                msg_id: Some(msg_id),
                method,
                body,
                from_client,
                raw: raw.to_vec(),
                notify_inner_name: None,
            }),
            None => Ok(FrameView {
                kind: FrameKind::Res,
                msg_id: Some(msg_id),
                method: String::new(),
                body,
                from_client,
                raw: raw.to_vec(),
                notify_inner_name: None,
            }),
        }
    }

    /// Serializes a [`FrameView`] back to wire bytes. Does not allocate an
    /// id for Req/Res frames — callers supply `msg_id` (see
    /// [`Self::allocate_inject_id`]).
    pub fn build_frame(&self, view: &FrameView) -> Result<Vec<u8>, CodecError> {
        let mut out = vec![view.kind.tag()];
        if matches!(view.kind, FrameKind::Req | FrameKind::Res) {
            let id = view
                .msg_id
                .ok_or_else(|| CodecError::BuildFailure("Req/Res frame missing msg_id".into()))?;
            out.push((id & 0xFF) as u8);
            out.push((id >> 8) as u8);
        }
        let payload = match (&view.kind, &view.notify_inner_name) {
            (FrameKind::Notify, Some(inner_name)) => {
                let mut wrapped: LiqiValue = LiqiValue::new();
                crate::value::set_str(&mut wrapped, 1, inner_name);
                crate::value::set_bytes(&mut wrapped, 2, xor(&encode_fields(&view.body)));
                encode_fields(&wrapped)
            }
            _ => encode_fields(&view.body),
        };
        let mut envelope: LiqiValue = LiqiValue::new();
        crate::value::set_str(&mut envelope, 1, &view.method);
        crate::value::set_bytes(&mut envelope, 2, payload);
        out.extend(encode_fields(&envelope));
        Ok(out)
    }

    /// Picks an id for an injected Req/Res frame: starts at
    /// `last_client_req_id - 1 (mod 2^16)` and decrements while the
    /// candidate collides with a live `resp_map` entry, up to 16 probes.
    pub fn allocate_inject_id(&self) -> u16 {
        let base = self.last_client_req_id.unwrap_or(0);
        let mut candidate = base.wrapping_sub(1);
        for _ in 0..16 {
            if !self.resp_map.contains_key(&candidate) {
                return candidate;
            }
            candidate = candidate.wrapping_sub(1);
        }
        candidate
    }

    /// Registers a `resp_map` entry without going through a full parse —
    /// used right after building an injected `Req` so the matching `Res`
    /// can be decoded and correlated.
    pub fn register_injected_request(&mut self, msg_id: u16, method: &str) {
        let response_type = self
            .descriptor
            .lookup(method)
            .map(|t| t.response_type.clone())
            .unwrap_or_default();
        self.resp_map
            .insert(msg_id, (method.to_owned(), response_type));
    }

    pub fn split_method(method: &str) -> Result<(String, String, String), CodecError> {
        split_method(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MethodTypes;

    fn codec_with(method: &str) -> Codec {
        let mut d = Descriptor::empty();
        d.insert(
            method,
            MethodTypes {
                request_type: "Req".into(),
                response_type: "Res".into(),
            },
        );
        Codec::new(d)
    }

    #[test]
    fn notify_round_trips() {
        let mut codec = codec_with(".lq.Lobby.oauth2Login");
        let view = FrameView {
            kind: FrameKind::Notify,
            msg_id: None,
            method: ".lq.Lobby.oauth2Login".into(),
            body: LiqiValue::new(),
            from_client: true,
            raw: vec![],
            notify_inner_name: None,
        };
        let bytes = codec.build_frame(&view).unwrap();
        let reparsed = codec.parse_frame(&bytes, true).unwrap();
        assert_eq!(reparsed.kind, FrameKind::Notify);
        assert_eq!(reparsed.method, ".lq.Lobby.oauth2Login");
    }

    #[test]
    fn req_then_res_round_trips_through_resp_map() {
        let mut codec = codec_with(".lq.Lobby.amuletActivityBuy");
        let req = FrameView {
            kind: FrameKind::Req,
            msg_id: Some(0x1234),
            method: ".lq.Lobby.amuletActivityBuy".into(),
            body: LiqiValue::new(),
            from_client: true,
            raw: vec![],
            notify_inner_name: None,
        };
        let req_bytes = codec.build_frame(&req).unwrap();
        codec.parse_frame(&req_bytes, true).unwrap();
        assert_eq!(codec.resp_map_len(), 1);

        let res = FrameView {
            kind: FrameKind::Res,
            msg_id: Some(0x1234),
            method: String::new(),
            body: LiqiValue::new(),
            from_client: false,
            raw: vec![],
            notify_inner_name: None,
        };
        let res_bytes = codec.build_frame(&res).unwrap();
        let parsed_res = codec.parse_frame(&res_bytes, false).unwrap();
        assert_eq!(parsed_res.method, ".lq.Lobby.amuletActivityBuy");
        assert_eq!(codec.resp_map_len(), 0);
    }

    #[test]
    fn unknown_response_decodes_opaque_instead_of_failing() {
        let mut codec = codec_with(".lq.Lobby.heartbeat");
        let res = FrameView {
            kind: FrameKind::Res,
            msg_id: Some(99),
            method: String::new(),
            body: LiqiValue::new(),
            from_client: false,
            raw: vec![],
            notify_inner_name: None,
        };
        let bytes = codec.build_frame(&res).unwrap();
        let parsed = codec.parse_frame(&bytes, false).unwrap();
        assert!(parsed.is_response_opaque());
    }

    #[test]
    fn obfuscated_notify_body_round_trips() {
        let mut codec = codec_with(".lq.NotifyGameEndResult");
        let mut inner_body = LiqiValue::new();
        crate::value::set_str(&mut inner_body, 3, "deadbeef");
        let view = FrameView {
            kind: FrameKind::Notify,
            msg_id: None,
            method: ".lq.NotifyGameEndResult".into(),
            body: inner_body,
            from_client: false,
            raw: vec![],
            notify_inner_name: Some("GameEndResult".into()),
        };
        let bytes = codec.build_frame(&view).unwrap();
        let reparsed = codec.parse_frame(&bytes, false).unwrap();
        assert_eq!(reparsed.notify_inner_name.as_deref(), Some("GameEndResult"));
        assert_eq!(single_str(&reparsed.body, 3).as_deref(), Some("deadbeef"));

        let rebuilt = codec.build_frame(&reparsed).unwrap();
        assert_eq!(rebuilt, bytes);
    }

    #[test]
    fn allocate_inject_id_avoids_collisions() {
        let mut codec = codec_with(".lq.Lobby.x");
        codec.last_client_req_id = Some(100);
        codec.resp_map.insert(99, ("a".into(), "b".into()));
        codec.resp_map.insert(98, ("a".into(), "b".into()));
        assert_eq!(codec.allocate_inject_id(), 97);
    }
}
