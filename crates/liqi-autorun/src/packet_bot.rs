//! High-level RPC façade over [`Addon::inject`] + waiter correlation, with
//! stage/ownership/affordability preconditions checked before every call.
//!
//! Grounded on
//! `original_source/backend/bot/drivers/packet/packet_bot.py`
//! (`_inject_and_wait`, `_operate`, and the concrete op methods).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use liqi_proxy::{Addon, InjectHost};
use liqi_state::{GameState, Stage};
use liqi_wire::{FrameKind, LiqiField, LiqiValue};

use crate::retry::OpResult;

const OPERATE_METHOD: &str = ".lq.Lobby.amuletActivityOperate";

/// Operate sub-op codes, matching `packet_bot.py`'s `op_code` table.
mod op_code {
    pub const DISCARD: i64 = 1;
    pub const TSUMO: i64 = 8;
    pub const KAN: i64 = 4;
    pub const SKIP_REPLACE: i64 = 100;
    pub const REPLACE: i64 = 101;
}

/// Conventional request-envelope field ids for the operate family: `1` =
/// the op type, `2` = an associated tile/item id list. The live descriptor
/// names the real fields per RPC; these are the stable positions this
/// system's automation has always targeted.
const FIELD_TYPE: u32 = 1;
const FIELD_IDS: u32 = 2;
/// Field 1 of a `Res` envelope's business error sub-message: the error code.
const ERROR_FIELD: u32 = 1;
const ERROR_CODE_FIELD: u32 = 1;

fn varint_field(value: i64) -> LiqiField {
    LiqiField::Varint(value as u64)
}

fn ids_body(ids: &[i64]) -> LiqiValue {
    let mut body = LiqiValue::new();
    body.insert(FIELD_IDS, ids.iter().map(|&i| varint_field(i)).collect());
    body
}

fn operate_body(op: i64, ids: &[i64]) -> LiqiValue {
    let mut body = ids_body(ids);
    body.insert(FIELD_TYPE, vec![varint_field(op)]);
    body
}

fn business_error_code(body: &LiqiValue) -> Option<i64> {
    let error_bytes = body
        .get(&ERROR_FIELD)
        .and_then(|fs| fs.first())
        .and_then(LiqiField::as_bytes)?;
    let fields = liqi_wire::value::decode_fields(error_bytes).ok()?;
    fields
        .get(&ERROR_CODE_FIELD)
        .and_then(|fs| fs.first())
        .and_then(LiqiField::as_varint)
        .map(|c| c as i64)
}

pub struct PacketBot<H: InjectHost> {
    addon: Arc<Mutex<Addon<H>>>,
    state: Arc<Mutex<GameState>>,
    peer_key: Option<String>,
    timeout: Duration,
}

impl<H: InjectHost> PacketBot<H> {
    pub fn new(addon: Arc<Mutex<Addon<H>>>, state: Arc<Mutex<GameState>>) -> Self {
        Self {
            addon,
            state,
            peer_key: None,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_peer_key(mut self, peer_key: impl Into<String>) -> Self {
        self.peer_key = Some(peer_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The shared game state this bot's responses are projected into.
    pub fn state(&self) -> Arc<Mutex<GameState>> {
        Arc::clone(&self.state)
    }

    fn check_stage(&self, expected: Stage) -> Result<(), String> {
        let state = self.state.lock().unwrap();
        if state.stage == Some(expected) {
            Ok(())
        } else {
            Err(format!("stage-mismatch: expected {expected:?}, got {:?}", state.stage))
        }
    }

    fn ops_allow(&self, op: i64) -> Result<(), String> {
        let state = self.state.lock().unwrap();
        if state.next_operation.contains(&op) {
            Ok(())
        } else {
            Err(format!("operation {op} not permitted by next_operation"))
        }
    }

    /// Injects `method`/`body` as a Req and blocks for the matching Res,
    /// returning the three-tuple contract every op method builds on.
    fn inject_and_wait(&self, method: &str, body: LiqiValue) -> OpResult {
        let (msg_id, waiters) = {
            let mut addon = self.addon.lock().unwrap();
            let msg_id = match addon.inject(
                self.peer_key.as_deref(),
                FrameKind::Req,
                method,
                body,
                false,
                None,
            ) {
                Ok(id) => id,
                Err(e) => return (false, e.as_reason(), None),
            };
            let waiters = match self.peer_key.as_deref().and_then(|pk| addon.waiters_for(pk)) {
                Some(w) => w,
                None => match addon.preferred_flow().and_then(|pk| addon.waiters_for(pk)) {
                    Some(w) => w,
                    None => return (false, "no-preferred-flow".to_owned(), None),
                },
            };
            (msg_id, waiters)
        };

        if waiters.register(msg_id).is_err() {
            return (false, "duplicate-waiter".to_owned(), None);
        }

        if !waiters.wait(msg_id, self.timeout) {
            waiters.discard(msg_id);
            return (false, "timeout".to_owned(), None);
        }

        let Some(resp) = waiters.pop_response(msg_id) else {
            return (false, "timeout".to_owned(), None);
        };

        if let Some(code) = business_error_code(&resp.body) {
            if code != 0 {
                return (false, format!("error code: {code}"), Some(resp.body_as_placeholder()));
            }
        }

        (true, "ok".to_owned(), Some(resp.body_as_placeholder()))
    }

    fn operate(&self, op: i64, ids: &[i64]) -> OpResult {
        self.inject_and_wait(OPERATE_METHOD, operate_body(op, ids))
    }

    pub fn start_game(&self) -> OpResult {
        self.inject_and_wait(".lq.Lobby.amuletActivityStartGame", LiqiValue::new())
    }

    pub fn giveup(&self) -> OpResult {
        self.inject_and_wait(".lq.Lobby.amuletActivityGiveup", LiqiValue::new())
    }

    pub fn next_level(&self) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::LevelConfirm) {
            return (false, reason, None);
        }
        self.inject_and_wait(".lq.Lobby.amuletActivityNextLevel", LiqiValue::new())
    }

    pub fn op_tsumo(&self) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::Play) {
            return (false, reason, None);
        }
        if let Err(reason) = self.ops_allow(op_code::TSUMO) {
            return (false, reason, None);
        }
        self.operate(op_code::TSUMO, &[])
    }

    pub fn discard_by_tile_id(&self, tile_id: i64) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::Play) {
            return (false, reason, None);
        }
        if let Err(reason) = self.ops_allow(op_code::DISCARD) {
            return (false, reason, None);
        }
        {
            let state = self.state.lock().unwrap();
            if !state.hand_tiles.contains(&tile_id) {
                return (false, format!("tile {tile_id} not in hand"), None);
            }
        }
        self.operate(op_code::DISCARD, &[tile_id])
    }

    pub fn op_skip_change(&self) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::Change) {
            return (false, reason, None);
        }
        self.operate(op_code::SKIP_REPLACE, &[])
    }

    pub fn op_change(&self, ids: &[i64]) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::Change) {
            return (false, reason, None);
        }
        self.operate(op_code::REPLACE, ids)
    }

    pub fn op_kan(&self, tile_id: i64) -> OpResult {
        if let Err(reason) = self.ops_allow(op_code::KAN) {
            return (false, reason, None);
        }
        self.operate(op_code::KAN, &[tile_id])
    }

    fn candidate_exists(&self, candidate_id: i64) -> bool {
        // 0 is the reserved "skip this pack" sentinel (SPEC_FULL.md's
        // `select_effect(0)` to skip), never a real candidate uid.
        candidate_id == 0
            || self
                .state
                .lock()
                .unwrap()
                .candidate_effect_list
                .iter()
                .any(|a| a.uid == candidate_id)
    }

    pub fn select_free_effect(&self, candidate_id: i64) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::FreeEffect) {
            return (false, reason, None);
        }
        if !self.candidate_exists(candidate_id) {
            return (false, "candidate not in candidate_effect_list".to_owned(), None);
        }
        self.inject_and_wait(
            ".lq.Lobby.amuletActivitySelectFreeEffect",
            ids_body(&[candidate_id]),
        )
    }

    pub fn select_effect(&self, selected_id: i64) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::SelectPack) {
            return (false, reason, None);
        }
        if !self.candidate_exists(selected_id) {
            return (false, "candidate not in candidate_effect_list".to_owned(), None);
        }
        self.inject_and_wait(".lq.Lobby.amuletActivitySelectPack", ids_body(&[selected_id]))
    }

    pub fn select_reward_effect(&self, selected_id: i64) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::RewardPack) {
            return (false, reason, None);
        }
        if !self.candidate_exists(selected_id) {
            return (false, "candidate not in candidate_effect_list".to_owned(), None);
        }
        self.inject_and_wait(
            ".lq.Lobby.amuletActivitySelectRewardPack",
            ids_body(&[selected_id]),
        )
    }

    pub fn buy_pack(&self, goods_id: i64) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::Shop) {
            return (false, reason, None);
        }
        {
            let state = self.state.lock().unwrap();
            let good = state.goods.iter().find(|g| g.id == goods_id);
            match good {
                Some(g) if g.sold => return (false, "good already sold".to_owned(), None),
                None => return (false, "good not found".to_owned(), None),
                _ => {}
            }
        }
        self.inject_and_wait(".lq.Lobby.amuletActivityBuy", ids_body(&[goods_id]))
    }

    pub fn refresh_shop(&self) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::Shop) {
            return (false, reason, None);
        }
        {
            let state = self.state.lock().unwrap();
            if state.coin < state.refresh_price {
                return (false, "insufficient coin to refresh shop".to_owned(), None);
            }
        }
        self.inject_and_wait(".lq.Lobby.amuletActivityRefreshShop", LiqiValue::new())
    }

    pub fn sell_effect(&self, uid: i64) -> OpResult {
        {
            let state = self.state.lock().unwrap();
            if state.find_by_uid(uid).is_none() {
                return (false, "uid not in effect_list".to_owned(), None);
            }
        }
        self.inject_and_wait(".lq.Lobby.amuletActivitySellEffect", ids_body(&[uid]))
    }

    pub fn sort_effect(&self, uid_order: &[i64]) -> OpResult {
        self.inject_and_wait(".lq.Lobby.amuletActivityEffectSort", ids_body(uid_order))
    }

    pub fn end_shopping(&self) -> OpResult {
        if let Err(reason) = self.check_stage(Stage::Shop) {
            return (false, reason, None);
        }
        self.inject_and_wait(".lq.Lobby.amuletActivityEndShopping", LiqiValue::new())
    }

    pub fn fetch_game_data(&self) -> OpResult {
        self.inject_and_wait(".lq.Lobby.fetchAmuletActivityData", LiqiValue::new())
    }

    pub fn heartbeat(&self) -> OpResult {
        self.inject_and_wait(".lq.Lobby.heartbeat", LiqiValue::new())
    }
}

/// Converts a raw body map into a loosely-typed JSON placeholder for
/// callers that only need to check a handful of named keys — the core
/// automation logic consults `GameState` for everything else.
trait BodyPlaceholder {
    fn body_as_placeholder(&self) -> serde_json::Value;
}

impl BodyPlaceholder for liqi_wire::FrameView {
    fn body_as_placeholder(&self) -> serde_json::Value {
        let map: BTreeMap<String, serde_json::Value> = self
            .body
            .iter()
            .map(|(id, values)| {
                let v = values
                    .first()
                    .map(|f| match f {
                        LiqiField::Varint(n) => serde_json::Value::from(*n),
                        LiqiField::Bytes(b) => serde_json::Value::String(
                            String::from_utf8_lossy(b).into_owned(),
                        ),
                    })
                    .unwrap_or(serde_json::Value::Null);
                (id.to_string(), v)
            })
            .collect();
        serde_json::Value::Object(map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operate_body_carries_op_and_ids() {
        let body = operate_body(op_code::DISCARD, &[5]);
        assert_eq!(
            body.get(&FIELD_TYPE).unwrap().first().unwrap().as_varint(),
            Some(op_code::DISCARD as u64)
        );
        assert_eq!(
            body.get(&FIELD_IDS).unwrap().first().unwrap().as_varint(),
            Some(5)
        );
    }
}
