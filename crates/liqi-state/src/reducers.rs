//! Event-type-keyed reducers that turn a parsed inbound `Res`/`Notify` body
//! into `GameState` mutations.
//!
//! The wire layer (`liqi-wire`) only knows how to walk the generic
//! varint/length-delimited field structure of a message — it has no
//! concrete schema for any particular RPC's response shape. These reducers
//! assume the caller has already projected a response body into a named
//! JSON view (`serde_json::Value`) the way the reference implementation's
//! `protobuf.js`-backed decoder does, and dispatch on `(method, event
//! type)` exactly as `on_inbound` does there.

use serde_json::Value;

use crate::model::{Amulet, Good, Stage};
use crate::patch::merge;
use crate::pool::{apply_draw, ingest_pool};
use crate::GameState;

const EV_ROUND_START: i64 = 23;
const EV_COIN_UPDATE: i64 = 48;
const EV_STAGE_UPDATE: i64 = 49;
const EV_GAME_END: i64 = 100;
const EV_TILE_CHANGE: i64 = 4;
const EV_DRAW: i64 = 6;
const EV_FINISH: i64 = 11;
const EV_SELECT_PACK: i64 = 14;
const EV_BUY: i64 = 13;
const EV_SELL_EFFECT: i64 = 17;
const EV_REFRESH_SHOP: i64 = 18;
const EV_EFFECT_SORT: i64 = 20;
const EV_SELECT_REWARD_PACK: i64 = 16;
const EV_UPGRADE_SHOP_BUFF: i64 = 21;
const EV_END_SHOPPING: i64 = 22;

fn events_of(body: &Value) -> impl Iterator<Item = &Value> {
    body.get("events")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn event_type(e: &Value) -> Option<i64> {
    e.get("type").and_then(Value::as_i64)
}

fn i64_at(v: &Value, key: &str) -> Option<i64> {
    v.get(key).and_then(Value::as_i64)
}

fn amulet_from_json(v: &Value) -> Amulet {
    Amulet {
        uid: i64_at(v, "uid").unwrap_or_default(),
        id: i64_at(v, "id").unwrap_or_default(),
        badge: v.get("badge").and_then(|b| i64_at(b, "id")),
        volume: i64_at(v, "volume").unwrap_or(1),
        store: v
            .get("store")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default(),
    }
}

fn amulets_from_json(v: &Value) -> Vec<Amulet> {
    v.as_array()
        .map(|a| a.iter().map(amulet_from_json).collect())
        .unwrap_or_default()
}

fn goods_from_json(v: &Value) -> Vec<Good> {
    v.as_array()
        .map(|a| {
            a.iter()
                .map(|g| Good {
                    id: i64_at(g, "id").unwrap_or_default(),
                    goods_id: i64_at(g, "goodsId").unwrap_or_default(),
                    price: i64_at(g, "price").unwrap_or_default(),
                    sold: g.get("sold").and_then(Value::as_bool).unwrap_or(false),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn pool_from_json(v: &Value) -> Vec<(i64, String)> {
    v.as_array()
        .map(|a| {
            a.iter()
                .filter_map(|t| {
                    let id = i64_at(t, "id")?;
                    let face = t.get("face").and_then(Value::as_str)?.to_owned();
                    Some((id, face))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn ids_from_json(v: &Value) -> Vec<i64> {
    v.as_array()
        .map(|a| a.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn apply_common_round_fields(state: &mut GameState, data: &Value) {
    if let Some(hand) = data.get("hands") {
        state.hand_tiles = ids_from_json(hand);
    }
    if let Some(pool) = data.get("pool") {
        let pool = pool_from_json(pool);
        let hand = state.hand_tiles.clone();
        ingest_pool(state, &pool, &hand);
    }
    if let Some(next_op) = data.get("nextOperation") {
        state.next_operation = ids_from_json(next_op);
    }
    if let Some(locked) = data.get("lockedTile") {
        state.locked_tiles = ids_from_json(locked);
    }
    if let Some(effects) = data.get("effectList") {
        state.effect_list = amulets_from_json(effects);
    }
}

fn apply_stage_transition(state: &mut GameState, e: &Value) {
    if let Some(stage_num) = e.get("data").and_then(|d| i64_at(d, "stage")) {
        state.stage = Stage::from_u32(stage_num as u32);
    }
}

/// Applies every reducer that matches `method` and the response/notify
/// `body`. Mirrors the reference's `on_inbound` method/event dispatch
/// table; only state-affecting branches are ported (pre-submission
/// confirmation guards are a UI/ClickBot concern, out of this crate's
/// scope).
pub fn apply_event(state: &mut GameState, method: &str, body: &Value) {
    match method {
        ".lq.Lobby.fetchAmuletActivityData" => {
            apply_common_round_fields(state, body);
            if let Some(coin) = i64_at(body, "coin") {
                state.coin = coin;
            }
            if let Some(level) = i64_at(body, "level") {
                state.level = level;
            }
            if let Some(goods) = body.get("goods") {
                state.goods = goods_from_json(goods);
            }
            if let Some(stage_num) = i64_at(body, "stage") {
                state.stage = Stage::from_u32(stage_num as u32);
            }
        }
        ".lq.Lobby.amuletActivityUpgrade" => {
            for e in events_of(body) {
                match event_type(e) {
                    Some(EV_ROUND_START) => {
                        if let Some(data) = e.get("data") {
                            apply_common_round_fields(state, data);
                        }
                        // nested type-19 stage transition inside the same event batch
                        if let Some(nested) = e.get("events") {
                            for inner in nested.as_array().into_iter().flatten() {
                                if event_type(inner) == Some(19) {
                                    apply_stage_transition(state, inner);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        ".lq.Lobby.amuletActivityOperate" => {
            for e in events_of(body) {
                match event_type(e) {
                    Some(EV_COIN_UPDATE) => {
                        if let Some(data) = e.get("data") {
                            if let Some(coin) = i64_at(data, "coin") {
                                let existing = Value::from(state.coin);
                                let merged = merge(&existing, &Value::from(coin));
                                state.coin = merged.as_i64().unwrap_or(coin);
                            }
                        }
                    }
                    Some(EV_STAGE_UPDATE) => apply_stage_transition(state, e),
                    Some(EV_GAME_END) => state.ended = true,
                    Some(EV_TILE_CHANGE) => {
                        if let Some(data) = e.get("data") {
                            if let Some(used) = data.get("usedTiles") {
                                let used = ids_from_json(used);
                                state
                                    .hand_tiles
                                    .retain(|t| !used.contains(t));
                                state.dropped_tiles.extend(used);
                            }
                            if let Some(count) = i64_at(data, "changeTileCount") {
                                state.change_tile_count = count;
                            }
                            if let Some(total) = i64_at(data, "totalChangeTileCount") {
                                state.total_change_tile_count = total;
                            }
                        }
                    }
                    Some(EV_DRAW) => {
                        if let Some(data) = e.get("data") {
                            if let Some(id) = i64_at(data, "tile") {
                                apply_draw(state, id);
                            }
                        }
                    }
                    Some(EV_FINISH) => {
                        if let Some(data) = e.get("data") {
                            if let Some(effects) = data.get("effectList") {
                                state.effect_list = amulets_from_json(effects);
                            }
                            if let Some(coin) = i64_at(data, "coin") {
                                state.coin = coin;
                            }
                        }
                    }
                    Some(EV_SELECT_PACK) | Some(EV_SELECT_REWARD_PACK) => {
                        if let Some(data) = e.get("data") {
                            if let Some(candidates) = data.get("candidateEffectList") {
                                state.candidate_effect_list = amulets_from_json(candidates);
                            }
                        }
                    }
                    Some(EV_BUY) => {
                        if let Some(data) = e.get("data") {
                            if let Some(goods) = data.get("goods") {
                                state.goods = goods_from_json(goods);
                            }
                            if let Some(coin) = i64_at(data, "coin") {
                                state.coin = coin;
                            }
                        }
                    }
                    Some(EV_SELL_EFFECT) => {
                        if let Some(data) = e.get("data") {
                            if let Some(uid) = i64_at(data, "uid") {
                                state.effect_list.retain(|a| a.uid != uid);
                            }
                            if let Some(coin) = i64_at(data, "coin") {
                                state.coin = coin;
                            }
                        }
                    }
                    Some(EV_REFRESH_SHOP) => {
                        if let Some(data) = e.get("data") {
                            if let Some(goods) = data.get("goods") {
                                state.goods = goods_from_json(goods);
                            }
                            if let Some(price) = i64_at(data, "refreshPrice") {
                                state.refresh_price = price;
                            }
                            if let Some(coin) = i64_at(data, "coin") {
                                state.coin = coin;
                            }
                        }
                    }
                    Some(EV_EFFECT_SORT) => {
                        if let Some(data) = e.get("data") {
                            if let Some(effects) = data.get("effectList") {
                                state.effect_list = amulets_from_json(effects);
                            }
                        }
                    }
                    Some(EV_UPGRADE_SHOP_BUFF) => {
                        if let Some(data) = e.get("data") {
                            if let Some(volume) = i64_at(data, "maxEffectVolume") {
                                state.max_effect_volume = volume;
                            }
                            if let Some(coin) = i64_at(data, "coin") {
                                state.coin = coin;
                            }
                        }
                    }
                    Some(EV_END_SHOPPING) => {
                        apply_stage_transition(state, e);
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coin_update_event_sets_coin() {
        let mut state = GameState::new();
        let body = json!({
            "events": [
                {"type": EV_COIN_UPDATE, "data": {"coin": 55}}
            ]
        });
        apply_event(&mut state, ".lq.Lobby.amuletActivityOperate", &body);
        assert_eq!(state.coin, 55);
    }

    #[test]
    fn stage_update_event_sets_stage() {
        let mut state = GameState::new();
        let body = json!({
            "events": [
                {"type": EV_STAGE_UPDATE, "data": {"stage": 4}}
            ]
        });
        apply_event(&mut state, ".lq.Lobby.amuletActivityOperate", &body);
        assert_eq!(state.stage, Some(Stage::Shop));
    }

    #[test]
    fn game_end_event_sets_ended_flag() {
        let mut state = GameState::new();
        let body = json!({"events": [{"type": EV_GAME_END}]});
        apply_event(&mut state, ".lq.Lobby.amuletActivityOperate", &body);
        assert!(state.ended);
    }

    #[test]
    fn draw_event_advances_wall_into_hand() {
        let mut state = GameState::new();
        state.wall_tiles = vec![7, 8];
        let body = json!({"events": [{"type": EV_DRAW, "data": {"tile": 7}}]});
        apply_event(&mut state, ".lq.Lobby.amuletActivityOperate", &body);
        assert_eq!(state.wall_tiles, vec![8]);
        assert!(state.hand_tiles.contains(&7));
    }
}
