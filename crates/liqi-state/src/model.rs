//! The derived game state the automation layer consumes, and the small
//! value types it's built from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum Stage {
    FreeEffect = 1,
    Change = 2,
    Play = 3,
    Shop = 4,
    SelectPack = 5,
    LevelConfirm = 6,
    RewardPack = 7,
    End = 100,
}

impl Stage {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Stage::FreeEffect),
            2 => Some(Stage::Change),
            3 => Some(Stage::Play),
            4 => Some(Stage::Shop),
            5 => Some(Stage::SelectPack),
            6 => Some(Stage::LevelConfirm),
            7 => Some(Stage::RewardPack),
            100 => Some(Stage::End),
            _ => None,
        }
    }
}

/// An owned or candidate amulet. `id = reg * 10 + (1 if plus else 0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amulet {
    pub uid: i64,
    pub id: i64,
    pub badge: Option<i64>,
    pub volume: i64,
    /// The amulet's "store" list, when present — the original's theft-like
    /// classification inspects the first entry's reg id.
    pub store: Vec<i64>,
}

impl Amulet {
    pub fn reg(&self) -> i64 {
        self.id / 10
    }

    pub fn is_plus(&self) -> bool {
        self.id % 10 == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    Badge,
    Amulet,
}

/// A user-declared goal: either a bare badge id, or a (reg, plus?, badge?)
/// triple that an owned amulet must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub reg: i64,
    pub plus: Option<bool>,
    pub badge: Option<i64>,
    /// Weight this target contributes to the achievement score when met.
    /// Defaults to 1 if absent in the source config.
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Good {
    pub id: i64,
    pub goods_id: i64,
    pub price: i64,
    pub sold: bool,
}

/// Incrementally-updated game state, projected from parsed server events.
/// See `liqi-state::reducers` for the event-dispatch that mutates this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameState {
    pub stage: Option<Stage>,
    /// Insertion order is the deck's draw order.
    pub deck_map: BTreeMap<i64, String>,
    pub hand_tiles: Vec<i64>,
    pub dora_tiles: Vec<i64>,
    pub wall_tiles: Vec<i64>,
    pub replacement_tiles: Vec<i64>,
    pub locked_tiles: Vec<i64>,
    pub dropped_tiles: Vec<i64>,
    pub effect_list: Vec<Amulet>,
    pub candidate_effect_list: Vec<Amulet>,
    pub coin: i64,
    pub level: i64,
    pub refresh_price: i64,
    pub max_effect_volume: i64,
    pub change_tile_count: i64,
    pub total_change_tile_count: i64,
    pub next_operation: Vec<i64>,
    pub goods: Vec<Good>,
    pub targets: Vec<Target>,
    pub ended: bool,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_volume(&self) -> i64 {
        self.effect_list.iter().map(|a| a.volume).sum()
    }

    pub fn free_space(&self) -> i64 {
        self.max_effect_volume - self.total_volume()
    }

    pub fn find_by_uid(&self, uid: i64) -> Option<&Amulet> {
        self.effect_list.iter().find(|a| a.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amulet_reg_and_plus_decompose_from_id() {
        let a = Amulet {
            uid: 1,
            id: 2301,
            badge: None,
            volume: 1,
            store: vec![],
        };
        assert_eq!(a.reg(), 230);
        assert!(a.is_plus());
    }

    #[test]
    fn free_space_accounts_for_owned_volume() {
        let mut gs = GameState::new();
        gs.max_effect_volume = 10;
        gs.effect_list.push(Amulet {
            uid: 1,
            id: 10,
            badge: None,
            volume: 3,
            store: vec![],
        });
        assert_eq!(gs.free_space(), 7);
    }
}
