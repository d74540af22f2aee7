//! `AutoRunner`: the per-game automation loop that drives `PacketBot`
//! through a run of the amulet roguelike, stage by stage, until the
//! user's goals are met or the run ends.
//!
//! Grounded on `original_source/backend/autorun/runner.py`'s `AutoRunner`
//! class (`run_once`, `_handle_free_effect`, `_handle_change`,
//! `_handle_play`, `_handle_shop`, `_handle_select_pack`, the
//! heartbeat/status snapshot, and the start/stop/abort lifecycle). Lifted
//! onto `tokio::task::spawn` plus a plain `Arc<AtomicBool>` cancellation
//! flag per `SPEC_FULL.md` §5.1, rather than a callback-driven event loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use liqi_proxy::{ConfigSource, InjectHost, StateBroadcaster};
use liqi_state::{GameState, Stage};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::AutoRunError;
use crate::packet_bot::PacketBot;
use crate::planner::{self, PlanStatus};
use crate::valuation::{self, OrderingPolicy, Valuation};

pub struct AutoRunner<H, C, B>
where
    H: InjectHost + 'static,
    C: ConfigSource,
    B: StateBroadcaster + 'static,
{
    bot: Arc<PacketBot<H>>,
    state: Arc<std::sync::Mutex<GameState>>,
    config: C,
    broadcaster: Arc<B>,
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<H, C, B> AutoRunner<H, C, B>
where
    H: InjectHost + 'static,
    C: ConfigSource,
    B: StateBroadcaster + 'static,
{
    pub fn new(bot: Arc<PacketBot<H>>, config: C, broadcaster: Arc<B>) -> Self {
        let state = bot.state();
        Self {
            bot,
            state,
            config,
            broadcaster,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the tick loop on the current tokio runtime. Errors if
    /// already running.
    pub fn start(&mut self) -> Result<(), AutoRunError>
    where
        H: Send + Sync,
        B: Send + Sync,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AutoRunError::AlreadyRunning);
        }

        let bot = Arc::clone(&self.bot);
        let state = Arc::clone(&self.state);
        let broadcaster = Arc::clone(&self.broadcaster);
        let running = Arc::clone(&self.running);
        let cfg = self.config.autorun_config();

        self.handle = Some(tokio::task::spawn(async move {
            while running.load(Ordering::SeqCst) {
                run_tick(&bot, &state, &cfg);

                let achieved = {
                    let s = state.lock().unwrap();
                    valuation::count_achieved_now(&s.effect_list, &s.targets)
                };
                broadcaster.broadcast(status_payload(&state, achieved, &cfg));

                if achieved >= cfg.end_count || { state.lock().unwrap().ended } {
                    info!(achieved, end_count = cfg.end_count, "autorun goal reached, stopping");
                    running.store(false, Ordering::SeqCst);
                    break;
                }

                tokio::time::sleep(Duration::from_millis(cfg.op_interval_ms)).await;
            }
        }));

        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Aborts the run immediately, calling `giveup` best-effort.
    pub fn abort(&mut self, reason: &str) {
        warn!(reason, "aborting autorun");
        self.stop();
        let _ = self.bot.giveup();
    }

    /// Runs a single tick synchronously, for tests and single-step control.
    pub fn tick(&self) {
        let cfg = self.config.autorun_config();
        run_tick(&self.bot, &self.state, &cfg);
    }
}

fn status_payload(
    state: &std::sync::Mutex<GameState>,
    achieved: i64,
    cfg: &liqi_proxy::AutorunConfig,
) -> serde_json::Value {
    let s = state.lock().unwrap();
    json!({
        "stage": s.stage,
        "coin": s.coin,
        "level": s.level,
        "achieved": achieved,
        "end_count": cfg.end_count,
        "ended": s.ended,
    })
}

/// One pass of the stage dispatch table. Reads a snapshot of `GameState`
/// up front; every branch issues at most one RPC so the snapshot can't go
/// stale mid-decision.
fn run_tick<H: InjectHost>(
    bot: &PacketBot<H>,
    state: &std::sync::Mutex<GameState>,
    cfg: &liqi_proxy::AutorunConfig,
) {
    let snapshot = {
        let mut s = state.lock().unwrap();
        if s.targets != cfg.targets {
            s.targets = cfg.targets.clone();
        }
        s.clone()
    };
    let Some(stage) = snapshot.stage else {
        debug!("no stage yet, starting game");
        let (ok, reason, _) = bot.start_game();
        if !ok {
            warn!(reason, "start_game failed");
        }
        return;
    };

    match stage {
        Stage::FreeEffect => handle_free_effect(bot, &snapshot),
        Stage::LevelConfirm => handle_level_confirm(bot, &snapshot),
        Stage::Change => handle_change(bot, &snapshot),
        Stage::Play => handle_play(bot, &snapshot),
        Stage::Shop => handle_shop(bot, &snapshot, cfg),
        Stage::SelectPack => handle_select_pack(bot, &snapshot, false),
        Stage::RewardPack => handle_select_pack(bot, &snapshot, true),
        Stage::End => {
            debug!("run ended");
        }
    }
}

fn best_candidate(snapshot: &GameState) -> Option<(i64, Valuation)> {
    snapshot
        .candidate_effect_list
        .iter()
        .map(|c| (c.uid, valuation::value_candidate(c, &snapshot.effect_list, &snapshot.targets)))
        .max_by_key(|(uid, v)| {
            let candidate = snapshot.candidate_effect_list.iter().find(|a| a.uid == *uid);
            let tiebreak = candidate.map(valuation::rarity_tiebreaker).unwrap_or(0);
            (v.value, tiebreak)
        })
}

fn handle_free_effect<H: InjectHost>(bot: &PacketBot<H>, snapshot: &GameState) {
    if let Some((uid, _)) = best_candidate(snapshot) {
        let (ok, reason, _) = bot.select_free_effect(uid);
        if !ok {
            warn!(reason, "select_free_effect failed");
        }
    }
}

fn handle_select_pack<H: InjectHost>(bot: &PacketBot<H>, snapshot: &GameState, reward: bool) {
    let Some((uid, valuation)) = best_candidate(snapshot) else {
        let (ok, reason, _) = select_or_skip(bot, reward, 0);
        if !ok {
            warn!(reason, "skip with no candidates failed");
        }
        return;
    };
    if valuation.value <= 0 && snapshot.free_space() <= 0 {
        debug!("no valuable candidate and no free space, skipping pack");
        let (ok, reason, _) = select_or_skip(bot, reward, 0);
        if !ok {
            warn!(reason, "skip failed");
        }
        return;
    }
    if let Some(sell_uid) = valuation.sell_uid {
        let (ok, reason, _) = bot.sell_effect(sell_uid);
        if !ok {
            warn!(reason, "pre-purchase sell failed");
        }
    }
    let (ok, reason, _) = select_or_skip(bot, reward, uid);
    if !ok {
        warn!(reason, "select_effect failed");
    }
}

fn select_or_skip<H: InjectHost>(bot: &PacketBot<H>, reward: bool, uid: i64) -> crate::retry::OpResult {
    if reward {
        bot.select_reward_effect(uid)
    } else {
        bot.select_effect(uid)
    }
}

fn handle_level_confirm<H: InjectHost>(bot: &PacketBot<H>, snapshot: &GameState) {
    let reordered = valuation::apply_ordering_policy(&snapshot.effect_list, OrderingPolicy::PreStart);
    let order: Vec<i64> = reordered.iter().map(|a| a.uid).collect();
    let current: Vec<i64> = snapshot.effect_list.iter().map(|a| a.uid).collect();
    if order != current {
        let (ok, reason, _) = bot.sort_effect(&order);
        if !ok {
            warn!(reason, "pre-start sort failed");
        }
    }
    let (ok, reason, _) = bot.next_level();
    if !ok {
        warn!(reason, "next_level failed");
    }
}

/// The boss debuff that halves the per-turn replacement quota.
const BOSS_DEBUFF_REG: i64 = 901;
const BOSS_DEBUFF_MAX_REPLACEMENTS: i64 = 3;

/// `bd` (the red/white/green honor tiles) and pinzu are worth keeping; every
/// other hand tile is a replacement candidate.
fn is_keep_face(face: &str) -> bool {
    face == "bd" || face.ends_with('p')
}

fn handle_change<H: InjectHost>(bot: &PacketBot<H>, snapshot: &GameState) {
    if snapshot.change_tile_count <= 0 {
        let (ok, reason, _) = bot.op_skip_change();
        if !ok {
            warn!(reason, "op_skip_change failed");
        }
        return;
    }

    let mut quota = snapshot.change_tile_count;
    if snapshot.effect_list.iter().any(|a| a.reg() == BOSS_DEBUFF_REG) {
        quota = quota.min(BOSS_DEBUFF_MAX_REPLACEMENTS);
    }

    let ids: Vec<i64> = snapshot
        .hand_tiles
        .iter()
        .copied()
        .filter(|tid| {
            !snapshot
                .deck_map
                .get(tid)
                .is_some_and(|face| is_keep_face(face))
        })
        .take(quota.max(0) as usize)
        .collect();
    let (ok, reason, _) = bot.op_change(&ids);
    if !ok {
        warn!(reason, "op_change failed");
    }
}

fn handle_play<H: InjectHost>(bot: &PacketBot<H>, snapshot: &GameState) {
    let reordered = valuation::apply_ordering_policy(&snapshot.effect_list, OrderingPolicy::PreWin);
    let order: Vec<i64> = reordered.iter().map(|a| a.uid).collect();
    let current: Vec<i64> = snapshot.effect_list.iter().map(|a| a.uid).collect();
    if order != current {
        let _ = bot.sort_effect(&order);
    }

    match planner::plan(&snapshot.hand_tiles, &snapshot.wall_tiles, &snapshot.deck_map) {
        PlanStatus::WinNow { .. } => {
            let (ok, reason, _) = bot.op_tsumo();
            if !ok {
                warn!(reason, "op_tsumo failed despite winning shape");
            }
        }
        PlanStatus::Plan { discards, .. } => {
            if let Some(&tile) = discards.first() {
                let (ok, reason, _) = bot.discard_by_tile_id(tile);
                if !ok {
                    warn!(reason, "planned discard failed");
                }
            }
        }
        PlanStatus::Impossible => {
            if let Some(&tile) = snapshot.hand_tiles.first() {
                let (ok, reason, _) = bot.discard_by_tile_id(tile);
                if !ok {
                    warn!(reason, "fallback discard failed");
                }
            }
        }
    }
}

fn handle_shop<H: InjectHost>(bot: &PacketBot<H>, snapshot: &GameState, cfg: &liqi_proxy::AutorunConfig) {
    if snapshot.level < cfg.cutoff_level && snapshot.coin <= 0 {
        warn!(level = snapshot.level, "below cutoff with no coin, giving up run");
        let _ = bot.giveup();
        return;
    }

    let affordable_good = snapshot
        .goods
        .iter()
        .filter(|g| !g.sold && g.price <= snapshot.coin)
        .min_by_key(|g| g.price);

    if let Some(good) = affordable_good {
        let (ok, reason, _) = bot.buy_pack(good.id);
        if !ok {
            warn!(reason, "buy_pack failed");
        }
        return;
    }

    if snapshot.coin >= snapshot.refresh_price && snapshot.refresh_price > 0 {
        let (ok, reason, _) = bot.refresh_shop();
        if !ok {
            warn!(reason, "refresh_shop failed");
            return;
        }
        // After each refresh, sell one happiness-badge amulet not needed
        // for any target, to keep shop slots from clogging with filler.
        let sell_order = valuation::sort_sell_priority(&snapshot.effect_list, &snapshot.targets);
        if let Some(happiness) = sell_order.iter().find(|a| {
            a.badge == Some(valuation::BADGE_HAPPINESS)
                && valuation::match_targets_for_amulet(a, &snapshot.targets).is_empty()
        }) {
            let (ok, _, _) = bot.sell_effect(happiness.uid);
            if ok {
                debug!(uid = happiness.uid, "sold surplus happiness-badge amulet");
            }
        }
        return;
    }

    let (ok, reason, _) = bot.end_shopping();
    if !ok {
        warn!(reason, "end_shopping failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liqi_proxy::Addon;
    use liqi_state::{Amulet, Target, TargetKind};
    use liqi_wire::Descriptor;
    use std::sync::Mutex as StdMutex;

    struct NullHost;
    impl InjectHost for NullHost {
        fn inject(&self, _peer_key: &str, _to_client: bool, _bytes: Vec<u8>) -> Result<(), liqi_proxy::error::InjectError> {
            Ok(())
        }
    }

    struct FixedConfig(liqi_proxy::AutorunConfig);
    impl ConfigSource for FixedConfig {
        fn autorun_config(&self) -> liqi_proxy::AutorunConfig {
            self.0.clone()
        }
    }

    struct NullBroadcaster;
    impl StateBroadcaster for NullBroadcaster {
        fn broadcast(&self, _payload: serde_json::Value) {}
    }

    fn bot() -> PacketBot<NullHost> {
        let addon = Arc::new(StdMutex::new(Addon::new(Descriptor::empty(), NullHost)));
        let state = Arc::new(StdMutex::new(GameState::new()));
        PacketBot::new(addon, state)
    }

    #[test]
    fn best_candidate_prefers_target_matching_amulet() {
        let mut state = GameState::new();
        state.targets.push(Target {
            kind: TargetKind::Amulet,
            reg: 230,
            plus: Some(false),
            badge: None,
            value: 5,
        });
        state.candidate_effect_list = vec![
            Amulet { uid: 1, id: 1000, badge: None, volume: 1, store: vec![] },
            Amulet { uid: 2, id: 2300, badge: None, volume: 1, store: vec![] },
        ];
        let (uid, v) = best_candidate(&state).unwrap();
        assert_eq!(uid, 2);
        assert_eq!(v.value, 99);
    }

    #[test]
    fn run_tick_without_stage_starts_the_game() {
        let b = bot();
        let state = b.state();
        let cfg = liqi_proxy::AutorunConfig {
            op_interval_ms: 10,
            end_count: 10,
            cutoff_level: 1,
            ..Default::default()
        };
        run_tick(&b, &state, &cfg);
    }

    #[tokio::test]
    async fn autorunner_stops_once_goal_is_reached() {
        let addon = Arc::new(StdMutex::new(Addon::new(Descriptor::empty(), NullHost)));
        let state = Arc::new(StdMutex::new(GameState::new()));
        {
            let mut s = state.lock().unwrap();
            s.stage = Some(Stage::End);
            s.effect_list.push(Amulet { uid: 1, id: 2300, badge: None, volume: 1, store: vec![] });
        }
        let bot = Arc::new(PacketBot::new(addon, state));
        let cfg = FixedConfig(liqi_proxy::AutorunConfig {
            op_interval_ms: 5,
            end_count: 2,
            cutoff_level: 1,
            targets: vec![Target {
                kind: TargetKind::Amulet,
                reg: 230,
                plus: Some(false),
                badge: None,
                value: 2,
            }],
            ..Default::default()
        });
        let mut runner = AutoRunner::new(bot, cfg, Arc::new(NullBroadcaster));
        runner.start().unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while runner.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("autorunner should stop once the goal is reached");
    }
}
