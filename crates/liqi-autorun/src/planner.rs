//! Deterministic planner for the "pure pinzu suuankou" hand shape: four
//! concealed pinzu triplets plus a pinzu pair, with `bd` tiles usable as
//! any pinzu rank and `0p` treated as a red `5p`.
//!
//! Grounded on
//! `original_source/backend/autorun/util/suannkou_recommender.py`
//! (`plan_pure_pinzu_suu_ankou` / `_v2`), reimplemented with plain
//! `HashMap` counters in place of Python's `Counter`.

use std::collections::{BTreeMap, HashMap, HashSet};

/// Outcome of [`plan`], mirroring the reference's three-way status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStatus {
    /// No reachable pure-pinzu-suuankou shape exists from any number of
    /// future draws.
    Impossible,
    /// The shape is already complete; no discard needed.
    WinNow { target14: Vec<String> },
    /// Reachable after `draws_needed` further draws; `discards[0]` is the
    /// tile to discard this turn.
    Plan {
        draws_needed: usize,
        target14: Vec<String>,
        discards: Vec<i64>,
    },
}

fn face_of(deck_map: &BTreeMap<i64, String>, id: i64) -> String {
    deck_map.get(&id).cloned().unwrap_or_default()
}

fn pin_rank(face: &str) -> Option<u32> {
    if face == "0p" {
        return Some(5);
    }
    let mut chars = face.chars();
    let digit = chars.next()?;
    let suit = chars.next()?;
    if chars.next().is_some() || suit != 'p' {
        return None;
    }
    let d = digit.to_digit(10)?;
    (1..=9).contains(&d).then_some(d)
}

fn normalize_pin(face: &str) -> Option<String> {
    pin_rank(face).map(|r| format!("{r}p"))
}

fn is_pinzu(face: &str) -> bool {
    pin_rank(face).is_some()
}

type Counter = HashMap<String, i64>;

fn count_pin_and_bd(deck_map: &BTreeMap<i64, String>, ids: &[i64]) -> (Counter, i64) {
    let mut pin_counter: Counter = HashMap::new();
    let mut bd_cnt = 0i64;
    for &id in ids {
        let f = face_of(deck_map, id);
        if f == "bd" {
            bd_cnt += 1;
        } else if let Some(norm) = normalize_pin(&f) {
            *pin_counter.entry(norm).or_insert(0) += 1;
        }
    }
    (pin_counter, bd_cnt)
}

fn available_after_k(
    deck_map: &BTreeMap<i64, String>,
    hand_ids: &[i64],
    future_draws: &[i64],
    k: usize,
) -> (Counter, i64) {
    let mut pool = hand_ids.to_vec();
    pool.extend_from_slice(&future_draws[..k.min(future_draws.len())]);
    count_pin_and_bd(deck_map, &pool)
}

const RANKS: [&str; 9] = ["1p", "2p", "3p", "4p", "5p", "6p", "7p", "8p", "9p"];

fn combinations_of_4(ranks: &[&'static str; 9]) -> Vec<[&'static str; 4]> {
    let mut out = Vec::new();
    for a in 0..9 {
        for b in (a + 1)..9 {
            for c in (b + 1)..9 {
                for d in (c + 1)..9 {
                    out.push([ranks[a], ranks[b], ranks[c], ranks[d]]);
                }
            }
        }
    }
    out
}

struct Target {
    need: Counter,
    #[allow(dead_code)]
    bd_used: i64,
}

fn exists_pure_pinzu_suuankou(pin_counter: &Counter, bd_cnt: i64) -> Option<Target> {
    for triplet_ranks in combinations_of_4(&RANKS) {
        for &pair_r in RANKS.iter() {
            let mut need: Counter = HashMap::new();
            for tr in triplet_ranks {
                *need.entry(tr.to_string()).or_insert(0) += 3;
            }
            *need.entry(pair_r.to_string()).or_insert(0) += 2;

            let mut deficit = 0i64;
            for r in RANKS.iter() {
                let have = *pin_counter.get(*r).unwrap_or(&0);
                let req = *need.get(*r).unwrap_or(&0);
                if req > have {
                    deficit += req - have;
                }
            }
            if deficit <= bd_cnt {
                return Some(Target {
                    need,
                    bd_used: deficit,
                });
            }
        }
    }
    None
}

fn still_feasible_after_discard(
    deck_map: &BTreeMap<i64, String>,
    cur_ids: &[i64],
    discard_id: i64,
    future_rest: &[i64],
    nat_need: &Counter,
    total_need: &Counter,
) -> bool {
    let mut tmp: Vec<i64> = cur_ids.to_vec();
    if let Some(pos) = tmp.iter().position(|&x| x == discard_id) {
        tmp.remove(pos);
    }
    tmp.extend_from_slice(future_rest);
    let (pin_c, bd_c) = count_pin_and_bd(deck_map, &tmp);

    for (r, &need) in nat_need {
        if *pin_c.get(r).unwrap_or(&0) < need {
            return false;
        }
    }

    let mut deficit = 0i64;
    for r in RANKS.iter() {
        let have = *pin_c.get(*r).unwrap_or(&0);
        let req = *total_need.get(*r).unwrap_or(&0);
        if have < req {
            deficit += req - have;
        }
    }
    deficit <= bd_c
}

fn discard_score(
    deck_map: &BTreeMap<i64, String>,
    cur_ids: &[i64],
    future_rest: &[i64],
    target_need: &Counter,
    tile_id: i64,
) -> (i32, i32, i64) {
    let f = face_of(deck_map, tile_id);
    if f != "bd" && !is_pinzu(&f) {
        return (0, 0, tile_id);
    }
    if f == "bd" {
        return (3, 0, tile_id);
    }

    let r = normalize_pin(&f).unwrap_or_default();
    let need_total = *target_need.get(&r).unwrap_or(&0);

    let (cur_pin, _) = count_pin_and_bd(deck_map, cur_ids);
    let (fut_pin, _) = count_pin_and_bd(deck_map, future_rest);
    let naturals_total = cur_pin.get(&r).unwrap_or(&0) + fut_pin.get(&r).unwrap_or(&0);

    let over = (naturals_total - need_total).max(0);
    let base = if over > 0 { 1 } else { 2 };
    let is_red = f == "0p";
    let red_bias = if r == "5p" && is_red { 1 } else { 0 };

    (base, red_bias, tile_id)
}

/// Finds the minimal number of future draws after which a pure-pinzu
/// suuankou becomes reachable, and a discard sequence that keeps it
/// reachable at every step.
pub fn plan(hand_tiles: &[i64], future_draws: &[i64], deck_map: &BTreeMap<i64, String>) -> PlanStatus {
    let mut k_found = None;
    let mut target = None;
    for k in 0..=future_draws.len() {
        let (pin_cnt, bd_cnt) = available_after_k(deck_map, hand_tiles, future_draws, k);
        if let Some(t) = exists_pure_pinzu_suuankou(&pin_cnt, bd_cnt) {
            k_found = Some(k);
            target = Some(t);
            break;
        }
    }

    let (Some(k_found), Some(target)) = (k_found, target) else {
        return PlanStatus::Impossible;
    };

    let target14: Vec<String> = RANKS
        .iter()
        .flat_map(|r| {
            let n = *target.need.get(*r).unwrap_or(&0);
            std::iter::repeat((*r).to_string()).take(n as usize)
        })
        .collect();

    if k_found == 0 {
        return PlanStatus::WinNow { target14 };
    }

    let (pin_all, _) = available_after_k(deck_map, hand_tiles, future_draws, k_found);
    let mut need = target.need.clone();
    let mut nat_need: Counter = HashMap::new();
    for r in RANKS.iter() {
        let req = *need.get(*r).unwrap_or(&0);
        let have = *pin_all.get(*r).unwrap_or(&0);
        let use_nat = req.min(have);
        *nat_need.entry((*r).to_string()).or_insert(0) += use_nat;
        need.insert((*r).to_string(), req - use_nat);
    }

    let mut discards = Vec::new();
    let mut cur_ids = hand_tiles.to_vec();

    let distinct = |ids: &[i64]| -> Vec<i64> {
        let set: HashSet<i64> = ids.iter().copied().collect();
        set.into_iter().collect()
    };

    {
        let future_rest = &future_draws[..k_found];
        let mut candidates: Vec<i64> = distinct(&cur_ids)
            .into_iter()
            .filter(|&id| {
                still_feasible_after_discard(
                    deck_map,
                    &cur_ids,
                    id,
                    future_rest,
                    &nat_need,
                    &target.need,
                )
            })
            .collect();
        if candidates.is_empty() {
            candidates = distinct(&cur_ids);
        }
        let best = *candidates
            .iter()
            .min_by_key(|&&id| discard_score(deck_map, &cur_ids, future_rest, &target.need, id))
            .unwrap();
        discards.push(best);
        if let Some(pos) = cur_ids.iter().position(|&x| x == best) {
            cur_ids.remove(pos);
        }
    }

    for j in 0..k_found {
        cur_ids.push(future_draws[j]);
        let future_rest = &future_draws[(j + 1).min(future_draws.len())..k_found];
        if j == k_found - 1 {
            break;
        }
        let mut candidates: Vec<i64> = distinct(&cur_ids)
            .into_iter()
            .filter(|&id| {
                still_feasible_after_discard(
                    deck_map,
                    &cur_ids,
                    id,
                    future_rest,
                    &nat_need,
                    &target.need,
                )
            })
            .collect();
        if candidates.is_empty() {
            candidates = distinct(&cur_ids);
        }
        let best = *candidates
            .iter()
            .min_by_key(|&&id| discard_score(deck_map, &cur_ids, future_rest, &target.need, id))
            .unwrap();
        discards.push(best);
        if let Some(pos) = cur_ids.iter().position(|&x| x == best) {
            cur_ids.remove(pos);
        }
    }

    PlanStatus::Plan {
        draws_needed: k_found,
        target14,
        discards,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck_with_faces(faces: &[(i64, &str)]) -> BTreeMap<i64, String> {
        faces.iter().map(|(id, f)| (*id, f.to_string())).collect()
    }

    #[test]
    fn win_now_when_hand_already_complete() {
        // 1p*3, 3p*3, 5p*3, 7p*3, 9p*2 = 14 tiles
        let mut faces = Vec::new();
        let mut id = 0i64;
        for (rank, count) in [("1p", 3), ("3p", 3), ("5p", 3), ("7p", 3), ("9p", 2)] {
            for _ in 0..count {
                faces.push((id, rank));
                id += 1;
            }
        }
        let deck = deck_with_faces(&faces);
        let hand: Vec<i64> = (0..14).collect();
        let status = plan(&hand, &[], &deck);
        assert!(matches!(status, PlanStatus::WinNow { .. }));
    }

    #[test]
    fn impossible_with_no_pinzu_and_no_draws() {
        let deck = deck_with_faces(&[(0, "1s"), (1, "2s"), (2, "3s")]);
        let hand = vec![0, 1, 2];
        assert_eq!(plan(&hand, &[], &deck), PlanStatus::Impossible);
    }

    #[test]
    fn bd_wildcards_substitute_for_missing_pinzu() {
        let mut faces = Vec::new();
        let mut id = 0i64;
        for (rank, count) in [("1p", 3), ("3p", 3), ("5p", 3), ("7p", 3)] {
            for _ in 0..count {
                faces.push((id, rank));
                id += 1;
            }
        }
        faces.push((id, "bd"));
        faces.push((id + 1, "bd"));
        let deck = deck_with_faces(&faces);
        let hand: Vec<i64> = (0..=(id + 1)).collect();
        let status = plan(&hand, &[], &deck);
        assert!(matches!(status, PlanStatus::WinNow { .. }));
    }
}
