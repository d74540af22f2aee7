//! Amulet valuation, goal-achievement accounting, and effect ordering
//! policies. Grounded on
//! `original_source/backend/autorun/runner.py`'s module-level
//! `_candidate_value`, `select_amulet_from_candidates`,
//! `_extract_amulet_signature`, `amulet_matches_target`,
//! `count_achieved_now`, `sort_sell_priority` and
//! `select_items_to_sell_for_purchase`.

use liqi_state::{Amulet, Target, TargetKind};

pub const BADGE_PIONEER: i64 = 600070;
pub const BADGE_HAPPINESS: i64 = 600110;
pub const BADGE_RARE_MULTIPLIER: i64 = 600050;
/// `spec.md` is authoritative over the original Python's `< 3` literal.
pub const NEED_PIONEER_BADGE_COUNT: i64 = 4;

pub const REG_KAVI: i64 = 230;
pub const REG_THEFT: i64 = 229;
const REG_UNSTABLE: i64 = 228;
const REG_HACKER: i64 = 232;

fn rarity_value(reg: i64) -> i64 {
    // The reference derives rarity from the reg id's own magnitude bucket;
    // absent a concrete rarity table, the tens digit of reg stands in as a
    // stable, deterministic tiebreaker.
    (reg / 10) % 10
}

/// `(reg, is_plus, badge)` — the triple targets and owned amulets are
/// compared by.
pub type Signature = (i64, bool, Option<i64>);

pub fn signature_of(amulet: &Amulet) -> Signature {
    (amulet.reg(), amulet.is_plus(), amulet.badge)
}

pub fn amulet_matches_target(amulet: &Amulet, target: &Target) -> bool {
    match target.kind {
        TargetKind::Badge => target.badge == amulet.badge && amulet.badge.is_some(),
        TargetKind::Amulet => {
            if amulet.reg() != target.reg {
                return false;
            }
            if let Some(plus) = target.plus {
                if amulet.is_plus() != plus {
                    return false;
                }
            }
            if let Some(badge) = target.badge {
                return amulet.badge == Some(badge);
            }
            true
        }
    }
}

pub fn match_targets_for_amulet<'a>(amulet: &Amulet, targets: &'a [Target]) -> Vec<&'a Target> {
    targets
        .iter()
        .filter(|t| amulet_matches_target(amulet, t))
        .collect()
}

/// Sum of `value` over every target achieved by at least one owned amulet.
pub fn count_achieved_now(owned: &[Amulet], targets: &[Target]) -> i64 {
    targets
        .iter()
        .filter(|t| owned.iter().any(|a| amulet_matches_target(a, t)))
        .map(|t| t.value)
        .sum()
}

/// `base` reg of a candidate, normalizing plus/non-plus ids.
pub fn base_reg(id: i64) -> i64 {
    id / 10
}

pub fn is_kavi(reg: i64) -> bool {
    reg == REG_KAVI
}

/// "Theft-like": base reg 229, or 228/232 whose first `store` entry is 229.
pub fn is_theft_like(amulet: &Amulet) -> bool {
    let reg = amulet.reg();
    if reg == REG_THEFT {
        return true;
    }
    if reg == REG_UNSTABLE || reg == REG_HACKER {
        return amulet.store.first() == Some(&REG_THEFT);
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingPolicy {
    PreStart,
    PreWin,
}

/// Reorders `amulets` so kavi/theft-like amulets are grouped per the given
/// policy, preserving relative order within each group and leaving
/// everything else untouched otherwise.
pub fn apply_ordering_policy(amulets: &[Amulet], policy: OrderingPolicy) -> Vec<Amulet> {
    let mut kavi = Vec::new();
    let mut theft = Vec::new();
    let mut others = Vec::new();
    for a in amulets {
        if is_kavi(a.reg()) {
            kavi.push(a.clone());
        } else if is_theft_like(a) {
            theft.push(a.clone());
        } else {
            others.push(a.clone());
        }
    }
    let mut out = Vec::with_capacity(amulets.len());
    match policy {
        OrderingPolicy::PreStart => {
            out.extend(kavi);
            out.extend(theft);
        }
        OrderingPolicy::PreWin => {
            out.extend(theft);
            out.extend(kavi);
        }
    }
    out.extend(others);
    out
}

/// A candidate's valuation result: `value` drives the select/skip
/// decision, `sell_uid` optionally names an owned amulet to free space by
/// selling first (used when a target needs a specific badge on an
/// otherwise-owned reg).
pub struct Valuation {
    pub value: i64,
    pub sell_uid: Option<i64>,
}

/// Scores a shop/reward candidate against the user's targets and owned
/// amulets, per `runner.py`'s `select_amulet_from_candidates` branch.
pub fn value_candidate(candidate: &Amulet, owned: &[Amulet], targets: &[Target]) -> Valuation {
    if let Some(badge) = candidate.badge {
        if targets
            .iter()
            .any(|t| t.kind == TargetKind::Badge && t.badge == Some(badge))
        {
            return Valuation {
                value: 99,
                sell_uid: None,
            };
        }
    }

    let reg_targets: Vec<&Target> = targets
        .iter()
        .filter(|t| t.kind == TargetKind::Amulet && t.reg == candidate.reg())
        .collect();
    if let Some(t) = reg_targets.first() {
        if let Some(required_badge) = t.badge {
            if candidate.badge == Some(required_badge) {
                return Valuation {
                    value: 99,
                    sell_uid: None,
                };
            }
            let sell_uid = owned
                .iter()
                .find(|a| a.reg() == candidate.reg() && a.badge != Some(required_badge))
                .map(|a| a.uid);
            return Valuation { value: 0, sell_uid };
        }
        return Valuation {
            value: 99,
            sell_uid: None,
        };
    }

    if candidate.badge == Some(BADGE_PIONEER) {
        let owned_pioneer = owned.iter().filter(|a| a.badge == Some(BADGE_PIONEER)).count() as i64;
        if owned_pioneer < NEED_PIONEER_BADGE_COUNT {
            return Valuation {
                value: 2,
                sell_uid: None,
            };
        }
    }

    if candidate.badge == Some(BADGE_HAPPINESS) {
        return Valuation {
            value: 1,
            sell_uid: None,
        };
    }

    Valuation {
        value: 0,
        sell_uid: None,
    }
}

/// Rarity-based tiebreaker among otherwise-zero-valued candidates: rarity
/// times 3, tripled again for the rare-multiplier badge.
pub fn rarity_tiebreaker(candidate: &Amulet) -> i64 {
    let mut rarity = rarity_value(candidate.reg()) * 3;
    if candidate.badge == Some(BADGE_RARE_MULTIPLIER) {
        rarity *= 3;
    }
    rarity
}

/// Demotes up to 3 non-target-needed "happiness"-badge amulets to the end
/// of the sell-priority order, so they're offered for sale before amulets
/// that still serve a target.
pub fn sort_sell_priority(effect_list: &[Amulet], targets: &[Target]) -> Vec<Amulet> {
    let needed: Vec<&Amulet> = effect_list
        .iter()
        .filter(|a| !match_targets_for_amulet(a, targets).is_empty())
        .collect();
    let mut happiness_demoted: Vec<&Amulet> = effect_list
        .iter()
        .filter(|a| a.badge == Some(BADGE_HAPPINESS) && match_targets_for_amulet(a, targets).is_empty())
        .take(3)
        .collect();
    let mut rest: Vec<&Amulet> = effect_list
        .iter()
        .filter(|a| !needed.contains(a) && !happiness_demoted.contains(a))
        .collect();

    let mut out: Vec<Amulet> = rest.drain(..).map(|a| a.clone()).collect();
    out.extend(happiness_demoted.drain(..).map(|a| a.clone()));
    out
}

/// Picks amulets to sell, cheapest-value-first, until `need_space` volume
/// is freed or `sell_candidates` is exhausted. Returns `None` if even
/// selling everything isn't enough.
pub fn select_items_to_sell_for_purchase(
    free_space: i64,
    need_space: i64,
    sell_candidates: &[Amulet],
) -> Option<Vec<i64>> {
    if free_space >= need_space {
        return Some(Vec::new());
    }
    let mut freed = free_space;
    let mut sold = Vec::new();
    for a in sell_candidates {
        if freed >= need_space {
            break;
        }
        freed += a.volume;
        sold.push(a.uid);
    }
    if freed >= need_space {
        Some(sold)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amulet(uid: i64, id: i64, badge: Option<i64>, volume: i64) -> Amulet {
        Amulet {
            uid,
            id,
            badge,
            volume,
            store: vec![],
        }
    }

    #[test]
    fn badge_match_scores_99() {
        let candidate = amulet(1, 10, Some(600070), 1);
        let targets = vec![Target {
            kind: TargetKind::Badge,
            reg: 0,
            plus: None,
            badge: Some(600070),
            value: 1,
        }];
        let v = value_candidate(&candidate, &[], &targets);
        assert_eq!(v.value, 99);
    }

    #[test]
    fn pioneer_badge_below_threshold_scores_2() {
        let candidate = amulet(1, 10, Some(BADGE_PIONEER), 1);
        let v = value_candidate(&candidate, &[], &[]);
        assert_eq!(v.value, 2);
    }

    #[test]
    fn pioneer_badge_at_threshold_scores_0() {
        let owned: Vec<Amulet> = (0..NEED_PIONEER_BADGE_COUNT)
            .map(|i| amulet(i, 10, Some(BADGE_PIONEER), 1))
            .collect();
        let candidate = amulet(99, 10, Some(BADGE_PIONEER), 1);
        let v = value_candidate(&candidate, &owned, &[]);
        assert_eq!(v.value, 0);
    }

    #[test]
    fn count_achieved_sums_target_values() {
        let owned = vec![amulet(1, 2300, None, 1)];
        let targets = vec![Target {
            kind: TargetKind::Amulet,
            reg: 230,
            plus: Some(false),
            badge: None,
            value: 2,
        }];
        assert_eq!(count_achieved_now(&owned, &targets), 2);
    }

    #[test]
    fn ordering_policy_groups_kavi_and_theft_like() {
        let kavi = amulet(1, 2300, None, 1);
        let theft = amulet(2, 2290, None, 1);
        let other = amulet(3, 1000, None, 1);
        let ordered = apply_ordering_policy(&[other.clone(), theft.clone(), kavi.clone()], OrderingPolicy::PreStart);
        assert_eq!(ordered[0].uid, 1);
        assert_eq!(ordered[1].uid, 2);
        assert_eq!(ordered[2].uid, 3);
    }
}
