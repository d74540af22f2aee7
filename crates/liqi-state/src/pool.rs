//! Pool ingestion: partitions a freshly-dealt deck into dora/wall/
//! replacement around the current hand, and the draw reducer that advances
//! the wall as tiles are drawn.

use crate::model::GameState;

const DORA_COUNT: usize = 10;
const WALL_COUNT: usize = 36;

/// Rebuilds `deck_map`/`hand_tiles`/`dora_tiles`/`wall_tiles`/
/// `replacement_tiles` from a freshly observed `(tile_id, face)` pool and
/// the current hand. Locked tiles are removed from the wall before the
/// dora/wall/replacement split, matching the reference partition.
pub fn ingest_pool(state: &mut GameState, pool: &[(i64, String)], hand: &[i64]) {
    state.deck_map.clear();
    state.hand_tiles = hand.to_vec();
    state.dora_tiles.clear();
    state.wall_tiles.clear();
    state.replacement_tiles.clear();

    for (id, face) in pool {
        state.deck_map.insert(*id, face.clone());
    }

    let mut remaining: Vec<i64> = pool
        .iter()
        .map(|(id, _)| *id)
        .filter(|id| !hand.contains(id))
        .collect();

    let locked: std::collections::HashSet<i64> = state.locked_tiles.iter().copied().collect();
    remaining.retain(|id| !locked.contains(id));

    let dora_end = DORA_COUNT.min(remaining.len());
    state.dora_tiles = remaining[..dora_end].to_vec();

    let wall_end = (dora_end + WALL_COUNT).min(remaining.len());
    state.wall_tiles = remaining[dora_end..wall_end].to_vec();

    state.replacement_tiles = remaining[wall_end..].to_vec();
}

/// Removes the drawn tile from the head of the wall and appends it to the
/// hand. No-op (besides the hand push) if the wall doesn't have it at the
/// head — still records the draw rather than dropping it silently.
pub fn apply_draw(state: &mut GameState, tile_id: i64) {
    if state.wall_tiles.first() == Some(&tile_id) {
        state.wall_tiles.remove(0);
    } else if let Some(pos) = state.wall_tiles.iter().position(|&t| t == tile_id) {
        state.wall_tiles.remove(pos);
    }
    state.hand_tiles.push(tile_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck_of(n: i64) -> Vec<(i64, String)> {
        (0..n).map(|i| (i, "1p".to_string())).collect()
    }

    #[test]
    fn partitions_deck_respecting_hand_and_locked_tiles() {
        let mut state = GameState::new();
        let deck = deck_of(60);
        let hand: Vec<i64> = (0..13).collect();
        state.locked_tiles = vec![20, 21];

        ingest_pool(&mut state, &deck, &hand);

        assert_eq!(state.deck_map.len(), 60);
        assert_eq!(state.hand_tiles.len(), 13);
        assert_eq!(state.dora_tiles.len(), 10);
        assert_eq!(state.wall_tiles.len(), 34);
        assert_eq!(state.replacement_tiles.len(), 60 - 13 - 10 - 34 - 2);

        let mut seen: Vec<i64> = state
            .hand_tiles
            .iter()
            .chain(state.dora_tiles.iter())
            .chain(state.wall_tiles.iter())
            .chain(state.replacement_tiles.iter())
            .chain(state.locked_tiles.iter())
            .copied()
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 60);
    }

    #[test]
    fn draw_moves_head_of_wall_into_hand() {
        let mut state = GameState::new();
        state.wall_tiles = vec![5, 6, 7];
        apply_draw(&mut state, 5);
        assert_eq!(state.wall_tiles, vec![6, 7]);
        assert_eq!(state.hand_tiles, vec![5]);
    }
}
