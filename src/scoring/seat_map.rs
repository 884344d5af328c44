use std::collections::HashSet;

use crate::round::models::RoundModel;
use crate::session::models::{FinalScores, OccupantModel, VacatedSeatModel};

use super::{SeatMap, SEATS};

/// Derives a stable player-identity to seat mapping from the three
/// overlapping occupancy sources plus the round ledger itself.
///
/// Build order, later sources overriding earlier ones:
/// 1. the final snapshot of a completed session,
/// 2. vacated-seat records,
/// 3. current occupants (a live occupant's seat is authoritative over stale
///    vacated data),
/// 4. backfill from the ledger: identities only ever seen inside round events
///    (data that predates vacancy tracking, long-departed players) are
///    assigned the lowest seat not yet claimed, scanning rounds in creation
///    order, winner before loser.
///
/// Backfill is best-effort reconstruction: when all four seats are already
/// claimed an unknown identity stays unresolved and its rounds replay to
/// zero. Identical inputs always produce an identical map.
pub fn resolve_seat_map(
    final_scores: Option<&FinalScores>,
    vacated: &[VacatedSeatModel],
    occupants: &[OccupantModel],
    rounds: &[RoundModel],
) -> SeatMap {
    let mut seat_map = SeatMap::new();

    if let Some(snapshot) = final_scores {
        for (&seat, entry) in snapshot {
            seat_map.insert(entry.player_id.clone(), seat);
        }
    }

    for record in vacated {
        seat_map.insert(record.player_id.clone(), record.seat);
    }

    for occupant in occupants {
        if occupant.is_spectator {
            continue;
        }
        if let Some(seat) = occupant.seat {
            seat_map.insert(occupant.player_id.clone(), seat);
        }
    }

    for round in rounds {
        let referenced = [Some(&round.winner_id), round.loser_id.as_ref()];
        for player_id in referenced.into_iter().flatten() {
            if seat_map.contains_key(player_id) {
                continue;
            }
            let claimed: HashSet<_> = seat_map.values().copied().collect();
            if let Some(&seat) = SEATS.iter().find(|seat| !claimed.contains(seat)) {
                seat_map.insert(player_id.clone(), seat);
            }
        }
    }

    seat_map
}
