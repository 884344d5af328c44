use std::collections::{BTreeMap, HashMap};

use crate::round::models::{RoundModel, WinKind};

use super::{Seat, SEATS};

/// Player identity to seat mapping, as produced by the seat map resolver.
pub type SeatMap = HashMap<String, Seat>;

/// Signed point movement of a single round, keyed by seat. Always contains
/// all four seats; untouched seats carry 0.
pub type SeatDelta = BTreeMap<Seat, i32>;

/// Aggregate per-seat totals derived by replaying a ledger.
pub type SeatTotals = BTreeMap<Seat, i32>;

fn zeroed_seats() -> BTreeMap<Seat, i32> {
    SEATS.iter().map(|&seat| (seat, 0)).collect()
}

/// Converts one scoring event into signed point deltas per seat.
///
/// Every delta sums to exactly zero across the four seats. Seats, not
/// occupants, are the participants of a split: a plain self-draw charges all
/// three non-winner seats whether or not someone currently sits there, so the
/// replay stays zero-sum regardless of occupancy churn.
///
/// A round whose winner (or required loser) cannot be resolved through the
/// seat map yields an all-zero delta; the resolver's backfill makes this
/// unreachable for any ledger it has seen.
pub fn compute_round_delta(round: &RoundModel, seat_map: &SeatMap) -> SeatDelta {
    let mut delta = zeroed_seats();

    let Some(&winner_seat) = seat_map.get(&round.winner_id) else {
        return delta;
    };
    let loser_seat = round
        .loser_id
        .as_ref()
        .and_then(|id| seat_map.get(id))
        .copied();
    let half = round.base_points / 2;

    match round.win_kind {
        WinKind::DirectHit => {
            let Some(loser_seat) = loser_seat else {
                return delta;
            };
            if loser_seat == winner_seat {
                return delta;
            }
            delta.insert(winner_seat, round.base_points);
            delta.insert(loser_seat, -round.base_points);
        }
        WinKind::SelfDraw => {
            for &seat in &SEATS {
                let points = if seat == winner_seat { 3 * half } else { -half };
                delta.insert(seat, points);
            }
        }
        WinKind::SelfDrawResponsibility => {
            let Some(responsible_seat) = loser_seat else {
                return delta;
            };
            if responsible_seat == winner_seat {
                return delta;
            }
            delta.insert(winner_seat, 3 * half);
            delta.insert(responsible_seat, -3 * half);
        }
    }

    delta
}

/// Replays a full ledger against a seat map into per-seat totals.
///
/// This is a pure fold over [`compute_round_delta`] in ledger creation order,
/// all four seats seeded at 0. It is the single source of truth for current
/// scores, historical views and final standings; persisted running counters
/// are only a cache of what this function produces.
pub fn compute_seat_totals(rounds: &[RoundModel], seat_map: &SeatMap) -> SeatTotals {
    let mut totals = zeroed_seats();
    for round in rounds {
        for (seat, points) in compute_round_delta(round, seat_map) {
            *totals.entry(seat).or_insert(0) += points;
        }
    }
    totals
}
