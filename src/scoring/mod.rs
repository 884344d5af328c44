// Pure scoring primitives: the fan-points table, the seat map resolver and
// the replay engine. Nothing in this module performs I/O; everything is a
// deterministic function of its inputs so the same ledger always reconciles
// to the same totals.

pub mod fan_table;
pub mod replay;
pub mod seat_map;

pub use fan_table::{points_for_fan, MAX_FAN};
pub use replay::{compute_round_delta, compute_seat_totals, SeatDelta, SeatMap, SeatTotals};
pub use seat_map::resolve_seat_map;

/// A seat is one of four fixed positions in a session. Occupancy by player
/// identity varies over time; seats themselves never do.
pub type Seat = u8;

/// The four seats of a session, in order.
pub const SEATS: [Seat; 4] = [1, 2, 3, 4];
