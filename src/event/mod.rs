// Change-notification infrastructure.
//
// Whenever session state mutates (occupancy, lifecycle, ledger) an event is
// emitted on the per-session bus. Payloads are advisory only: subscribers
// must treat any notification as "re-fetch and re-replay", never as an
// incremental patch, or their view will drift from the ledger.

pub use bus::EventBus;
pub use events::SessionEvent;

mod bus;
mod events;
