//! Broadcasting primitives for change notification.
//!
//! Every live component in a session (history view, favorites views) learns
//! about mutations made elsewhere through these channels instead of ambient
//! globals.

pub mod change_bus;
pub mod events;

pub use change_bus::ChangeBus;
pub use events::{FavoritesEvent, FavoritesEventKind, HistoryEvent, StorageEvent};
