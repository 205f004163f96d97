//! Ports: trait-level seams the adapters (SQLite, in-memory) implement.

mod store;

pub use store::{IdWindow, NewRunner, NewTask, Stats, Store};
