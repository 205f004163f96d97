//! Domain model, persistence port, and `Store` implementations backing the
//! dispatch coordination engine. Consumed by the `dispatch-master` binary
//! (SQLite-backed production store), the `dispatch-agent` binary (via the
//! domain models shared on the wire), and both crates' test suites (the
//! in-memory store).

pub mod adapters;
pub mod domain;

pub use domain::error::{DomainError, DomainResult};
pub use domain::models::{
    Agent, AgentState, ErrorLog, ImageFormat, Runner, RunnerType, Screenshot, Task, TaskState,
};
pub use domain::ports::{IdWindow, NewRunner, NewTask, Stats, Store};
