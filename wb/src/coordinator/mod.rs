//! Multi-window coordination
//!
//! The Coordinator is a single task that owns the Secondary registry and the
//! aggregation table. Everything that touches either goes through its
//! request channel, so registrations, contributions, disconnects and
//! timeouts are applied one at a time:
//! - **Route:** decide local / broadcast / targeted forward for a request
//! - **Contribute:** feed one window's payload into an open aggregation
//! - **Deliver:** push a snippet to the browser tab that should receive it
//!
//! [`elect`] decides at startup whether this process is the Primary.

mod config;
mod core;
mod election;
mod handle;
mod messages;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use election::{Election, Role, candidate_ports, elect};
pub use handle::CoordinatorHandle;
pub use messages::{CoordRequest, CoordinatorMetrics, RegistrationError, Route, WindowInfo};
