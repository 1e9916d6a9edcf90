//! Workspace command handlers
//!
//! Every command that reads the workspace is a [`CommandHandler`] registered
//! in the [`CommandRegistry`] under its wire name, together with the
//! [`AggregationStrategy`](crate::aggregation::AggregationStrategy) used when
//! its results come back from several windows.

mod context;
mod error;
mod precondition;
mod registry;
mod traits;

pub mod builtin;

pub use context::CommandContext;
pub use error::CommandError;
pub use precondition::{PreconditionError, check_workspace};
pub use registry::CommandRegistry;
pub use traits::{CommandHandler, CommandOutput};
