//! Fluent assembly of state machines.
//!
//! Machines are described with [`StateMachineBuilder`] and [`StateEntry`]
//! and validated as a whole when built: every violation is collected and
//! reported together, and an ill-formed machine is never constructed.

mod error;
mod machine;
mod validate;

pub use error::{AssemblyError, BuildError};
pub use machine::{StateEntry, StateMachineBuilder, DEFAULT_LABEL};
