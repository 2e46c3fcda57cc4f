//! Assembled machines and the loop that runs them.
//!
//! A [`StateMachine`] is built once through
//! [`StateMachineBuilder`](crate::builder::StateMachineBuilder) and is then
//! immutable. An [`Executor`] runs it against a [`Context`](crate::core::Context),
//! one state at a time, until the machine exits with one of its declared
//! outcomes or preemption is requested.

mod error;
mod machine;
mod run;

pub use error::ExecutionError;
pub use machine::{ChildState, StateMachine, StateNode};
pub use run::{Execution, Executor, RunResult};
