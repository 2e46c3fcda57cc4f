//! Taskgraph: hierarchical state machines for long-running robot tasks
//!
//! A task is a machine of named states joined by outcome-driven
//! transitions. States read and write a shared, typed context through
//! declared interfaces; machines nest, remap key names across their
//! boundaries and retry recoverable failures with self-transitions. Leaf
//! work such as arm motion or cavity detection is delegated to external
//! action servers behind the [`action::ActionClient`] trait.
//!
//! # Core Concepts
//!
//! - **Context**: typed key/value store shared by a running machine
//! - **Interface**: outcomes a state may return and the keys it reads and writes
//! - **Transitions**: `(state, outcome)` to the next state or a machine outcome
//! - **Remapping**: child key names translated into the enclosing machine's names
//! - **Executor**: runs one state at a time until the machine exits or is preempted
//!
//! # Example
//!
//! ```rust
//! use taskgraph::builder::StateEntry;
//! use taskgraph::core::{Context, FnState, Interface, Outcome, Pose, Preemption, ValueKind};
//! use taskgraph::executor::{Executor, RunResult, StateMachine};
//!
//! let transform = FnState::new(
//!     Interface::new(["succeeded", "tf_error"])
//!         .input("object_pose", ValueKind::Pose)
//!         .output("object_pose", ValueKind::Pose),
//!     |context| {
//!         let mut pose = context.pose("object_pose")?.clone();
//!         pose.frame_id = "/base_link".to_string();
//!         context.set("object_pose", pose)?;
//!         Ok(Outcome::SUCCEEDED)
//!     },
//! );
//!
//! let machine = StateMachine::builder(["succeeded", "failed"])
//!     .input_output("cavity_pose", ValueKind::Pose)
//!     .state(
//!         StateEntry::leaf("TRANSFORM_POSE_INTO_REFERENCE_FRAME", transform)
//!             .on("succeeded", "succeeded")
//!             .on("tf_error", "failed")
//!             .remap("object_pose", "cavity_pose"),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut context = Context::new().with("cavity_pose", Pose::new("/odom"));
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let execution = runtime
//!     .block_on(Executor::new(Preemption::new()).run(&machine, &mut context))
//!     .unwrap();
//!
//! assert_eq!(execution.result, RunResult::Completed(Outcome::SUCCEEDED));
//! assert_eq!(context.pose("cavity_pose").unwrap().frame_id, "/base_link");
//! assert!(!context.has("object_pose"));
//! ```

pub mod action;
pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod executor;
pub mod placement;
pub mod task;

// Re-export commonly used types
pub use builder::{StateEntry, StateMachineBuilder};
pub use crate::core::{Context, Outcome, Preemption, State};
pub use executor::{Executor, RunResult, StateMachine};
pub use task::{TaskRequest, TaskRunner, TaskStatus};
