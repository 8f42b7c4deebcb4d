//! The step network: a directed acyclic graph of long-lived tasks
//! connected by typed unbounded queues carrying opaque tokens (spec §4.1).

pub mod network;
pub mod stepper;
pub mod token;

pub use network::{Network, NetworkBuilder, QueueId, QueueKind, StepId};
pub use stepper::{walk, StepperHandle};
pub use token::Token;
