//! The TTL sweep.
//!
//! [`Tracer`] resolves the target, opens the sockets and hands them to a [`TraceEngine`],
//! which probes one TTL at a time: a [`RetryController`] decides when to send and resend,
//! the [`ResponseCollector`] matches replies read by the listener task, and a
//! [`LoopDetector`] flags repeated addresses.

pub mod collector;
pub mod engine;
pub mod loops;
pub mod retry;
pub mod sender;

mod tracer;
pub use tracer::*;

pub use collector::ResponseCollector;
pub use engine::{ProbeSession, TraceEngine, TraceState};
pub use loops::LoopDetector;
pub use retry::{HopState, RetryController, RetryPolicy};
pub use sender::{ProbeSender, SocketSender};
