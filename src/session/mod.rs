//! Interactive session: the generation–confirmation–apply loop.

pub mod controller;
pub mod decision;
pub mod progress;

pub use controller::{InteractionController, LoopOutcome, LoopState, SessionOptions};
pub use decision::{DecisionChoice, Operator, OperatorDecision};
pub use progress::{NoopProgress, ProgressSink};
