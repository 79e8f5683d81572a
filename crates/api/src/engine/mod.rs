//! Job lifecycle engine.
//!
//! - [`state_machine`] -- the only writer of job status: validates a move
//!   against the transition table and appends the audit row in the same
//!   transaction.
//! - [`dispatcher`] -- eligibility and the single-step offer advance.

pub mod dispatcher;
pub mod state_machine;
