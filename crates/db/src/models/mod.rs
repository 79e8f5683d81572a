//! Row models and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct matching the
//! database row and, where rows are created from caller input, a
//! `Deserialize` create DTO.

pub mod catalogue;
pub mod evidence;
pub mod job;
pub mod job_state_change;
pub mod provider;
pub mod review;
pub mod scope_summary;
pub mod status;
pub mod transaction;
pub mod visit;
