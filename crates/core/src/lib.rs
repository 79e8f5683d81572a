//! Domain logic for the home-services job lifecycle.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! repository layer, the API server and any future tooling. Everything here
//! is pure: no I/O, no clock reads (callers pass `now`).

#[macro_use]
mod text_enum;

pub mod catalogue;
pub mod dispatch;
pub mod error;
pub mod evidence;
pub mod job_status;
pub mod money;
pub mod policy;
pub mod pricing;
pub mod roles;
pub mod settlement;
pub mod timer;
pub mod types;
pub mod visit;
