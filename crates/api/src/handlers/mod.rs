//! HTTP handlers.
//!
//! Handlers extract the caller, path and body, call one operation from
//! [`crate::workflows`] and wrap the result in a
//! [`DataResponse`](crate::response::DataResponse). They hold no business
//! rules of their own.

pub mod admin;
pub mod jobs;
pub mod providers;
pub mod visits;
