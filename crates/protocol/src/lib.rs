//! Wire types for the private mobile API.
//!
//! This crate contains the serde-serializable types used to read responses
//! from the closed HTTP service the client impersonates a mobile app
//! against. These types represent the "protocol layer" - the shapes of
//! data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * Tolerant: Unknown payload fields are ignored, known ones defaulted
//! * Stable: Changes only when the observed wire shapes change
//!
//! Higher-level ergonomic APIs are built on top of these types in
//! `ig-session`.

pub mod cookie;
pub mod payload;

pub use cookie::*;
pub use payload::*;
