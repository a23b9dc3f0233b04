//! Deterministic half of the RentPilot pipeline: query parsing, intent routing, scoring,
//! affordability metrics and verification. Nothing in this crate performs I/O.

pub mod affordability;
pub mod dataset;
pub mod intent;
pub mod policy;
pub mod prefs;
pub mod query;
pub mod scoring;
pub mod tool;
pub mod verify;
