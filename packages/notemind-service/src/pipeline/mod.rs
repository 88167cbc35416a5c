//! Multi-stage note pipelines. Each stage issues one model call and parses its reply through
//! [`notemind_domain::stage_output`]; a stage that cannot produce a usable result yields its
//! fallback instead of an error, so both pipelines are total.

pub mod questions;
pub mod stage;
pub mod summary;
