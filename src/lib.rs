//! Folio: Parallel Chapter Generation
//!
//! Produces a multi-chapter document by researching, writing and auditing
//! chapters concurrently. Chapters run in dependency tiers; sections within a
//! chapter are written in parallel against a shared adaptive concurrency
//! limiter and a depleting evidence pool.

pub mod cli;
pub mod config;
pub mod error;
pub mod evidence;
pub mod limiter;
pub mod logging;
pub mod orchestrator;
pub mod persistence;
pub mod provider;
pub mod quality;
pub mod research;
pub mod search;
pub mod telemetry;
pub mod writing;
