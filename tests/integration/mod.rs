//! Integration tests for parallel chapter generation

pub mod support;

mod config_integration;
mod orchestration;
mod quality_gate;
mod write_fanout;
