//! CLI domain: parse, route and presentation only. Orchestration lives in
//! the library modules; the route table wires configuration to them.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands};
pub use presentation::{format_run_report, format_tiers};
pub use route::RunContext;
