//! Event routing: the producer-side bus and the single dispatcher task.

pub mod bus;
pub mod ingestor;

pub use bus::ProgressBus;
pub use ingestor::ProgressRuntime;
