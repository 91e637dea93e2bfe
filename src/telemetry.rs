//! Telemetry domain: progress events, the non-blocking bus, and sinks.

pub mod events;
pub mod routing;
pub mod sinks;

pub use events::{
    ChapterStateData, ProgressEnvelope, ProgressEvent, QualitySummaryData, ResearchSummaryData,
    SectionProgressData,
};
pub use routing::{ProgressBus, ProgressRuntime};
pub use sinks::{JsonLinesSink, MemorySink, ProgressSink, TracingSink};
