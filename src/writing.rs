//! Section writing: plan types, the section worker, and the per-chapter
//! write fan-out with its repair pass.

mod citations;
mod document;
mod fanout;
mod groups;
mod plan;
mod postprocess;
mod progress;
mod worker;

pub use citations::{find_cited, CitationScanner, CitationToken, CitedWork};
pub use document::{DocumentState, SectionId, SectionResult, SectionStatus};
pub use fanout::WriteFanout;
pub use groups::WriterGroups;
pub use plan::{
    ChapterPlan, DocumentPlan, PreparedSection, RequestBuilder, SectionContext, SectionSpec,
    SectionStyle,
};
pub use postprocess::Sanitizer;
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use worker::{SectionOutcome, SectionWorker};
