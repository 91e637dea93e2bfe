//! Evidence research: concurrent search fan-out, relevance filtering and
//! background top-up of a chapter's evidence pool.

use serde::{Deserialize, Serialize};

mod background;
mod fanout;
mod relevance;

pub use background::BackgroundResearch;
pub use fanout::{ResearchFanout, ResearchOutcome};
pub use relevance::{keywords, RelevanceFilter};

/// One search query and the theme it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchQuery {
    pub scope: String,
    pub text: String,
}

impl ResearchQuery {
    pub fn new(scope: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            text: text.into(),
        }
    }
}
