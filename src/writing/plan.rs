//! Document plan: chapters, their sections, and the style registry that maps
//! each section style to its request builder.

use crate::error::ApiError;
use crate::evidence::EvidenceItem;
use crate::provider::GenerationRequest;
use crate::research::ResearchQuery;
use crate::writing::document::SectionId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStyle {
    Introduction,
    Background,
    LiteratureReview,
    Methodology,
    #[default]
    Analysis,
    Discussion,
    Conclusion,
}

/// Pure request builder for one section style
pub type RequestBuilder = fn(&SectionSpec, &SectionContext, &[EvidenceItem]) -> GenerationRequest;

impl SectionStyle {
    /// Registry lookup, done once when a chapter plan is prepared.
    pub fn builder(self) -> RequestBuilder {
        match self {
            SectionStyle::Introduction => build_introduction,
            SectionStyle::Background => build_background,
            SectionStyle::LiteratureReview => build_literature_review,
            SectionStyle::Methodology => build_methodology,
            SectionStyle::Analysis => build_analysis,
            SectionStyle::Discussion => build_discussion,
            SectionStyle::Conclusion => build_conclusion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub style: SectionStyle,
    #[serde(default = "default_evidence_needed")]
    pub evidence_needed: usize,
    /// Sections in one group share a small concurrency budget
    #[serde(default = "default_writer_group")]
    pub writer_group: String,
}

fn default_evidence_needed() -> usize {
    3
}

fn default_writer_group() -> String {
    "default".to_string()
}

/// Chapter-level inputs shared by every section request
#[derive(Debug, Clone, Default)]
pub struct SectionContext {
    pub topic: String,
    pub chapter: u32,
    pub chapter_title: String,
    pub objectives: Vec<String>,
    /// Digests of accepted chapters this one depends on
    pub predecessors: Vec<(u32, String)>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterPlan {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub depends_on: Vec<u32>,
    #[serde(default)]
    pub queries: Vec<ResearchQuery>,
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    pub objectives: Vec<String>,
}

/// A section with its parsed key and resolved request builder.
#[derive(Clone)]
pub struct PreparedSection {
    pub id: SectionId,
    /// Position within the chapter, drives start staggering
    pub index: usize,
    pub spec: SectionSpec,
    pub builder: RequestBuilder,
}

impl std::fmt::Debug for PreparedSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedSection")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("style", &self.spec.style)
            .finish()
    }
}

impl PreparedSection {
    pub fn build_request(&self, context: &SectionContext, evidence: &[EvidenceItem]) -> GenerationRequest {
        (self.builder)(&self.spec, context, evidence)
    }
}

impl ChapterPlan {
    /// Parse section ids and resolve builders. Rejects duplicate keys.
    pub fn prepare(&self) -> Result<Vec<PreparedSection>, ApiError> {
        let mut seen = HashSet::new();
        self.sections
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let id: SectionId = spec.id.parse()?;
                if !seen.insert(id.clone()) {
                    return Err(ApiError::InvalidPlan(format!(
                        "chapter {} lists section {} twice",
                        self.number, id
                    )));
                }
                Ok(PreparedSection {
                    id,
                    index,
                    builder: spec.style.builder(),
                    spec: spec.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPlan {
    pub topic: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub chapters: Vec<ChapterPlan>,
}

impl DocumentPlan {
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ApiError::InvalidPlan(format!("Failed to read plan {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ApiError> {
        toml::from_str(raw).map_err(|e| ApiError::InvalidPlan(e.to_string()))
    }

    /// Structural checks. The dependency graph is checked separately when
    /// tiers are computed.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.topic.trim().is_empty() {
            return Err(ApiError::InvalidPlan("topic cannot be empty".to_string()));
        }
        if self.chapters.is_empty() {
            return Err(ApiError::InvalidPlan(
                "plan must contain at least one chapter".to_string(),
            ));
        }
        let mut numbers = HashSet::new();
        for chapter in &self.chapters {
            if !numbers.insert(chapter.number) {
                return Err(ApiError::InvalidPlan(format!(
                    "chapter {} is defined twice",
                    chapter.number
                )));
            }
            if chapter.sections.is_empty() {
                return Err(ApiError::InvalidPlan(format!(
                    "chapter {} has no sections",
                    chapter.number
                )));
            }
            chapter.prepare()?;
        }
        Ok(())
    }

    pub fn chapter(&self, number: u32) -> Option<&ChapterPlan> {
        self.chapters.iter().find(|c| c.number == number)
    }
}

fn compose(
    spec: &SectionSpec,
    context: &SectionContext,
    evidence: &[EvidenceItem],
    instruction: &str,
) -> GenerationRequest {
    let mut prompt = format!(
        "Write section {} \"{}\" of chapter {} (\"{}\") on the topic \"{}\".\n{}\n",
        spec.id, spec.title, context.chapter, context.chapter_title, context.topic, instruction
    );
    if !context.objectives.is_empty() {
        prompt.push_str("\nAddress these objectives:\n");
        for objective in &context.objectives {
            prompt.push_str(&format!("- {}\n", objective));
        }
    }
    if !context.predecessors.is_empty() {
        prompt.push_str("\nBuild on the earlier chapters:\n");
        for (number, digest) in &context.predecessors {
            prompt.push_str(&format!("Chapter {}: {}\n", number, digest));
        }
    }
    if evidence.is_empty() {
        prompt.push_str("\nNo sources are available; do not cite any.\n");
    } else {
        prompt.push_str("\nCite only these sources, in (Surname, Year) form:\n");
        for item in evidence {
            let surname = item.lead_surname().unwrap_or_else(|| "Anonymous".to_string());
            prompt.push_str(&format!(
                "- ({}, {}) {}: {}\n",
                surname, item.year, item.title, item.abstract_text
            ));
        }
    }

    GenerationRequest {
        id: format!("ch{:02}-{}", context.chapter, spec.id),
        prompt_payload: prompt,
        system_context: "You are an academic writer. Return only the section body in Markdown, \
                         without headings or request details."
            .to_string(),
        temperature: context.temperature,
        max_tokens: context.max_tokens,
    }
}

fn build_introduction(spec: &SectionSpec, ctx: &SectionContext, ev: &[EvidenceItem]) -> GenerationRequest {
    compose(spec, ctx, ev, "Introduce the problem, its relevance and the structure of the chapter.")
}

fn build_background(spec: &SectionSpec, ctx: &SectionContext, ev: &[EvidenceItem]) -> GenerationRequest {
    compose(spec, ctx, ev, "Provide the context and key definitions a reader needs.")
}

fn build_literature_review(
    spec: &SectionSpec,
    ctx: &SectionContext,
    ev: &[EvidenceItem],
) -> GenerationRequest {
    compose(spec, ctx, ev, "Synthesize the sources, contrasting their findings and noting gaps.")
}

fn build_methodology(spec: &SectionSpec, ctx: &SectionContext, ev: &[EvidenceItem]) -> GenerationRequest {
    compose(spec, ctx, ev, "Describe the approach, data and methods, and justify them.")
}

fn build_analysis(spec: &SectionSpec, ctx: &SectionContext, ev: &[EvidenceItem]) -> GenerationRequest {
    compose(spec, ctx, ev, "Analyze the evidence and state findings precisely.")
}

fn build_discussion(spec: &SectionSpec, ctx: &SectionContext, ev: &[EvidenceItem]) -> GenerationRequest {
    compose(spec, ctx, ev, "Interpret the findings, their implications and limitations.")
}

fn build_conclusion(spec: &SectionSpec, ctx: &SectionContext, ev: &[EvidenceItem]) -> GenerationRequest {
    compose(spec, ctx, ev, "Summarize the chapter and point to what follows.")
}
