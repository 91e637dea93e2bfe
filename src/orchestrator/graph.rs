//! Chapter dependency graph and tier computation.

use crate::error::ApiError;
use crate::orchestrator::ChapterState;
use crate::writing::DocumentPlan;
use std::collections::{BTreeMap, BTreeSet};

/// One chapter in the active graph. Removed once its content is persisted.
#[derive(Debug, Clone)]
pub struct ChapterNode {
    pub chapter_number: u32,
    pub depends_on: Vec<u32>,
    pub produced_content: Option<String>,
    pub quality_passed: Option<bool>,
    pub state: ChapterState,
}

/// Group chapters into tiers: every chapter's dependencies lie in earlier
/// tiers. Chapters within a tier are sorted.
pub fn compute_tiers(dependencies: &BTreeMap<u32, Vec<u32>>) -> Result<Vec<Vec<u32>>, ApiError> {
    for (chapter, deps) in dependencies {
        if let Some(dependency) = deps.iter().find(|d| !dependencies.contains_key(*d)) {
            return Err(ApiError::UnknownDependency {
                chapter: *chapter,
                dependency: *dependency,
            });
        }
    }

    let mut remaining: BTreeMap<u32, BTreeSet<u32>> = dependencies
        .iter()
        .map(|(chapter, deps)| (*chapter, deps.iter().copied().collect()))
        .collect();
    let mut tiers = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<u32> = remaining
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(chapter, _)| *chapter)
            .collect();
        if ready.is_empty() {
            return Err(ApiError::DependencyCycle(remaining.keys().copied().collect()));
        }
        for chapter in &ready {
            remaining.remove(chapter);
        }
        for deps in remaining.values_mut() {
            for chapter in &ready {
                deps.remove(chapter);
            }
        }
        tiers.push(ready);
    }

    Ok(tiers)
}

#[derive(Debug, Clone)]
pub struct ChapterGraph {
    nodes: BTreeMap<u32, ChapterNode>,
    tiers: Vec<Vec<u32>>,
}

impl ChapterGraph {
    pub fn from_plan(plan: &DocumentPlan) -> Result<Self, ApiError> {
        let dependencies: BTreeMap<u32, Vec<u32>> = plan
            .chapters
            .iter()
            .map(|c| (c.number, c.depends_on.clone()))
            .collect();
        let tiers = compute_tiers(&dependencies)?;
        let nodes = dependencies
            .into_iter()
            .map(|(chapter_number, depends_on)| {
                (
                    chapter_number,
                    ChapterNode {
                        chapter_number,
                        depends_on,
                        produced_content: None,
                        quality_passed: None,
                        state: ChapterState::Scheduled,
                    },
                )
            })
            .collect();
        Ok(Self { nodes, tiers })
    }

    pub fn tiers(&self) -> &[Vec<u32>] {
        &self.tiers
    }

    pub fn node(&self, chapter: u32) -> Option<&ChapterNode> {
        self.nodes.get(&chapter)
    }

    /// Chapters still in the active graph
    pub fn active(&self) -> usize {
        self.nodes.len()
    }

    pub fn transition(&mut self, chapter: u32, state: ChapterState) {
        if let Some(node) = self.nodes.get_mut(&chapter) {
            node.state = state;
        }
    }

    pub fn record(&mut self, chapter: u32, content: String, quality_passed: bool) {
        if let Some(node) = self.nodes.get_mut(&chapter) {
            node.produced_content = Some(content);
            node.quality_passed = Some(quality_passed);
        }
    }

    /// Remove a persisted chapter from the active graph.
    pub fn retire(&mut self, chapter: u32) -> Option<ChapterNode> {
        self.nodes.remove(&chapter)
    }
}
