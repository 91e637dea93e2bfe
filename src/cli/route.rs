//! CLI route: single route table and run context. Dispatches to the
//! orchestrator and presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_run_report, format_tiers};
use crate::config::{ConfigLoader, FolioConfig};
use crate::error::ApiError;
use crate::orchestrator::{ChapterGraph, Orchestrator};
use crate::persistence::FileChapterStore;
use crate::provider::OpenAiCompatibleClient;
use crate::search::CrossrefClient;
use crate::telemetry::{JsonLinesSink, ProgressRuntime, ProgressSink, TracingSink};
use crate::writing::DocumentPlan;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: FolioConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        config.orchestrator.ensure_valid()?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Validate { plan } => {
                let plan = DocumentPlan::load(&self.resolve(plan))?;
                plan.validate()?;
                let graph = ChapterGraph::from_plan(&plan)?;
                Ok(format_tiers(&plan.topic, graph.tiers()))
            }
            Commands::Run {
                plan,
                out,
                strict,
                endpoint,
                model,
                api_key,
                search_endpoint,
                mailto,
                events,
                format,
            } => {
                let plan = DocumentPlan::load(&self.resolve(plan))?;
                let mut config = self.config.orchestrator.clone();
                config.strict |= *strict;

                let generation = OpenAiCompatibleClient::new(
                    model.clone(),
                    api_key.clone(),
                    endpoint.clone(),
                    config.writing.call_timeout(),
                )?;
                let search = CrossrefClient::new(
                    search_endpoint.clone(),
                    mailto.clone(),
                    config.research.search_timeout(),
                )?;
                let store = FileChapterStore::new(self.resolve(out));
                let sink: Arc<dyn ProgressSink> = match events {
                    Some(path) => Arc::new(JsonLinesSink::open(&self.resolve(path))?),
                    None => Arc::new(TracingSink),
                };
                let runtime = ProgressRuntime::start(sink, config.progress_timeout());
                info!(session = runtime.session_id(), topic = %plan.topic, "generation run starting");

                let orchestrator = Orchestrator::new(
                    Arc::new(generation),
                    Arc::new(search),
                    Arc::new(store),
                    config,
                )
                .with_progress(Some(runtime.bus()));
                let result = orchestrator.run(&plan).await;
                drop(orchestrator);
                runtime.shutdown().await;

                format_run_report(&result?, format)
            }
        }
    }
}
