use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ModelConfig, SourceConfig};
use crate::errors::{AppError, AppResult};
use crate::models::{EpgFilterStats, ModelStats};
use crate::proxy::epg_filter::EpgFilter;
use crate::proxy::filter_engine::FilterEngine;
use crate::proxy::generator::PlaylistGenerator;
use crate::proxy::rules::CompiledModel;
use crate::utils::time::TimeWindow;

pub mod fetch;
pub mod m3u_parser;

pub use fetch::{Fetcher, HttpFetcher};
pub use m3u_parser::M3uParser;

/// Result of one model's parse → filter → serialize pipeline
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub model: String,
    pub output: PathBuf,
    pub stats: ModelStats,
    pub written: usize,
    /// Retained tvg-ids, collected only for the model that scopes the guide
    pub channel_ids: Option<HashSet<String>>,
}

/// Parse the imported playlist, apply `model` and write its variant to `output`.
///
/// Blocking; the orchestrator runs one of these per model on the blocking pool.
pub fn run_model_pipeline(
    model: &ModelConfig,
    input: &Path,
    output: &Path,
    collect_ids: bool,
) -> AppResult<ModelOutcome> {
    debug!("> M3U-Process: {}", output.display());

    let compiled = CompiledModel::compile(model)?;
    let engine = FilterEngine::new(&compiled);
    let mut parser = M3uParser::from_path(input)?;
    let generator = PlaylistGenerator::new(output);

    let mut stats = ModelStats::default();
    let mut channel_ids = HashSet::new();
    let written = {
        let records = engine
            .apply(parser.by_ref(), &mut stats)
            .inspect(|record| {
                if collect_ids {
                    if let Some(id) = record.tvg_id() {
                        channel_ids.insert(id.to_string());
                    }
                }
            });
        generator.generate(records)?
    };

    let parse_stats = parser.stats();
    if parse_stats.malformed > 0 || parse_stats.dangling > 0 {
        warn!(
            "{}: skipped {} malformed and {} incomplete playlist entr(ies)",
            output.display(),
            parse_stats.malformed,
            parse_stats.dangling
        );
    }
    debug!(
        "< M3U-Process: {} ({} of {} record(s) retained)",
        output.display(),
        stats.retained,
        stats.parsed
    );

    Ok(ModelOutcome {
        model: model.name.clone(),
        output: output.to_path_buf(),
        stats,
        written,
        channel_ids: collect_ids.then_some(channel_ids),
    })
}

/// What happened to one source during a run
#[derive(Debug, Default)]
pub struct SourceReport {
    pub source: String,
    pub models: Vec<ModelOutcome>,
    pub model_failures: Vec<(String, String)>,
    pub epg: Option<EpgFilterStats>,
    pub epg_failure: Option<String>,
}

impl SourceReport {
    pub fn is_success(&self) -> bool {
        self.model_failures.is_empty() && self.epg_failure.is_none()
    }
}

/// Totals for a whole run across all sources
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<SourceReport>,
    pub failed_sources: Vec<(String, String)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed_sources.is_empty() && self.reports.iter().all(SourceReport::is_success)
    }
}

/// Sequences fetch, model fan-out and guide filtering for each configured source
pub struct SourceProcessor {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    fixed_now: Option<DateTime<Utc>>,
}

impl SourceProcessor {
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            fixed_now: None,
        }
    }

    /// Pin the guide window's reference instant, for reproducible output
    pub fn with_fixed_now(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    /// Process every source in declared order; one source failing never stops the rest
    pub async fn run(&self) -> RunSummary {
        self.run_selected(&[]).await
    }

    /// Like [`run`](Self::run) restricted to the named sources (all when empty)
    pub async fn run_selected(&self, names: &[String]) -> RunSummary {
        let mut summary = RunSummary::default();

        for source in &self.config.sources {
            if !names.is_empty() && !names.contains(&source.name) {
                debug!("Skipping source '{}' (not selected)", source.name);
                continue;
            }

            match self.process_source(source).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    error!("Source '{}' failed: {}", source.name, e);
                    summary.failed_sources.push((source.name.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Run finished: {} source(s) processed, {} failed",
            summary.reports.len(),
            summary.failed_sources.len()
        );
        summary
    }

    pub async fn process_source(&self, source: &SourceConfig) -> AppResult<SourceReport> {
        info!("> Source: {}", source.name);
        let paths = self.config.source_paths(source);

        self.fetcher.fetch(&source.m3u, &paths.m3u_input).await?;

        let epg_model = source
            .epg
            .as_ref()
            .and_then(|_| source.epg_model())
            .map(|m| m.name.clone());

        let mut report = SourceReport {
            source: source.name.clone(),
            ..Default::default()
        };

        let pipelines = source.models.iter().map(|model| {
            let model = model.clone();
            let input = paths.m3u_input.clone();
            let output = paths.m3u_output(&model);
            let collect_ids = epg_model.as_deref() == Some(model.name.as_str());
            let name = model.name.clone();
            let handle = tokio::task::spawn_blocking(move || {
                run_model_pipeline(&model, &input, &output, collect_ids)
            });
            async move { (name, handle.await) }
        });

        for (name, joined) in join_all(pipelines).await {
            let result = joined.map_err(AppError::from).and_then(|r| r);
            match result {
                Ok(outcome) => {
                    info!(
                        "Model '{}{}': wrote {} of {} record(s) to {}",
                        source.name,
                        name,
                        outcome.written,
                        outcome.stats.parsed,
                        outcome.output.display()
                    );
                    report.models.push(outcome);
                }
                Err(e) => {
                    error!("Model '{}{}' failed: {}", source.name, name, e);
                    report.model_failures.push((name, e.to_string()));
                }
            }
        }

        if let (Some(locator), Some(model)) = (&source.epg, &epg_model) {
            match self.process_epg(source, locator, model, &report).await {
                Ok(stats) => report.epg = Some(stats),
                Err(e) => {
                    error!("Guide for '{}' failed: {}", source.name, e);
                    report.epg_failure = Some(e.to_string());
                }
            }
        }

        info!("< Source: {}", source.name);
        Ok(report)
    }

    async fn process_epg(
        &self,
        source: &SourceConfig,
        locator: &str,
        model: &str,
        report: &SourceReport,
    ) -> AppResult<EpgFilterStats> {
        let channel_ids = report
            .models
            .iter()
            .find(|outcome| outcome.model == model)
            .and_then(|outcome| outcome.channel_ids.clone())
            .ok_or_else(|| {
                AppError::configuration(format!(
                    "model '{}' did not complete, guide left unchanged",
                    model
                ))
            })?;

        let paths = self.config.source_paths(source);
        self.fetcher.fetch(locator, &paths.epg_input).await?;

        debug!(
            "> EPG-Process: {} ({} channel id(s))",
            source.name,
            channel_ids.len()
        );
        let window = TimeWindow::new(self.fixed_now.unwrap_or_else(Utc::now));
        let filter = EpgFilter::new(channel_ids, window);
        let stats = tokio::task::spawn_blocking(move || {
            filter.filter_file(&paths.epg_input, &paths.epg_output)
        })
        .await??;
        debug!("< EPG-Process: {}", source.name);

        Ok(stats)
    }
}
