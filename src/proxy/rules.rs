//! Compilation of declarative filter and transformation rules
//!
//! A [`CompiledModel`] is built once per model per run and threaded into the
//! pipeline by reference; the [`ModelConfig`] it was built from is left
//! untouched so several pipelines can compile the same config independently.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::config::{ModelConfig, TransformationSpec};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub field: String,
    pub regex: Regex,
}

#[derive(Debug, Clone)]
pub struct CompiledTransformation {
    pub field: String,
    pub regex: Regex,
    pub replacement: String,
}

#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub name: String,
    /// `None` or an empty list means the model keeps every record
    pub filters: Option<Vec<CompiledFilter>>,
    pub transformations: Vec<CompiledTransformation>,
}

fn compile_pattern(model: &str, field: &str, pattern: &str) -> AppResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::rule_compilation(model, field, pattern, e.to_string()))
}

fn compile_transformation(
    model: &str,
    spec: &TransformationSpec,
) -> AppResult<CompiledTransformation> {
    Ok(CompiledTransformation {
        field: spec.field.clone(),
        regex: compile_pattern(model, &spec.field, &spec.pattern)?,
        replacement: spec.replacement.clone(),
    })
}

impl CompiledModel {
    /// Compile every rule of `model`, failing on the first invalid pattern
    pub fn compile(model: &ModelConfig) -> AppResult<Self> {
        let filters = match &model.filters {
            Some(specs) => Some(
                specs
                    .iter()
                    .map(|spec| {
                        Ok(CompiledFilter {
                            field: spec.field.clone(),
                            regex: compile_pattern(&model.name, &spec.field, &spec.pattern)?,
                        })
                    })
                    .collect::<AppResult<Vec<_>>>()?,
            ),
            None => None,
        };

        let transformations = model
            .transformations
            .iter()
            .flatten()
            .map(|spec| compile_transformation(&model.name, spec))
            .collect::<AppResult<Vec<_>>>()?;

        debug!(
            "Compiled model '{}': {} filter(s), {} transformation(s)",
            model.name,
            filters.as_ref().map_or(0, Vec::len),
            transformations.len()
        );

        Ok(Self {
            name: model.name.clone(),
            filters,
            transformations,
        })
    }
}
