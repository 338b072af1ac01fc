use tracing::warn;

use crate::errors::{AppError, AppResult};
use crate::models::{ModelStats, PlaylistRecord};
use crate::proxy::rules::{CompiledFilter, CompiledModel};

/// Applies one compiled model's filters and transformations to playlist records
pub struct FilterEngine<'a> {
    model: &'a CompiledModel,
}

impl<'a> FilterEngine<'a> {
    pub fn new(model: &'a CompiledModel) -> Self {
        Self { model }
    }

    /// True when any filter matches, or when the model has no filters at all
    pub fn matches(&self, record: &PlaylistRecord) -> bool {
        match &self.model.filters {
            Some(filters) if !filters.is_empty() => {
                filters.iter().any(|f| filter_matches(f, record))
            }
            _ => true,
        }
    }

    /// Rewrite the record in declared rule order, each rule seeing the previous output
    pub fn transform(&self, record: &mut PlaylistRecord) -> AppResult<()> {
        for rule in &self.model.transformations {
            let stream = record.stream.clone();
            let value = record
                .field_mut(&rule.field)
                .ok_or_else(|| AppError::missing_field(&rule.field, stream))?;

            let rewritten = rule
                .regex
                .replace(value.as_str(), rule.replacement.as_str())
                .into_owned();
            *value = rewritten;
        }
        Ok(())
    }

    /// Filter then transform a single record; `Ok(None)` means filtered out
    pub fn process(&self, mut record: PlaylistRecord) -> AppResult<Option<PlaylistRecord>> {
        if !self.matches(&record) {
            return Ok(None);
        }
        self.transform(&mut record)?;
        Ok(Some(record))
    }

    /// Lazily apply the model to a record sequence.
    ///
    /// Records whose transformation fails are logged and skipped; the
    /// counters in `stats` make those skips observable to the caller.
    pub fn apply<'s, I>(
        &'s self,
        records: I,
        stats: &'s mut ModelStats,
    ) -> impl Iterator<Item = PlaylistRecord> + 's
    where
        I: IntoIterator<Item = PlaylistRecord>,
        I::IntoIter: 's,
    {
        records.into_iter().filter_map(move |record| {
            stats.parsed += 1;
            match self.process(record) {
                Ok(Some(record)) => {
                    stats.retained += 1;
                    Some(record)
                }
                Ok(None) => {
                    stats.filtered_out += 1;
                    None
                }
                Err(e) => {
                    stats.transform_failures += 1;
                    warn!("Model '{}': skipping record: {}", self.model.name, e);
                    None
                }
            }
        })
    }
}

fn filter_matches(filter: &CompiledFilter, record: &PlaylistRecord) -> bool {
    record
        .field(&filter.field)
        .map(|value| filter.regex.is_match(value))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterSpec, ModelConfig, TransformationSpec};
    use crate::models::{GROUP_TITLE, TVG_ID, TVG_NAME};

    fn filter(field: &str, pattern: &str) -> FilterSpec {
        FilterSpec {
            field: field.to_string(),
            pattern: pattern.to_string(),
        }
    }

    fn transformation(field: &str, pattern: &str, replacement: &str) -> TransformationSpec {
        TransformationSpec {
            field: field.to_string(),
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }

    fn compile(
        filters: Option<Vec<FilterSpec>>,
        transformations: Option<Vec<TransformationSpec>>,
    ) -> CompiledModel {
        CompiledModel::compile(&ModelConfig {
            name: "test".to_string(),
            filters,
            transformations,
        })
        .unwrap()
    }

    fn espn() -> PlaylistRecord {
        PlaylistRecord::new("http://x")
            .with_label("HD ESPN")
            .with_attribute(GROUP_TITLE, "Sports News")
            .with_attribute(TVG_NAME, "HD ESPN")
    }

    #[test]
    fn test_sports_example() {
        let model = compile(
            Some(vec![filter(GROUP_TITLE, "Sports")]),
            Some(vec![transformation(TVG_NAME, "^HD ", "")]),
        );
        let engine = FilterEngine::new(&model);

        let record = engine.process(espn()).unwrap().unwrap();
        assert_eq!(record.tvg_name(), Some("ESPN"));
        assert_eq!(record.group_title(), Some("Sports News"));
        assert_eq!(record.stream, "http://x");
    }

    #[test]
    fn test_no_filters_keeps_everything() {
        let model = compile(None, None);
        let engine = FilterEngine::new(&model);
        let mut stats = ModelStats::default();

        let records = vec![espn(), PlaylistRecord::new("http://y")];
        let kept: Vec<_> = engine.apply(records.clone(), &mut stats).collect();
        assert_eq!(kept, records);
        assert_eq!(stats.retained, 2);
    }

    #[test]
    fn test_any_filter_suffices() {
        let model = compile(
            Some(vec![filter(GROUP_TITLE, "^movies"), filter(TVG_NAME, "espn")]),
            None,
        );
        assert!(FilterEngine::new(&model).matches(&espn()));
    }

    #[test]
    fn test_filter_on_absent_field_does_not_match() {
        let model = compile(Some(vec![filter(TVG_ID, ".*")]), None);
        assert!(!FilterEngine::new(&model).matches(&espn()));
    }

    #[test]
    fn test_empty_filter_list_keeps_everything() {
        let model = compile(Some(vec![]), None);
        let engine = FilterEngine::new(&model);
        let mut stats = ModelStats::default();

        let records = vec![espn(), PlaylistRecord::new("http://y")];
        let kept: Vec<_> = engine.apply(records.clone(), &mut stats).collect();
        assert_eq!(kept, records);
        assert_eq!(stats.filtered_out, 0);
    }

    #[test]
    fn test_transformations_compose_sequentially() {
        let model = compile(
            None,
            Some(vec![
                transformation(TVG_NAME, "^HD ", "UHD "),
                transformation(TVG_NAME, "^UHD (.*)$", "$1 4K"),
            ]),
        );
        let record = FilterEngine::new(&model).process(espn()).unwrap().unwrap();
        assert_eq!(record.tvg_name(), Some("ESPN 4K"));
    }

    #[test]
    fn test_only_first_match_is_replaced() {
        let model = compile(None, Some(vec![transformation(TVG_NAME, "s", "5")]));
        let record = PlaylistRecord::new("http://x").with_attribute(TVG_NAME, "sports news");
        let record = FilterEngine::new(&model).process(record).unwrap().unwrap();
        assert_eq!(record.tvg_name(), Some("5ports news"));
    }

    #[test]
    fn test_stream_pseudo_field_can_be_rewritten() {
        let model = compile(
            None,
            Some(vec![transformation("stream", "^http://", "https://")]),
        );
        let record = FilterEngine::new(&model).process(espn()).unwrap().unwrap();
        assert_eq!(record.stream, "https://x");
    }

    #[test]
    fn test_missing_field_is_reported_and_skipped() {
        let model = compile(None, Some(vec![transformation("tvg-logo", "a", "b")]));
        let engine = FilterEngine::new(&model);

        assert!(matches!(
            engine.process(espn()),
            Err(AppError::MissingField { .. })
        ));

        let mut stats = ModelStats::default();
        let kept: Vec<_> = engine.apply(vec![espn()], &mut stats).collect();
        assert!(kept.is_empty());
        assert_eq!(stats.transform_failures, 1);
    }

    #[test]
    fn test_filtering_is_deterministic() {
        let model = compile(Some(vec![filter(GROUP_TITLE, "sports")]), None);
        let engine = FilterEngine::new(&model);
        let records = vec![
            espn(),
            PlaylistRecord::new("http://y").with_attribute(GROUP_TITLE, "Kids"),
        ];

        let mut stats = ModelStats::default();
        let first: Vec<_> = engine.apply(records.clone(), &mut stats).collect();
        let second: Vec<_> = engine.apply(records, &mut stats).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }
}
