//! Table driven checks of EXTINF extraction and per-model playlist output

use rstest::rstest;
use std::path::Path;

use m3u_curator::config::{FilterSpec, ModelConfig, TransformationSpec};
use m3u_curator::ingestor::m3u_parser::{parse_extinf, M3uParser};
use m3u_curator::ingestor::run_model_pipeline;
use m3u_curator::models::{GROUP_TITLE, TVG_NAME};

const PLAYLIST: &str = "#EXTM3U
#EXTINF:-1 tvg-id=\"espn.us\" tvg-name=\"HD ESPN\" group-title=\"Sports\",HD ESPN
http://streams/espn
#EXTINF:-1 tvg-id=\"cnn.us\" tvg-name=\"CNN\" group-title=\"News\",CNN
http://streams/cnn
#EXTINF:-1 tvg-id=\"bbc1.uk\",BBC One HD
http://streams/bbc1
#EXTINF:-1 tvg-id=\"sky.uk\" tvg-name=\"Sky Sports F1\" group-title=\"UK Sports\",Sky Sports F1
http://streams/skyf1
";

fn filter(field: &str, pattern: &str) -> FilterSpec {
    FilterSpec {
        field: field.to_string(),
        pattern: pattern.to_string(),
    }
}

fn rename(field: &str, pattern: &str, replacement: &str) -> TransformationSpec {
    TransformationSpec {
        field: field.to_string(),
        pattern: pattern.to_string(),
        replacement: replacement.to_string(),
    }
}

fn all_streams() -> Vec<&'static str> {
    vec![
        "http://streams/espn",
        "http://streams/cnn",
        "http://streams/bbc1",
        "http://streams/skyf1",
    ]
}

fn streams(path: &Path) -> Vec<String> {
    M3uParser::from_path(path)
        .unwrap()
        .map(|record| record.stream)
        .collect()
}

#[rstest]
#[case::attributes_and_label(
    "#EXTINF:-1 tvg-id=\"a\" group-title=\"News\",CNN",
    "CNN",
    "News"
)]
#[case::label_only("#EXTINF:-1,BBC One HD", "BBC One HD", "BBC")]
#[case::empty_tvg_name("#EXTINF:-1 tvg-name=\"\" ,Sky", "Sky", "Sky")]
#[case::unicode_word("#EXTINF:0 tvg-name=\"Café Ü\",Café Ü", "Café Ü", "Café")]
#[case::leading_punctuation("#EXTINF:-1,[VIP] Arena", "[VIP] Arena", "")]
fn test_derived_name_and_group(
    #[case] extinf: &str,
    #[case] tvg_name: &str,
    #[case] group_title: &str,
) {
    let playlist = format!("#EXTM3U\n{extinf}\nhttp://streams/x\n");
    let record = M3uParser::new(playlist.as_bytes()).next().unwrap();

    assert_eq!(record.field(TVG_NAME), Some(tvg_name));
    assert_eq!(record.field(GROUP_TITLE), Some(group_title));
}

#[rstest]
#[case::no_duration("#EXTINF:tvg-id=\"a\",A")]
#[case::no_label_separator("#EXTINF:-1 tvg-id=\"a\"")]
#[case::not_extinf("#EXTVLCOPT:http-user-agent=x")]
fn test_unparseable_extinf(#[case] line: &str) {
    assert!(parse_extinf(line).is_err());
}

#[rstest]
#[case::no_filters(None, all_streams())]
#[case::group_match(
    Some(vec![filter("group-title", "sports")]),
    vec!["http://streams/espn", "http://streams/skyf1"]
)]
#[case::any_filter_matches(
    Some(vec![filter("group-title", "^News$"), filter("tvg-id", "\\.uk$")]),
    vec!["http://streams/cnn", "http://streams/bbc1", "http://streams/skyf1"]
)]
#[case::stream_pseudo_field(
    Some(vec![filter("stream", "/bbc")]),
    vec!["http://streams/bbc1"]
)]
#[case::empty_filter_list(Some(vec![]), all_streams())]
fn test_model_selects_streams(
    #[case] filters: Option<Vec<FilterSpec>>,
    #[case] expected: Vec<&str>,
) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tv.m3u");
    let output = dir.path().join("out").join("tvModel.m3u");
    std::fs::write(&input, PLAYLIST).unwrap();

    let model = ModelConfig {
        name: "Model".to_string(),
        filters,
        transformations: None,
    };
    let outcome = run_model_pipeline(&model, &input, &output, false).unwrap();

    assert_eq!(streams(&output), expected);
    assert_eq!(outcome.written, expected.len());
    assert_eq!(outcome.stats.parsed, 4);
    assert!(outcome.channel_ids.is_none());
}

#[rstest]
#[case::strip_prefix(vec![rename("tvg-name", "^HD ", "")], "ESPN")]
#[case::capture_groups(vec![rename("tvg-name", "^(\\w+) (\\w+)$", "$2 $1")], "ESPN HD")]
#[case::chained(
    vec![rename("tvg-name", "^HD ", ""), rename("tvg-name", "espn", "ESPN (US)")],
    "ESPN (US)"
)]
#[case::no_match_keeps_value(vec![rename("tvg-name", "^SD ", "")], "HD ESPN")]
fn test_model_rewrites_names(
    #[case] transformations: Vec<TransformationSpec>,
    #[case] expected_name: &str,
) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tv.m3u");
    let output = dir.path().join("tvEspn.m3u");
    std::fs::write(&input, PLAYLIST).unwrap();

    let model = ModelConfig {
        name: "Espn".to_string(),
        filters: Some(vec![filter("tvg-id", "^espn")]),
        transformations: Some(transformations),
    };
    run_model_pipeline(&model, &input, &output, false).unwrap();

    let record = M3uParser::from_path(&output).unwrap().next().unwrap();
    assert_eq!(record.field(TVG_NAME), Some(expected_name));
    assert_eq!(record.label, "HD ESPN");
}

#[test]
fn test_missing_field_skips_record_only() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tv.m3u");
    let output = dir.path().join("tvLogo.m3u");
    std::fs::write(
        &input,
        "#EXTM3U\n\
         #EXTINF:-1 tvg-id=\"a\" tvg-logo=\"http://logos/a.png\",A\nhttp://streams/a\n\
         #EXTINF:-1 tvg-id=\"b\",B\nhttp://streams/b\n",
    )
    .unwrap();

    let model = ModelConfig {
        name: "Logo".to_string(),
        filters: None,
        transformations: Some(vec![rename("tvg-logo", "^http:", "https:")]),
    };
    let outcome = run_model_pipeline(&model, &input, &output, true).unwrap();

    assert_eq!(outcome.stats.transform_failures, 1);
    assert_eq!(outcome.written, 1);
    assert_eq!(streams(&output), vec!["http://streams/a"]);
    let ids = outcome.channel_ids.unwrap();
    assert!(ids.contains("a") && !ids.contains("b"));

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("tvg-logo=\"https://logos/a.png\""));
}
