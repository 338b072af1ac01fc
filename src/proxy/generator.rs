use std::borrow::Borrow;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

use crate::errors::AppResult;
use crate::models::{PlaylistRecord, GROUP_TITLE, TVG_ID, TVG_LOGO, TVG_NAME};
use crate::utils::atomic_file::AtomicFile;

const M3U_HEADER: &str = "#EXTM3U\n";

/// Build the `#EXTINF` line for a record, without the trailing newline
pub fn format_extinf(record: &PlaylistRecord) -> String {
    let mut extinf = String::from("#EXTINF:-1");

    for key in [TVG_ID, TVG_NAME, TVG_LOGO] {
        if let Some(value) = record.non_empty(key) {
            // A quoted name equal to the label is re-derived from it on parse
            if key == TVG_NAME && value.contains('"') && value == record.label {
                continue;
            }
            extinf.push_str(&format!(" {}=\"{}\"", key, value.replace('"', "'")));
        }
    }

    extinf.push_str(&format!(
        " group-title=\"{}\",{}",
        record.group_title().unwrap_or_default(),
        record.label
    ));
    extinf
}

/// Write a complete playlist and flush it; returns the number of entries written
pub fn write_m3u<W, I>(writer: &mut W, records: I) -> AppResult<usize>
where
    W: Write,
    I: IntoIterator,
    I::Item: Borrow<PlaylistRecord>,
{
    writer.write_all(M3U_HEADER.as_bytes())?;

    let mut written = 0;
    for record in records {
        let record: &PlaylistRecord = record.borrow();
        writeln!(writer, "{}", format_extinf(record))?;
        writeln!(writer, "{}", record.stream)?;
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

/// Writes one model's playlist variant to its export path
pub struct PlaylistGenerator {
    output_path: PathBuf,
}

impl PlaylistGenerator {
    pub fn new<P: Into<PathBuf>>(output_path: P) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    /// Stream `records` into a staging file and atomically replace the export
    pub fn generate<I>(&self, records: I) -> AppResult<usize>
    where
        I: IntoIterator,
        I::Item: Borrow<PlaylistRecord>,
    {
        let mut file = AtomicFile::create(&self.output_path)?;
        let written = write_m3u(&mut file, records)?;
        file.commit()?;

        debug!("Wrote {} entries to {}", written, self.output_path.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestor::m3u_parser::M3uParser;

    #[test]
    fn test_extinf_field_order() {
        let record = PlaylistRecord::new("http://x")
            .with_label("ESPN")
            .with_attribute(GROUP_TITLE, "Sports")
            .with_attribute(TVG_LOGO, "http://l/e.png")
            .with_attribute(TVG_NAME, "ESPN")
            .with_attribute(TVG_ID, "espn.us");

        assert_eq!(
            format_extinf(&record),
            r#"#EXTINF:-1 tvg-id="espn.us" tvg-name="ESPN" tvg-logo="http://l/e.png" group-title="Sports",ESPN"#
        );
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let record = PlaylistRecord::new("http://x")
            .with_label("Plain")
            .with_attribute(TVG_ID, "")
            .with_attribute(GROUP_TITLE, "Misc");

        assert_eq!(
            format_extinf(&record),
            r#"#EXTINF:-1 group-title="Misc",Plain"#
        );
    }

    #[test]
    fn test_write_m3u_output() {
        let records = vec![
            PlaylistRecord::new("http://s/a")
                .with_label("A")
                .with_attribute(TVG_NAME, "A")
                .with_attribute(GROUP_TITLE, "News"),
        ];
        let mut out = Vec::new();
        assert_eq!(write_m3u(&mut out, &records).unwrap(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#EXTM3U\n#EXTINF:-1 tvg-name=\"A\" group-title=\"News\",A\nhttp://s/a\n"
        );
    }

    #[test]
    fn test_round_trip_preserves_records() {
        let input = "#EXTM3U\n\
            #EXTINF:-1 group-title=\"Kids\" tvg-logo=\"http://l/k\" tvg-id=\"k.tv\",Kids TV\n\
            http://s/kids?token=1\n\
            #EXTINF:-1,Sky News\n\
            http://s/sky\n";

        let parsed: Vec<_> = M3uParser::new(input.as_bytes()).collect();
        let mut out = Vec::new();
        write_m3u(&mut out, &parsed).unwrap();
        let reparsed: Vec<_> = M3uParser::new(out.as_slice()).collect();

        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_round_trip_with_quoted_label() {
        let input = "#EXTM3U\n#EXTINF:-1,Say \"Hi\" TV\nhttp://s/hi\n";

        let parsed: Vec<_> = M3uParser::new(input.as_bytes()).collect();
        assert_eq!(parsed[0].tvg_name(), Some("Say \"Hi\" TV"));

        let mut out = Vec::new();
        write_m3u(&mut out, &parsed).unwrap();
        assert!(String::from_utf8_lossy(&out)
            .contains("#EXTINF:-1 group-title=\"Say\",Say \"Hi\" TV\n"));

        let reparsed: Vec<_> = M3uParser::new(out.as_slice()).collect();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export").join("tvSports.m3u");
        let generator = PlaylistGenerator::new(&path);

        let records = vec![PlaylistRecord::new("http://s/a")
            .with_label("A")
            .with_attribute(GROUP_TITLE, "A")];
        assert_eq!(generator.generate(records).unwrap(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#EXTM3U\n#EXTINF:-1 group-title=\"A\",A\n"));
    }
}
