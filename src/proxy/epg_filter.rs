//! Channel scoped, time windowed XMLTV filtering
//!
//! The filter pulls elements from an [`XmltvElementReader`] and writes the
//! ones worth keeping straight to the output, so memory use is bounded by the
//! largest single element rather than the size of the guide.

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, error, info};

use crate::errors::AppResult;
use crate::models::{EpgFilterStats, XmltvElement, XmltvElementKind};
use crate::utils::atomic_file::AtomicFile;
use crate::utils::time::TimeWindow;
use crate::utils::xmltv_reader::{open_xmltv, XmltvElementReader};

pub const XMLTV_HEADER: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n<tv>\n";
pub const XMLTV_FOOTER: &str = "</tv>\n";

pub struct EpgFilter {
    channel_ids: HashSet<String>,
    window: TimeWindow,
}

impl EpgFilter {
    /// `channel_ids` is the allow-set; empty ids are never retained
    pub fn new<I, S>(channel_ids: I, window: TimeWindow) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channel_ids = channel_ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| !id.is_empty())
            .collect();
        Self {
            channel_ids,
            window,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_ids.len()
    }

    fn is_allowed(&self, id: Option<&str>) -> bool {
        id.is_some_and(|id| !id.is_empty() && self.channel_ids.contains(id))
    }

    /// Decide whether one element belongs in the output, updating `stats`
    pub fn keep(&self, element: &XmltvElement, stats: &mut EpgFilterStats) -> bool {
        match element.kind {
            XmltvElementKind::Channel => {
                let keep = self.is_allowed(element.attribute("id"));
                if keep {
                    stats.channels_kept += 1;
                } else {
                    stats.channels_dropped += 1;
                }
                keep
            }
            XmltvElementKind::Programme => {
                let keep = self.is_allowed(element.attribute("channel"))
                    && self.in_window(element, stats);
                if keep {
                    stats.programmes_kept += 1;
                } else {
                    stats.programmes_dropped += 1;
                }
                keep
            }
        }
    }

    fn in_window(&self, element: &XmltvElement, stats: &mut EpgFilterStats) -> bool {
        let start = element.attribute("start").unwrap_or_default();
        match self
            .window
            .contains_programme(start, element.attribute("stop"))
        {
            Ok(inside) => inside,
            Err(e) => {
                stats.invalid_timestamps += 1;
                debug!(
                    "Dropping programme for channel {:?}: {}",
                    element.attribute("channel"),
                    e
                );
                false
            }
        }
    }

    /// Stream `input` to `output`, keeping matching elements in source order.
    ///
    /// XML errors stop the pass early; the document is still closed so the
    /// output stays well formed, and `truncated` is set in the returned stats.
    pub fn filter<R: BufRead, W: Write>(
        &self,
        input: R,
        output: &mut W,
    ) -> AppResult<EpgFilterStats> {
        let mut stats = EpgFilterStats::default();
        let mut elements = XmltvElementReader::new(input);

        output.write_all(XMLTV_HEADER.as_bytes())?;
        while let Some(element) = elements.next() {
            match element {
                Ok(element) => {
                    if self.keep(&element, &mut stats) {
                        output.write_all(&element.xml)?;
                        output.write_all(b"\n")?;
                    }
                }
                Err(e) => {
                    error!(
                        "Guide is malformed near byte {}, keeping elements read so far: {}",
                        elements.position(),
                        e
                    );
                    stats.truncated = true;
                }
            }
        }
        output.write_all(XMLTV_FOOTER.as_bytes())?;
        output.flush()?;

        Ok(stats)
    }

    /// Filter the guide at `input` into `output`, replacing it atomically
    pub fn filter_file(&self, input: &Path, output: &Path) -> AppResult<EpgFilterStats> {
        let reader = open_xmltv(input)?;
        let mut file = AtomicFile::create(output)?;
        let stats = self.filter(reader, &mut file)?;
        file.commit()?;

        info!(
            "Guide {}: kept {} channel(s) and {} programme(s), dropped {} channel(s) and {} programme(s)",
            output.display(),
            stats.channels_kept,
            stats.programmes_kept,
            stats.channels_dropped,
            stats.programmes_dropped
        );
        Ok(stats)
    }
}
