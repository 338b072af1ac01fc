//! Pull-based XMLTV element reader
//!
//! [`XmltvElementReader`] walks an XMLTV document with quick-xml and yields
//! each `channel` and `programme` subtree as an [`XmltvElement`], re-serialized
//! from the original events. Only the element currently being read is held in
//! memory, so guides of any size can be streamed. Everything else (the `tv`
//! root, declarations, comments between elements) is skipped.

use flate2::bufread::MultiGzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::models::{XmltvElement, XmltvElementKind};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a guide file, transparently decompressing gzip content
pub fn open_xmltv<P: AsRef<Path>>(path: P) -> AppResult<Box<dyn BufRead + Send>> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        debug!("{} is gzip compressed", path.as_ref().display());
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

fn collect_attributes(start: &BytesStart<'_>) -> BTreeMap<String, String> {
    start
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            (key, value)
        })
        .collect()
}

/// Copy events from `start` up to its matching end tag into a buffer
fn capture_subtree<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    start: &BytesStart<'_>,
) -> AppResult<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(start.borrow()))?;

    let mut depth = 1usize;
    while depth > 0 {
        buf.clear();
        let event = reader.read_event_into(buf)?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => {
                return Err(AppError::malformed_xml(format!(
                    "document ended inside <{}>",
                    String::from_utf8_lossy(start.name().as_ref())
                )))
            }
            _ => {}
        }
        writer.write_event(event)?;
    }

    Ok(writer.into_inner())
}

pub struct XmltvElementReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    subtree_buf: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> XmltvElementReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            subtree_buf: Vec::new(),
            finished: false,
        }
    }

    /// Byte position in the (decompressed) input, for diagnostics
    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn read_element(&mut self) -> AppResult<Option<XmltvElement>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => {
                    if let Some(kind) = XmltvElementKind::from_tag(start.name().as_ref()) {
                        let attributes = collect_attributes(&start);
                        let xml =
                            capture_subtree(&mut self.reader, &mut self.subtree_buf, &start)?;
                        return Ok(Some(XmltvElement {
                            kind,
                            attributes,
                            xml,
                        }));
                    }
                }
                Event::Empty(empty) => {
                    if let Some(kind) = XmltvElementKind::from_tag(empty.name().as_ref()) {
                        let attributes = collect_attributes(&empty);
                        let mut writer = Writer::new(Vec::new());
                        writer.write_event(Event::Empty(empty))?;
                        return Ok(Some(XmltvElement {
                            kind,
                            attributes,
                            xml: writer.into_inner(),
                        }));
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for XmltvElementReader<R> {
    type Item = AppResult<XmltvElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
