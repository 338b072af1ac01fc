//! Helpers shared by the playlist and guide pipelines
//!
//! - `atomic_file` for temp-file-then-rename output
//! - `time` for XMLTV timestamps and the programme retention window
//! - `xmltv_reader` for pulling channel/programme elements out of a guide

pub mod atomic_file;
pub mod time;
pub mod xmltv_reader;

pub use atomic_file::AtomicFile;
pub use time::{parse_xmltv_timestamp, TimeWindow};
pub use xmltv_reader::{open_xmltv, XmltvElementReader};
