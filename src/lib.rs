//! m3u-curator: filtered M3U playlist variants and matching XMLTV guides
//!
//! Each configured source is fetched into the import folder, every model of
//! the source produces its own playlist variant in the export folder, and the
//! source's guide is cut down to the channels one model retains and to a
//! rolling time window around "now".

pub mod config;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod proxy;
pub mod utils;
