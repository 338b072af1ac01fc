pub mod epg_filter;
pub mod filter_engine;
pub mod generator;
pub mod rules;

pub use epg_filter::EpgFilter;
pub use filter_engine::FilterEngine;
pub use generator::PlaylistGenerator;
pub use rules::CompiledModel;
