pub mod track_collection;

pub use track_collection::*;
