pub mod style;
pub mod track;

pub use style::*;
pub use track::*;
