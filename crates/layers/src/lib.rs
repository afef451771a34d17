pub mod ingest;
pub mod layer;
pub mod loader;
pub mod overlay;
pub mod symbology;

pub use ingest::*;
pub use layer::*;
pub use loader::*;
pub use overlay::*;
pub use symbology::*;
