pub mod config;
pub mod controller;
pub mod snapshot;
pub mod state;

pub use config::*;
pub use controller::*;
pub use snapshot::*;
pub use state::*;
