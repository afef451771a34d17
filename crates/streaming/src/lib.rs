pub mod decoder;
pub mod frame;
pub mod protocol;
pub mod transport;

pub use decoder::*;
pub use frame::*;
pub use protocol::*;
pub use transport::*;
