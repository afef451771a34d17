pub mod camera;
pub mod components;
pub mod entity;
pub mod surface;

pub use camera::*;
pub use components::*;
pub use entity::*;
pub use surface::*;
