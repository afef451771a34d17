/// Identifier of an entity within its layer.
///
/// Only meaningful together with the layer that owns it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u32);
