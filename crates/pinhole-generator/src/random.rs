use crate::Generator;
use pinhole_core::ShortId;
use uuid::Uuid;

/// Random short id generator backed by UUIDv4.
///
/// Ids are the 32 lowercase hex digits of a v4 UUID. The id space is large
/// enough that collisions are not handled.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl UuidGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for UuidGenerator {
    fn generate(&self) -> ShortId {
        ShortId::new(Uuid::new_v4().simple().to_string())
    }
}
