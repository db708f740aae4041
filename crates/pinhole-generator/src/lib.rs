pub mod seq;
pub mod random;

pub use seq::SeqGenerator;
pub use random::UuidGenerator;

use pinhole_core::ShortId;

/// Trait for generating short ids.
///
/// Implementations are pure generators that don't interact with storage.
/// Stores assume the ids they receive are unique, so no collision retry is
/// performed anywhere downstream.
pub trait Generator: Send + Sync + 'static {
    /// Generates a new, globally unique short id.
    fn generate(&self) -> ShortId;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    fn generate(&self) -> ShortId {
        (**self).generate()
    }
}
