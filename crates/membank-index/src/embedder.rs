//! The embedding provider seam.

use crate::IndexError;
use async_trait::async_trait;

/// An external embedding provider.
///
/// The index is agnostic to which service computes vectors; any
/// provider is wrapped in this trait and selected at construction
/// time. Calls may be network-bound; the engine imposes no timeout.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;

    /// The dimension of vectors this provider produces.
    fn dimension(&self) -> usize;
}
