//! Generation backend trait.

use super::request::GenerationRequest;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// A stream of generated text fragments.
///
/// Ends normally when the backend finishes. A cancelled stream may end early
/// or yield `DrafterError::StreamAborted`.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// A remote language model that streams tokens for a chat request.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Starts a streaming completion.
    ///
    /// `cancel` is triggered when the user stops generation; implementations
    /// should stop reading from the network as soon as they observe it.
    async fn stream(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<TokenStream>;
}
