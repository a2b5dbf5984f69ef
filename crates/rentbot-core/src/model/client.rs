use async_trait::async_trait;

use crate::Result;

use super::types::CompletionRequest;

/// Completion backend used for chat mode and group summaries.
///
/// The OpenAI adapter implements this over HTTP; tests use in-memory fakes.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<String>;
}
