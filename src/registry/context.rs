use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::registry::error::LoginError;

/// Per-call state threaded through a login: cancellation and the span log
/// events are recorded under
///
/// The default context is never cancelled and logs into `Span::none()`, so
/// a caller without a subscriber gets a silent no-op.
#[derive(Debug, Clone)]
pub struct LoginContext {
    cancellation: CancellationToken,
    span: Span,
}

impl Default for LoginContext {
    fn default() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            span: Span::none(),
        }
    }
}

impl LoginContext {
    pub fn new(cancellation: CancellationToken, span: Span) -> Self {
        Self { cancellation, span }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Drive an outbound call, abandoning it as soon as the context is cancelled
    pub async fn run<T, F>(&self, call: F) -> Result<T, LoginError>
    where
        F: Future<Output = Result<T, LoginError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(LoginError::Cancelled),
            result = call => result,
        }
    }
}
