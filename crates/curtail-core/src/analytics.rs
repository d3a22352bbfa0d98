use crate::error::SinkError;
use crate::event::AccessContext;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, SinkError>;

/// Receives per-access detail after the access has been durably recorded.
///
/// Sinks sit at a fire-and-forget boundary: callers log failures and move
/// on, so implementations should return quickly and must never panic.
#[async_trait]
pub trait AnalyticsSink: Send + Sync + 'static {
    async fn record_access(&self, code: &ShortCode, context: &AccessContext) -> Result<()>;
}
