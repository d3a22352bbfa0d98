use async_trait::async_trait;
use curtail_core::analytics::Result;
use curtail_core::{AccessContext, AnalyticsSink, ShortCode};
use tracing::info;

/// Sink that logs each recorded access.
///
/// The default when no external analytics pipeline is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl AnalyticsSink for LogSink {
    async fn record_access(&self, code: &ShortCode, context: &AccessContext) -> Result<()> {
        info!(
            code = %code,
            ip = context.ip_address.as_deref().unwrap_or("-"),
            user_agent = context.user_agent.as_deref().unwrap_or("-"),
            referrer = context.referrer.as_deref().unwrap_or("-"),
            "short url accessed"
        );
        Ok(())
    }
}
