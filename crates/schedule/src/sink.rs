use async_trait::async_trait;

/// Outbound delivery capability for one rendered digest.
///
/// Implementations send chunks in order, stop at the first failed chunk, and
/// report one failure for the whole digest.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, chunks: &[String]) -> anyhow::Result<()>;
}
