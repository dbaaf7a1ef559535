use andro_core::Notifier;
use async_trait::async_trait;

/// Terminal notifications: one line on stdout per notification.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, body: &str, tag: &str) -> anyhow::Result<()> {
        tracing::info!("Notification [{}] {}: {}", tag, title, body);
        println!("🔔 {}: {}", title, body);
        Ok(())
    }
}
