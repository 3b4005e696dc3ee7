//! Outbound SMS collaborator.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait SmsSender: Send + Sync {
    fn name(&self) -> &str;

    /// Send `body` to `recipient` from the `sender` number. Any error,
    /// including a timeout, means the message was not sent.
    async fn send(&self, sender: &str, recipient: &str, body: &str) -> Result<()>;
}
