//! Mailbox seam between the poller and the mail provider

use async_trait::async_trait;

use crate::{MailError, Message, MessageSummary};

/// Read access to one inbox
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Messages in the inbox, newest first
    async fn list_messages(&self) -> Result<Vec<MessageSummary>, MailError>;

    /// One message with its bodies
    async fn fetch_message(&self, id: &str) -> Result<Message, MailError>;

    /// Address of the inbox, for display
    fn address(&self) -> &str;
}
