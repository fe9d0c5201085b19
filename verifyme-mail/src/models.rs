//! mail.tm API payloads
//!
//! The API speaks JSON-LD: collections come wrapped in `hydra:member`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use verifyme_core::{BodyPart, EmailMessage};

/// A JSON-LD collection
#[derive(Debug, Clone, Deserialize)]
pub struct HydraCollection<T> {
    #[serde(rename = "hydra:member", default = "Vec::new")]
    pub members: Vec<T>,
}

/// A mail domain accounts can be created on
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub domain: String,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Domain {
    /// Missing flag counts as active
    pub fn active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }
}

/// Created account
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub address: String,
}

/// Bearer token response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Sender or recipient
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
}

/// Entry of the message list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: Address,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Full message with bodies
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: Address,
    #[serde(default)]
    pub html: Option<BodyPart>,
    #[serde(default)]
    pub text: Option<BodyPart>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// The bodies, as the classifier consumes them
    pub fn email(&self) -> EmailMessage {
        EmailMessage {
            html: self.html.clone(),
            text: self.text.clone(),
        }
    }
}

/// A provisioned disposable inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account ID
    pub id: String,
    /// Full email address
    pub address: String,
    /// Account password (kept so the inbox can be reopened elsewhere)
    pub password: String,
    /// Bearer token for the message endpoints
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_domains() {
        let json = r#"{
            "@context": "/contexts/Domain",
            "hydra:member": [
                {"id": "1", "domain": "mail.example", "isActive": true, "isPrivate": false},
                {"id": "2", "domain": "old.example", "isActive": false}
            ],
            "hydra:totalItems": 2
        }"#;
        let domains: HydraCollection<Domain> = serde_json::from_str(json).unwrap();
        assert_eq!(domains.members.len(), 2);
        assert!(domains.members[0].active());
        assert!(!domains.members[1].active());
    }

    #[test]
    fn test_parse_message_list() {
        let json = r#"{
            "hydra:member": [{
                "id": "64a1f0",
                "from": {"address": "noreply@service.example", "name": "Service"},
                "subject": "Confirm your email",
                "intro": "Your code is 482913",
                "seen": false,
                "createdAt": "2024-03-01T10:15:00+00:00"
            }]
        }"#;
        let list: HydraCollection<MessageSummary> = serde_json::from_str(json).unwrap();
        let msg = &list.members[0];
        assert_eq!(msg.id, "64a1f0");
        assert_eq!(msg.from.address, "noreply@service.example");
        assert!(msg.created_at.is_some());
    }

    #[test]
    fn test_parse_full_message_with_html_parts() {
        let json = r#"{
            "id": "64a1f0",
            "subject": "Welcome",
            "from": {"address": "noreply@service.example"},
            "text": "Your code is 482913",
            "html": ["<p>Your code is <b>482913</b></p>"]
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        let email = msg.email();
        assert_eq!(email.html_body(), Some("<p>Your code is <b>482913</b></p>"));
        assert_eq!(email.text_body(), Some("Your code is 482913"));
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let list: HydraCollection<MessageSummary> = serde_json::from_str("{}").unwrap();
        assert!(list.members.is_empty());
    }
}
