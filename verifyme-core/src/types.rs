//! Message and verification artifact types
//!
//! Mail providers hand bodies over either as a plain string or as an
//! array of parts; both shapes deserialize into [`BodyPart`].

use serde::{Deserialize, Serialize};

/// A message body as delivered by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyPart {
    /// Single body string
    Single(String),
    /// Multi-part body; only the first part is used
    Parts(Vec<String>),
}

impl BodyPart {
    /// The canonical body string, if any
    pub fn first(&self) -> Option<&str> {
        match self {
            BodyPart::Single(s) => Some(s.as_str()),
            BodyPart::Parts(parts) => parts.first().map(|s| s.as_str()),
        }
    }
}

impl From<&str> for BodyPart {
    fn from(s: &str) -> Self {
        BodyPart::Single(s.to_string())
    }
}

impl From<String> for BodyPart {
    fn from(s: String) -> Self {
        BodyPart::Single(s)
    }
}

/// The two optional body representations of one inbound message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// HTML body
    #[serde(default)]
    pub html: Option<BodyPart>,
    /// Plain-text body
    #[serde(default)]
    pub text: Option<BodyPart>,
}

impl EmailMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_html(mut self, html: impl Into<BodyPart>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<BodyPart>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// HTML body after multi-part normalization
    pub fn html_body(&self) -> Option<&str> {
        self.html.as_ref().and_then(BodyPart::first)
    }

    /// Text body after multi-part normalization
    pub fn text_body(&self) -> Option<&str> {
        self.text.as_ref().and_then(BodyPart::first)
    }
}

/// The single classified output extracted from a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum VerificationArtifact {
    /// Numeric one-time code (digits only, 4-8 long)
    Otp { value: String },
    /// Absolute confirmation URL
    Link { value: String },
}

impl VerificationArtifact {
    pub fn otp(value: impl Into<String>) -> Self {
        VerificationArtifact::Otp { value: value.into() }
    }

    pub fn link(value: impl Into<String>) -> Self {
        VerificationArtifact::Link { value: value.into() }
    }

    /// The code or URL
    pub fn value(&self) -> &str {
        match self {
            VerificationArtifact::Otp { value } | VerificationArtifact::Link { value } => value,
        }
    }

    /// Wire tag: `OTP` or `LINK`
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationArtifact::Otp { .. } => "OTP",
            VerificationArtifact::Link { .. } => "LINK",
        }
    }

    pub fn is_otp(&self) -> bool {
        matches!(self, VerificationArtifact::Otp { .. })
    }
}

/// A link under consideration during ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Absolute URL
    pub url: String,
    /// Keyword score (URL hits plus anchor text hits)
    pub score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_wire_shape() {
        let otp = VerificationArtifact::otp("482913");
        let json = serde_json::to_value(&otp).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "OTP", "value": "482913" }));

        let link: VerificationArtifact =
            serde_json::from_str(r#"{"type":"LINK","value":"https://ex.com/confirm"}"#).unwrap();
        assert_eq!(link, VerificationArtifact::link("https://ex.com/confirm"));
        assert_eq!(link.kind(), "LINK");
    }

    #[test]
    fn test_multipart_body_uses_first_part() {
        let message: EmailMessage = serde_json::from_str(
            r#"{"html": ["<p>first</p>", "<p>second</p>"], "text": "plain"}"#,
        )
        .unwrap();
        assert_eq!(message.html_body(), Some("<p>first</p>"));
        assert_eq!(message.text_body(), Some("plain"));
    }

    #[test]
    fn test_missing_and_empty_bodies() {
        let message: EmailMessage = serde_json::from_str(r#"{"html": [], "text": null}"#).unwrap();
        assert_eq!(message.html_body(), None);
        assert_eq!(message.text_body(), None);

        let message: EmailMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(message, EmailMessage::new());
    }
}
