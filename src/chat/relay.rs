use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::error::{ChatError, ChatResult};

use super::participant::ParticipantId;
use super::session::RoomId;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub room_id: RoomId,
    pub text: Option<String>,
    pub image_ref: Option<String>,
}

/// A message as delivered to both room members.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub room_id: RoomId,
    pub sender_id: ParticipantId,
    pub sender_name: String,
    pub text: Option<String>,
    pub image_ref: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct ContentPolicy {
    pub max_text_chars: usize,
    pub max_image_bytes: usize,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self {
            max_text_chars: 1000,
            max_image_bytes: 2 * 1024 * 1024,
        }
    }
}

const IMAGE_MIME: [&str; 4] = ["png", "jpeg", "gif", "webp"];

impl ContentPolicy {
    /// Normalizes a message body. Blank text counts as no text, but a message
    /// needs at least one of text or image.
    pub fn check(&self, text: Option<String>, image_ref: Option<String>) -> ChatResult<(Option<String>, Option<String>)> {
        let text = text
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());
        let image_ref = image_ref
            .map(|i| i.trim().to_owned())
            .filter(|i| !i.is_empty());

        if text.is_none() && image_ref.is_none() {
            return Err(ChatError::InvalidContent("empty message".to_owned()));
        }

        if let Some(text) = &text {
            self.check_text(text)?;
        }
        if let Some(image_ref) = &image_ref {
            self.check_image(image_ref)?;
        }

        Ok((text, image_ref))
    }

    fn check_text(&self, text: &str) -> ChatResult<()> {
        let chars = text.chars().count();
        if chars > self.max_text_chars {
            return Err(ChatError::InvalidContent(format!(
                "message is {chars} characters, limit is {}",
                self.max_text_chars
            )));
        }
        if text.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
            return Err(ChatError::InvalidContent("control characters in message".to_owned()));
        }
        Ok(())
    }

    fn check_image(&self, image_ref: &str) -> ChatResult<()> {
        if image_ref.len() > self.max_image_bytes {
            return Err(ChatError::InvalidContent(format!(
                "image is {} bytes, limit is {}",
                image_ref.len(),
                self.max_image_bytes
            )));
        }
        // the url parser silently drops tabs and newlines
        if image_ref.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ChatError::InvalidContent("malformed image reference".to_owned()));
        }

        let url = Url::parse(image_ref)
            .map_err(|e| ChatError::InvalidContent(format!("malformed image reference: {e}")))?;
        match url.scheme() {
            "http" | "https" => {
                if url.host_str().is_none_or(str::is_empty) {
                    return Err(ChatError::InvalidContent("image url has no host".to_owned()));
                }
                Ok(())
            }
            "data" if url.query().is_none() && url.fragment().is_none() => check_image_data(url.path()),
            "data" => Err(ChatError::InvalidContent("malformed image data".to_owned())),
            other => Err(ChatError::InvalidContent(format!("unsupported image scheme {other:?}"))),
        }
    }
}

/// `image/<type>;base64,<payload>` with a payload that actually decodes.
fn check_image_data(body: &str) -> ChatResult<()> {
    let Some((media, payload)) = body.split_once(',') else {
        return Err(ChatError::InvalidContent("malformed image data".to_owned()));
    };
    let Some(mime) = media.strip_prefix("image/").and_then(|m| m.strip_suffix(";base64")) else {
        return Err(ChatError::InvalidContent("image data must be base64 encoded image".to_owned()));
    };
    if !IMAGE_MIME.contains(&mime) {
        return Err(ChatError::InvalidContent(format!("unsupported image type {mime:?}")));
    }

    match STANDARD.decode(payload) {
        Ok(bytes) if !bytes.is_empty() => Ok(()),
        Ok(_) => Err(ChatError::InvalidContent("empty image data".to_owned())),
        Err(e) => Err(ChatError::InvalidContent(format!("malformed image data: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: Option<&str>, image: Option<&str>) -> ChatResult<(Option<String>, Option<String>)> {
        ContentPolicy::default().check(text.map(str::to_owned), image.map(str::to_owned))
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(check(Some("  hi there "), None).unwrap(), (Some("hi there".to_owned()), None));
    }

    #[test]
    fn empty_message_is_rejected() {
        assert!(matches!(check(Some("   "), None), Err(ChatError::InvalidContent(_))));
        assert!(matches!(check(None, Some("")), Err(ChatError::InvalidContent(_))));
    }

    #[test]
    fn long_text_is_rejected() {
        let long = "x".repeat(1001);
        assert!(check(Some(&long), None).is_err());
        let fits = "x".repeat(1000);
        assert!(check(Some(&fits), None).is_ok());
    }

    #[test]
    fn control_characters_are_rejected() {
        assert!(check(Some("ding\u{7}"), None).is_err());
        assert!(check(Some("two\nlines"), None).is_ok());
    }

    #[test]
    fn image_urls() {
        assert!(check(None, Some("https://example.com/cat.png")).is_ok());
        assert!(check(None, Some("http://example.com")).is_ok());
        assert!(check(None, Some("https://")).is_err());
        assert!(check(None, Some("javascript:alert(1)")).is_err());
        assert!(check(None, Some("https://example.com/a b.png")).is_err());
    }

    #[test]
    fn image_data_refs() {
        assert!(check(Some("look"), Some("data:image/png;base64,iVBORw0KGgo=")).is_ok());
        assert!(check(None, Some("data:image/svg+xml;base64,PHN2Zz4=")).is_err());
        assert!(check(None, Some("data:image/png,rawbytes")).is_err());
        assert!(check(None, Some("data:image/png;base64,<script>")).is_err());
        assert!(check(None, Some("data:image/png;base64,")).is_err());
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for image in [
            "http://<script>alert(1)</script>",
            "https://[::1",
            "https://a:b:c/",
            "ftp://example.com/cat.png",
            "https://example.com/cat\tpng",
        ] {
            assert!(
                matches!(check(None, Some(image)), Err(ChatError::InvalidContent(_))),
                "{image} was accepted"
            );
        }
        assert!(check(None, Some("https://[::1]:8080/cat.png")).is_ok());
    }

    #[test]
    fn undecodable_data_is_rejected() {
        for image in ["data:image/png;base64,A", "data:image/png;base64,==AB=", "data:image/png;base64,QUJD%", "data:image/png;base64,QUJD#x"] {
            assert!(
                matches!(check(None, Some(image)), Err(ChatError::InvalidContent(_))),
                "{image} was accepted"
            );
        }
        assert!(check(None, Some("data:image/gif;base64,R0lGODlh")).is_ok());
    }

    #[test]
    fn oversized_image_is_rejected() {
        let policy = ContentPolicy {
            max_text_chars: 10,
            max_image_bytes: 32,
        };
        let image = format!("data:image/png;base64,{}", "A".repeat(32));
        assert!(policy.check(None, Some(image)).is_err());
    }
}
