use crate::config::TriageConfig;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// The loosely-shaped record a mail provider hands over. Providers differ in
/// which fields they populate; everything optional here is carried through
/// extraction as an empty/false state rather than an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEmail {
    pub id: Option<String>,
    /// "Display Name <user@host>" or a bare address.
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub snippet: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub thread_id: Option<String>,
    #[serde(default)]
    pub is_unread: bool,
    #[serde(default)]
    pub has_recent_reply: bool,
    #[serde(default)]
    pub newest_in_thread: bool,
    #[serde(default)]
    pub ical_attached: bool,
    pub calendar_event_id: Option<String>,
}

/// Normalized email metadata, immutable once extracted. Only ever holds the
/// subject and a capped snippet; the full body is never retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMetadata {
    pub id: String,
    pub sender_address: String,
    pub sender_name: Option<String>,
    pub subject: String,
    pub snippet: String,
    pub received_at: DateTime<Utc>,
    pub thread_id: String,
    pub is_unread: bool,
    pub has_recent_reply: bool,
    pub newest_in_thread: bool,
    pub ical_attached: bool,
    pub has_video_link: bool,
    pub calendar_event_id: Option<String>,
}

impl EmailMetadata {
    /// Sender display name when the provider gave one, address otherwise.
    pub fn display_sender(&self) -> &str {
        match &self.sender_name {
            Some(name) if !name.is_empty() => name,
            _ => &self.sender_address,
        }
    }
}

pub struct MetadataExtractor {
    video_domains: Vec<String>,
    snippet_max_chars: usize,
    url_pattern: Regex,
}

impl MetadataExtractor {
    pub fn new(config: &TriageConfig) -> Self {
        MetadataExtractor {
            video_domains: config.video_link_domains.clone(),
            snippet_max_chars: config.snippet_max_chars,
            url_pattern: Regex::new(r#"https?://[^\s<>"']+"#).unwrap(),
        }
    }

    /// Normalize one raw record. Returns `None` only when the record has no
    /// id or no timestamp, the two fields nothing downstream can work
    /// without. Every other absence becomes an empty/false field that will
    /// simply fail whichever filter condition needs it.
    pub fn extract(&self, raw: RawEmail) -> Option<EmailMetadata> {
        let id = raw.id.filter(|id| !id.is_empty())?;
        let received_at = raw.received_at?;

        let (sender_name, sender_address) = split_sender(raw.sender.as_deref().unwrap_or(""));
        let subject = raw.subject.unwrap_or_default().trim().to_string();
        let snippet = truncate_chars(raw.snippet.unwrap_or_default().trim(), self.snippet_max_chars);
        let has_video_link =
            self.contains_video_link(&subject) || self.contains_video_link(&snippet);
        // Providers without thread tracking get one thread per message.
        let thread_id = raw
            .thread_id
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| id.clone());

        Some(EmailMetadata {
            id,
            sender_address,
            sender_name,
            subject,
            snippet,
            received_at,
            thread_id,
            is_unread: raw.is_unread,
            has_recent_reply: raw.has_recent_reply,
            newest_in_thread: raw.newest_in_thread,
            ical_attached: raw.ical_attached,
            has_video_link,
            calendar_event_id: raw.calendar_event_id.filter(|c| !c.is_empty()),
        })
    }

    pub fn extract_batch(&self, raw: Vec<RawEmail>) -> Vec<EmailMetadata> {
        let total = raw.len();
        let extracted: Vec<EmailMetadata> =
            raw.into_iter().filter_map(|r| self.extract(r)).collect();
        if extracted.len() != total {
            log::debug!(
                "{} of {total} raw messages had no id or timestamp and were skipped",
                total - extracted.len()
            );
        }
        extracted
    }

    fn contains_video_link(&self, text: &str) -> bool {
        for m in self.url_pattern.find_iter(text) {
            if let Ok(url) = Url::parse(m.as_str()) {
                if let Some(host) = url.host_str() {
                    if self.video_domains.iter().any(|d| host_matches(host, d)) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Host equality or subdomain-of check:
/// - host_matches("us02web.zoom.us", "zoom.us") -> true
/// - host_matches("notzoom.us", "zoom.us") -> false
fn host_matches(host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// Split "Display Name <user@host>" into name and lowercased address.
fn split_sender(raw: &str) -> (Option<String>, String) {
    if let (Some(start), Some(end)) = (raw.rfind('<'), raw.rfind('>')) {
        if start < end {
            let address = raw[start + 1..end].trim().to_lowercase();
            let name = raw[..start].trim().trim_matches('"').trim();
            let name = if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            };
            return (name, address);
        }
    }
    (None, raw.trim().to_lowercase())
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> MetadataExtractor {
        MetadataExtractor::new(&TriageConfig::default())
    }

    fn raw(id: &str) -> RawEmail {
        RawEmail {
            id: Some(id.to_string()),
            received_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn splits_display_name_and_address() {
        let mut email = raw("m1");
        email.sender = Some(r#""Dana Reyes" <Dana.Reyes@Corp.COM>"#.to_string());
        let meta = extractor().extract(email).unwrap();
        assert_eq!(meta.sender_address, "dana.reyes@corp.com");
        assert_eq!(meta.sender_name.as_deref(), Some("Dana Reyes"));
        assert_eq!(meta.display_sender(), "Dana Reyes");
    }

    #[test]
    fn bare_address_has_no_display_name() {
        let mut email = raw("m1");
        email.sender = Some("hr@corp.com".to_string());
        let meta = extractor().extract(email).unwrap();
        assert_eq!(meta.sender_address, "hr@corp.com");
        assert!(meta.sender_name.is_none());
        assert_eq!(meta.display_sender(), "hr@corp.com");
    }

    #[test]
    fn missing_id_or_timestamp_is_skipped() {
        let no_id = RawEmail {
            received_at: Some(Utc::now()),
            ..Default::default()
        };
        assert!(extractor().extract(no_id).is_none());

        let no_time = RawEmail {
            id: Some("m1".to_string()),
            ..Default::default()
        };
        assert!(extractor().extract(no_time).is_none());
    }

    #[test]
    fn snippet_is_capped() {
        let mut email = raw("m1");
        email.snippet = Some("x".repeat(500));
        let meta = extractor().extract(email).unwrap();
        assert_eq!(meta.snippet.chars().count(), 160);
    }

    #[test]
    fn detects_video_link_on_subdomain() {
        let mut email = raw("m1");
        email.snippet = Some("Join: https://us02web.zoom.us/j/123456".to_string());
        assert!(extractor().extract(email).unwrap().has_video_link);
    }

    #[test]
    fn lookalike_host_is_not_a_video_link() {
        let mut email = raw("m1");
        email.snippet = Some("See https://notzoom.us/promo today".to_string());
        assert!(!extractor().extract(email).unwrap().has_video_link);
    }

    #[test]
    fn thread_id_falls_back_to_message_id() {
        let meta = extractor().extract(raw("m42")).unwrap();
        assert_eq!(meta.thread_id, "m42");
    }
}
