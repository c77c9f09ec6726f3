use crate::classify::EmailType;
use crate::metadata::EmailMetadata;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// One-line display headline for a classified signal. Interpolates the
/// sender display and the subject line only; snippet text never appears
/// here.
pub fn headline_for(kind: EmailType, email: &EmailMetadata) -> String {
    let sender = email.display_sender();
    let subject = if email.subject.is_empty() {
        "(no subject)"
    } else {
        email.subject.as_str()
    };
    match kind {
        EmailType::MeetingInvite => {
            format!("{sender} invited you to a meeting about {subject}")
        }
        EmailType::WorkContext => format!("{sender} followed up on {subject}"),
        EmailType::WorkStandalone => format!("{sender} needs a look at {subject}"),
        EmailType::LifeSignal => format!("Update from {sender}: {subject}"),
        EmailType::LifeFinance => format!("{sender} sent a payment notice: {subject}"),
    }
}

/// Per-thread mute list backing silent correction: once the user dismisses
/// a signal, further signals from that exact thread are suppressed without
/// prompting again. Unmuting is manual unless an expiry is configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MuteList {
    entries: HashMap<String, DateTime<Utc>>,
}

impl MuteList {
    /// Record a mute. Idempotent: repeat calls keep the original mute time
    /// and return false.
    pub fn mute(&mut self, thread_id: &str, now: DateTime<Utc>) -> bool {
        match self.entries.entry(thread_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    pub fn unmute(&mut self, thread_id: &str) -> bool {
        self.entries.remove(thread_id).is_some()
    }

    pub fn is_muted(
        &self,
        thread_id: &str,
        now: DateTime<Utc>,
        expiry_days: Option<u32>,
    ) -> bool {
        let Some(muted_at) = self.entries.get(thread_id) else {
            return false;
        };
        match expiry_days {
            None => true,
            Some(days) => now.signed_duration_since(*muted_at) < Duration::days(i64::from(days)),
        }
    }

    pub fn muted_at(&self, thread_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(thread_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(sender: &str, subject: &str) -> EmailMetadata {
        EmailMetadata {
            id: "m1".to_string(),
            sender_address: sender.to_string(),
            sender_name: None,
            subject: subject.to_string(),
            snippet: "body preview that must never leak".to_string(),
            received_at: Utc::now(),
            thread_id: "t1".to_string(),
            is_unread: true,
            has_recent_reply: false,
            newest_in_thread: false,
            ical_attached: true,
            has_video_link: false,
            calendar_event_id: None,
        }
    }

    #[test]
    fn meeting_invite_headline() {
        let e = email("hr@corp.com", "Q3 Planning Sync");
        assert_eq!(
            headline_for(EmailType::MeetingInvite, &e),
            "hr@corp.com invited you to a meeting about Q3 Planning Sync"
        );
    }

    #[test]
    fn headline_prefers_display_name() {
        let mut e = email("hr@corp.com", "Q3 Planning Sync");
        e.sender_name = Some("Corp HR".to_string());
        assert_eq!(
            headline_for(EmailType::MeetingInvite, &e),
            "Corp HR invited you to a meeting about Q3 Planning Sync"
        );
    }

    #[test]
    fn headline_never_contains_snippet_text() {
        let e = email("a@b.com", "Subject only");
        for kind in [
            EmailType::MeetingInvite,
            EmailType::WorkContext,
            EmailType::WorkStandalone,
            EmailType::LifeSignal,
            EmailType::LifeFinance,
        ] {
            assert!(!headline_for(kind, &e).contains("never leak"));
        }
    }

    #[test]
    fn mute_is_idempotent() {
        let mut mutes = MuteList::default();
        let first = Utc::now();
        assert!(mutes.mute("t1", first));

        let later = first + Duration::hours(5);
        assert!(!mutes.mute("t1", later));
        assert_eq!(mutes.len(), 1);
        assert_eq!(mutes.muted_at("t1"), Some(first));
    }

    #[test]
    fn mute_never_expires_by_default() {
        let mut mutes = MuteList::default();
        let muted_at = Utc::now();
        mutes.mute("t1", muted_at);
        assert!(mutes.is_muted("t1", muted_at + Duration::days(3650), None));
    }

    #[test]
    fn mute_expiry_is_honored_when_configured() {
        let mut mutes = MuteList::default();
        let muted_at = Utc::now();
        mutes.mute("t1", muted_at);
        assert!(mutes.is_muted("t1", muted_at + Duration::days(29), Some(30)));
        assert!(!mutes.is_muted("t1", muted_at + Duration::days(31), Some(30)));
    }

    #[test]
    fn unmute_is_manual() {
        let mut mutes = MuteList::default();
        mutes.mute("t1", Utc::now());
        assert!(mutes.unmute("t1"));
        assert!(!mutes.is_muted("t1", Utc::now(), None));
        assert!(!mutes.unmute("t1"));
    }
}
