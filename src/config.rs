use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Triage pipeline configuration.
///
/// Every tunable lives here with its default enumerated in one place.
/// Keyword table entries are regular expressions matched case-insensitively
/// against subject and snippet text, so plain words work as-is and more
/// specific patterns (`"1:1"`, `r"q[1-4] planning"`) are available when
/// needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriageConfig {
    /// Tier-1 window in hours: anything older is never considered.
    pub window_hours: i64,
    /// Tier-3 sub-window in hours: the "recent" signal condition.
    pub recency_hours: i64,
    /// Minimum number of satisfied signal conditions to pass tier 3.
    pub min_conditions: usize,
    /// Per-sender weight table, keyed by lowercased address.
    pub sender_weights: HashMap<String, f32>,
    /// Weight at or above which a sender counts as trusted.
    pub sender_weight_threshold: f32,
    /// Tier-3 subject/snippet keyword table.
    pub signal_keywords: Vec<String>,
    /// Meeting-title keywords (classifier: work context).
    pub meeting_keywords: Vec<String>,
    /// Work-domain keywords (classifier: standalone work).
    pub work_keywords: Vec<String>,
    /// Life-signal keywords: deliveries, medical, utilities.
    pub life_keywords: Vec<String>,
    /// Finance keywords: invoices, statements, bills.
    pub finance_keywords: Vec<String>,
    /// Hosts whose links mark an email as carrying a video-meeting link.
    /// Subdomains match ("us02web.zoom.us" is covered by "zoom.us").
    pub video_link_domains: Vec<String>,
    /// Snippet length cap, in characters. No more body text than this is
    /// ever retained.
    pub snippet_max_chars: usize,
    /// Days after which a thread mute lapses. Unset means a mute only ever
    /// ends by explicit unmute.
    pub mute_expiry_days: Option<u32>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        TriageConfig {
            window_hours: 72,
            recency_hours: 24,
            min_conditions: 2,
            sender_weights: HashMap::new(),
            sender_weight_threshold: 1.0,
            signal_keywords: vec![
                "deadline".to_string(),
                "urgent".to_string(),
                "action required".to_string(),
                "reminder".to_string(),
                "confirm".to_string(),
                "invoice".to_string(),
                "payment".to_string(),
                "appointment".to_string(),
                "prescription".to_string(),
                "delivery".to_string(),
                "delivered".to_string(),
                "shipped".to_string(),
                "meeting".to_string(),
                "schedule".to_string(),
                "approval".to_string(),
            ],
            meeting_keywords: vec![
                "sync".to_string(),
                "standup".to_string(),
                "stand-up".to_string(),
                "1:1".to_string(),
                "planning".to_string(),
                "retro".to_string(),
                "kickoff".to_string(),
                "catch-up".to_string(),
                "check-in".to_string(),
            ],
            work_keywords: vec![
                "project".to_string(),
                "sprint".to_string(),
                "deploy".to_string(),
                "client".to_string(),
                "contract".to_string(),
                "quarterly".to_string(),
                "report".to_string(),
                "deadline".to_string(),
                "approval".to_string(),
                "review".to_string(),
            ],
            life_keywords: vec![
                "package".to_string(),
                "delivery".to_string(),
                "delivered".to_string(),
                "shipped".to_string(),
                "appointment".to_string(),
                "prescription".to_string(),
                "pharmacy".to_string(),
                "doctor".to_string(),
                "dentist".to_string(),
                "utility".to_string(),
                "electricity".to_string(),
                "lease".to_string(),
            ],
            finance_keywords: vec![
                "invoice".to_string(),
                "payment".to_string(),
                "receipt".to_string(),
                "statement".to_string(),
                "balance".to_string(),
                "transfer".to_string(),
                "bill".to_string(),
                "past due".to_string(),
                "tax".to_string(),
            ],
            video_link_domains: vec![
                "zoom.us".to_string(),
                "meet.google.com".to_string(),
                "teams.microsoft.com".to_string(),
                "webex.com".to_string(),
                "whereby.com".to_string(),
            ],
            snippet_max_chars: 160,
            mute_expiry_days: None,
        }
    }
}

impl TriageConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TriageConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
