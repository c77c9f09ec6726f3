use crate::config::TriageConfig;
use crate::metadata::EmailMetadata;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

/// Compile a keyword table into one case-insensitive alternation. Entries
/// are regex fragments; an empty table compiles to `None` and the matching
/// condition simply never fires.
pub(crate) fn compile_keywords(table: &str, entries: &[String]) -> anyhow::Result<Option<Regex>> {
    if entries.is_empty() {
        return Ok(None);
    }
    let pattern = format!("(?i)(?:{})", entries.join("|"));
    let regex =
        Regex::new(&pattern).with_context(|| format!("invalid pattern in {table} table"))?;
    Ok(Some(regex))
}

pub(crate) fn matches(pattern: &Option<Regex>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|p| p.is_match(text))
}

/// Per-email tally of the independent tier-3 signal conditions. A missing
/// field fails its condition; it never errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionTally {
    /// Sender weight at or above the configured threshold.
    pub trusted_sender: bool,
    /// Keyword hit in subject or snippet.
    pub keyword_match: bool,
    /// Linked calendar event or an iCal attachment.
    pub calendar_linked: bool,
    /// Received within the tighter recency sub-window.
    pub recent: bool,
}

impl ConditionTally {
    pub fn count(&self) -> usize {
        [
            self.trusted_sender,
            self.keyword_match,
            self.calendar_linked,
            self.recent,
        ]
        .iter()
        .filter(|c| **c)
        .count()
    }

    pub fn passes(&self, min_conditions: usize) -> bool {
        self.count() >= min_conditions
    }
}

/// The three-tier eligibility filter: time window, thread state, then a
/// corroboration count of independent signal conditions. One weak signal is
/// not enough; at least `min_conditions` must agree before an email reaches
/// the classifier.
pub struct SignalFilter {
    config: TriageConfig,
    signal_pattern: Option<Regex>,
}

impl SignalFilter {
    pub fn new(config: TriageConfig) -> anyhow::Result<Self> {
        let signal_pattern = compile_keywords("signal_keywords", &config.signal_keywords)?;
        Ok(SignalFilter {
            config,
            signal_pattern,
        })
    }

    /// Tier 1: drop anything older than the configured window.
    pub fn tier1_recency(&self, email: &EmailMetadata, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(email.received_at) <= Duration::hours(self.config.window_hours)
    }

    /// Tier 2: keep emails still awaiting attention. Read-and-replied
    /// threads are resolved; everything else stays in.
    pub fn tier2_thread_state(&self, email: &EmailMetadata) -> bool {
        email.is_unread || !email.has_recent_reply || email.newest_in_thread
    }

    /// Tier 3: tally the independent signal conditions.
    pub fn tier3_conditions(&self, email: &EmailMetadata, now: DateTime<Utc>) -> ConditionTally {
        let weight = self
            .config
            .sender_weights
            .get(&email.sender_address)
            .copied()
            .unwrap_or(0.0);
        ConditionTally {
            trusted_sender: weight >= self.config.sender_weight_threshold,
            keyword_match: matches(&self.signal_pattern, &email.subject)
                || matches(&self.signal_pattern, &email.snippet),
            calendar_linked: email.calendar_event_id.is_some() || email.ical_attached,
            recent: now.signed_duration_since(email.received_at)
                <= Duration::hours(self.config.recency_hours),
        }
    }

    /// Apply all three tiers in order, returning the subset eligible for
    /// classification. Drops are logged, never queued or retried.
    pub fn filter_batch<'a>(
        &self,
        emails: &'a [EmailMetadata],
        now: DateTime<Utc>,
    ) -> Vec<&'a EmailMetadata> {
        let mut eligible = Vec::new();
        for email in emails {
            if !self.tier1_recency(email, now) {
                log::debug!(
                    "{}: outside the {}h window, dropped",
                    email.id,
                    self.config.window_hours
                );
                continue;
            }
            if !self.tier2_thread_state(email) {
                log::debug!("{}: thread already resolved, dropped", email.id);
                continue;
            }
            let tally = self.tier3_conditions(email, now);
            if !tally.passes(self.config.min_conditions) {
                log::debug!(
                    "{}: {} of {} required signal conditions, dropped",
                    email.id,
                    tally.count(),
                    self.config.min_conditions
                );
                continue;
            }
            eligible.push(email);
        }
        log::info!(
            "{} of {} emails eligible for classification",
            eligible.len(),
            emails.len()
        );
        eligible
    }
}
