use crate::config::TriageConfig;
use crate::filter::{compile_keywords, matches};
use crate::metadata::EmailMetadata;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The five signal categories. There is deliberately no catch-all: an email
/// matching no rule is dropped, not labelled "other".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    MeetingInvite,
    WorkContext,
    WorkStandalone,
    LifeSignal,
    LifeFinance,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::MeetingInvite => "meeting_invite",
            EmailType::WorkContext => "work_context",
            EmailType::WorkStandalone => "work_standalone",
            EmailType::LifeSignal => "life_signal",
            EmailType::LifeFinance => "life_finance",
        }
    }
}

struct Rule {
    name: &'static str,
    result: EmailType,
    predicate: Box<dyn Fn(&EmailMetadata) -> bool + Send + Sync>,
}

/// Rule-based type classifier. The decision tree is an ordered list of
/// (predicate, type) pairs evaluated first-match-wins, so the specificity
/// chain doubles as the tie-break: a paid webinar invite matches both the
/// meeting rule and the finance table, and the meeting rule wins because it
/// comes first.
pub struct Classifier {
    rules: Vec<Rule>,
    work_pattern: Option<Regex>,
    life_pattern: Option<Regex>,
    finance_pattern: Option<Regex>,
    sender_weights: HashMap<String, f32>,
    sender_weight_threshold: f32,
}

impl Classifier {
    pub fn new(config: &TriageConfig) -> anyhow::Result<Self> {
        let meeting_pattern = compile_keywords("meeting_keywords", &config.meeting_keywords)?;
        let work_pattern = compile_keywords("work_keywords", &config.work_keywords)?;
        let life_pattern = compile_keywords("life_keywords", &config.life_keywords)?;
        let finance_pattern = compile_keywords("finance_keywords", &config.finance_keywords)?;

        let rules = vec![
            Rule {
                name: "meeting-invite",
                result: EmailType::MeetingInvite,
                predicate: Box::new(|e| e.ical_attached || e.has_video_link),
            },
            Rule {
                name: "calendar-context",
                result: EmailType::WorkContext,
                predicate: {
                    let meeting = meeting_pattern.clone();
                    Box::new(move |e| {
                        e.calendar_event_id.is_some() || matches(&meeting, &e.subject)
                    })
                },
            },
            Rule {
                name: "work-standalone",
                result: EmailType::WorkStandalone,
                predicate: {
                    let work = work_pattern.clone();
                    Box::new(move |e| matches(&work, &e.subject) || matches(&work, &e.snippet))
                },
            },
            Rule {
                name: "life-signal",
                result: EmailType::LifeSignal,
                predicate: {
                    let life = life_pattern.clone();
                    Box::new(move |e| matches(&life, &e.subject) || matches(&life, &e.snippet))
                },
            },
            Rule {
                name: "life-finance",
                result: EmailType::LifeFinance,
                predicate: {
                    let finance = finance_pattern.clone();
                    Box::new(move |e| {
                        matches(&finance, &e.subject) || matches(&finance, &e.snippet)
                    })
                },
            },
        ];

        Ok(Classifier {
            rules,
            work_pattern,
            life_pattern,
            finance_pattern,
            sender_weights: config.sender_weights.clone(),
            sender_weight_threshold: config.sender_weight_threshold,
        })
    }

    /// Assign a type, or `None` when no rule matches (the email is then
    /// dropped silently). Pure function of the metadata: repeated calls
    /// yield the same answer.
    pub fn classify(&self, email: &EmailMetadata) -> Option<EmailType> {
        for rule in &self.rules {
            if (rule.predicate)(email) {
                log::debug!("{}: rule '{}' matched", email.id, rule.name);
                return Some(rule.result);
            }
        }
        log::debug!("{}: no classification rule matched, dropped", email.id);
        None
    }

    /// Continuous work/life lean in [-1.0, 1.0], positive toward work.
    /// Display grouping only; never used for suppression decisions.
    pub fn work_life_score(&self, email: &EmailMetadata) -> f32 {
        let mut score = 0.0f32;

        let weight = self
            .sender_weights
            .get(&email.sender_address)
            .copied()
            .unwrap_or(0.0);
        if weight >= self.sender_weight_threshold {
            score += 0.5;
        }
        if email.calendar_event_id.is_some() || email.ical_attached {
            score += 0.25;
        }

        let text = format!("{} {}", email.subject, email.snippet);
        if matches(&self.work_pattern, &text) {
            score += 0.5;
        }
        if matches(&self.life_pattern, &text) {
            score -= 0.5;
        }
        if matches(&self.finance_pattern, &text) {
            score -= 0.25;
        }

        score.clamp(-1.0, 1.0)
    }
}
