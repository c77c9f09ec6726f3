use crate::classify::Classifier;
use crate::config::TriageConfig;
use crate::filter::SignalFilter;
use crate::headline::headline_for;
use crate::metadata::{EmailMetadata, MetadataExtractor, RawEmail};
use crate::store::{EmailSignal, KeyValueStore, SignalStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mail provider collaborator: the only asynchronous boundary. Once a batch
/// resolves, the pipeline runs to completion synchronously.
#[async_trait]
pub trait MailProvider {
    async fn fetch(&self) -> anyhow::Result<Vec<RawEmail>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<String>,
}

impl CalendarEvent {
    /// Cross-reference: an email links to this event when the subject
    /// carries the event title or the sender is among the participants.
    fn links_to(&self, email: &EmailMetadata) -> bool {
        if !self.title.is_empty()
            && email
                .subject
                .to_lowercase()
                .contains(&self.title.to_lowercase())
        {
            return true;
        }
        self.participants
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&email.sender_address))
    }
}

/// Calendar collaborator, used only for linkage scoring.
pub trait CalendarProvider {
    fn events(&self) -> Vec<CalendarEvent>;
}

/// Stand-in for deployments without calendar access. Provider-supplied
/// event ids on the emails themselves still count as linkage.
pub struct NoCalendar;

impl CalendarProvider for NoCalendar {
    fn events(&self) -> Vec<CalendarEvent> {
        Vec::new()
    }
}

/// Fixed event list, for tests and the offline CLI.
pub struct StaticCalendar {
    events: Vec<CalendarEvent>,
}

impl StaticCalendar {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        StaticCalendar { events }
    }
}

impl CalendarProvider for StaticCalendar {
    fn events(&self) -> Vec<CalendarEvent> {
        self.events.clone()
    }
}

/// The full triage pipeline: extract, filter, classify, headline, store.
/// Every stage is a pure synchronous pass over the fetched batch; a crash
/// before persistence only means signals are re-derived on the next fetch.
pub struct Pipeline<K: KeyValueStore> {
    extractor: MetadataExtractor,
    filter: SignalFilter,
    classifier: Classifier,
    store: SignalStore<K>,
}

impl<K: KeyValueStore> Pipeline<K> {
    pub fn new(config: TriageConfig, kv: K) -> anyhow::Result<Self> {
        let extractor = MetadataExtractor::new(&config);
        let classifier = Classifier::new(&config)?;
        let store = SignalStore::new(kv, config.mute_expiry_days);
        let filter = SignalFilter::new(config)?;
        Ok(Pipeline {
            extractor,
            filter,
            classifier,
            store,
        })
    }

    /// Fetch from the provider and run the batch. A fetch failure is not
    /// retried here; it degrades to whatever the store already holds for
    /// today, which for a fresh session means "no signals available".
    pub async fn run<M, C>(
        &mut self,
        mail: &M,
        calendar: &C,
        now: DateTime<Utc>,
    ) -> Vec<EmailSignal>
    where
        M: MailProvider + Sync,
        C: CalendarProvider,
    {
        let raw = match mail.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("mail fetch failed, no new signals this pass: {e}");
                return self.store.signals_for_today(now);
            }
        };
        log::info!("fetched {} message(s)", raw.len());
        self.run_batch(raw, calendar, now)
    }

    /// The synchronous pipeline over an already-fetched batch. Returns
    /// today's visible signals, newest first.
    pub fn run_batch<C: CalendarProvider>(
        &mut self,
        raw: Vec<RawEmail>,
        calendar: &C,
        now: DateTime<Utc>,
    ) -> Vec<EmailSignal> {
        let mut batch = self.extractor.extract_batch(raw);

        let events = calendar.events();
        if !events.is_empty() {
            for email in &mut batch {
                if email.calendar_event_id.is_some() {
                    continue;
                }
                if let Some(event) = events.iter().find(|ev| ev.links_to(email)) {
                    log::debug!("{}: linked to calendar event {}", email.id, event.id);
                    email.calendar_event_id = Some(event.id.clone());
                }
            }
        }

        for email in self.filter.filter_batch(&batch, now) {
            let Some(kind) = self.classifier.classify(email) else {
                continue;
            };
            let signal = EmailSignal {
                id: email.id.clone(),
                thread_id: email.thread_id.clone(),
                email_type: kind,
                headline: headline_for(kind, email),
                work_life_score: self.classifier.work_life_score(email),
                received_at: email.received_at,
                surfaced_at: now,
                suppressed: false,
            };
            self.store.insert(signal, now);
        }

        self.store.signals_for_today(now)
    }

    pub fn dismiss(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        self.store.dismiss(id, now)
    }

    pub fn reset(&mut self) {
        self.store.reset();
    }

    pub fn store(&self) -> &SignalStore<K> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SignalStore<K> {
        &mut self.store
    }
}
