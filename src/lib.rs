pub mod classify;
pub mod config;
pub mod filter;
pub mod headline;
pub mod metadata;
pub mod pipeline;
pub mod store;

pub use classify::{Classifier, EmailType};
pub use config::TriageConfig;
pub use filter::{ConditionTally, SignalFilter};
pub use headline::{headline_for, MuteList};
pub use metadata::{EmailMetadata, MetadataExtractor, RawEmail};
pub use pipeline::{CalendarEvent, CalendarProvider, MailProvider, NoCalendar, Pipeline};
pub use store::{EmailSignal, FileKv, KeyValueStore, MemoryKv, SignalStore};
