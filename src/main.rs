use alfredo_triage::classify::Classifier;
use alfredo_triage::filter::SignalFilter;
use alfredo_triage::metadata::RawEmail;
use alfredo_triage::pipeline::{CalendarEvent, MailProvider, NoCalendar, Pipeline, StaticCalendar};
use alfredo_triage::store::FileKv;
use alfredo_triage::TriageConfig;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use clap::{Arg, Command};
use log::LevelFilter;
use std::process;

/// Offline mail provider: a JSON array of raw messages on disk stands in
/// for the live mailbox.
struct FileMailbox {
    path: String,
}

#[async_trait]
impl MailProvider for FileMailbox {
    async fn fetch(&self) -> anyhow::Result<Vec<RawEmail>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading mail batch {}", self.path))?;
        let raw = serde_json::from_str(&content)
            .context("mail batch is not a JSON array of messages")?;
        Ok(raw)
    }
}

#[tokio::main]
async fn main() {
    let matches = Command::new("alfredo-triage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Surfaces the handful of emails worth acting on today")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("alfredo-triage.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity (keyword tables, thresholds)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("triage")
                .long("triage")
                .value_name("FILE")
                .help("Run the pipeline over a JSON batch of raw email metadata")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("calendar")
                .long("calendar")
                .value_name("FILE")
                .help("JSON array of calendar events for linkage scoring")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .value_name("FILE")
                .help("State file holding surfaced signals and the mute list")
                .default_value("alfredo-state.json"),
        )
        .arg(
            Arg::new("dismiss")
                .long("dismiss")
                .value_name("ID")
                .help("Dismiss a surfaced signal and mute its thread")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("unmute")
                .long("unmute")
                .value_name("THREAD")
                .help("Lift the mute on a thread")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("reset")
                .long("reset")
                .help("Clear surfaced signals, dismissals, and mutes")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging with per-tier drop traces")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config_path = matches.get_one::<String>("config").unwrap();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    let state_path = matches.get_one::<String>("state").unwrap();
    let kv = FileKv::new(state_path.as_str());
    let mut pipeline = match Pipeline::new(config, kv) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error building pipeline: {e}");
            process::exit(1);
        }
    };

    if let Some(id) = matches.get_one::<String>("dismiss") {
        if pipeline.dismiss(id, Utc::now()) {
            println!("Dismissed {id}; its thread is now muted.");
        } else {
            println!("No surfaced signal with id {id}.");
        }
        return;
    }

    if let Some(thread_id) = matches.get_one::<String>("unmute") {
        if pipeline.store_mut().unmute(thread_id) {
            println!("Unmuted thread {thread_id}.");
        } else {
            println!("Thread {thread_id} was not muted.");
        }
        return;
    }

    if matches.get_flag("reset") {
        pipeline.reset();
        println!("State cleared.");
        return;
    }

    let Some(batch_path) = matches.get_one::<String>("triage") else {
        eprintln!("Nothing to do: pass --triage <FILE> (see --help)");
        process::exit(2);
    };

    let mailbox = FileMailbox {
        path: batch_path.clone(),
    };
    let now = Utc::now();
    let signals = match matches.get_one::<String>("calendar") {
        Some(calendar_path) => match load_calendar(calendar_path) {
            Ok(calendar) => pipeline.run(&mailbox, &calendar, now).await,
            Err(e) => {
                eprintln!("Error loading calendar: {e}");
                process::exit(1);
            }
        },
        None => pipeline.run(&mailbox, &NoCalendar, now).await,
    };

    if signals.is_empty() {
        println!("No signals available.");
        return;
    }

    println!("{} signal(s) for today:", signals.len());
    for signal in &signals {
        println!(
            "  [{}] {} (id: {}, work/life {:+.2})",
            signal.email_type.as_str(),
            signal.headline,
            signal.id,
            signal.work_life_score
        );
    }
}

fn load_config(path: &str) -> anyhow::Result<TriageConfig> {
    if std::path::Path::new(path).exists() {
        TriageConfig::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(TriageConfig::default())
    }
}

fn generate_default_config(path: &str) {
    let config = TriageConfig::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_config(config: &TriageConfig) {
    println!("🔍 Testing configuration...");
    println!();
    println!(
        "Window: {}h, recency: {}h, threshold: {} of 4 conditions",
        config.window_hours, config.recency_hours, config.min_conditions
    );
    println!("Sender weights: {}", config.sender_weights.len());
    println!(
        "Keyword tables: signal={} meeting={} work={} life={} finance={}",
        config.signal_keywords.len(),
        config.meeting_keywords.len(),
        config.work_keywords.len(),
        config.life_keywords.len(),
        config.finance_keywords.len()
    );
    match config.mute_expiry_days {
        Some(days) => println!("Mutes expire after {days} day(s)"),
        None => println!("Mutes never expire (manual unmute only)"),
    }

    let filter_check = SignalFilter::new(config.clone());
    let classifier_check = Classifier::new(config);
    match (filter_check, classifier_check) {
        (Ok(_), Ok(_)) => println!("✅ All keyword patterns compiled successfully."),
        (Err(e), _) | (_, Err(e)) => {
            println!("❌ Configuration validation failed:");
            println!("Error: {e}");
            process::exit(1);
        }
    }
}

fn load_calendar(path: &str) -> anyhow::Result<StaticCalendar> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading calendar file {path}"))?;
    let events: Vec<CalendarEvent> =
        serde_json::from_str(&content).context("calendar file is not a JSON array of events")?;
    Ok(StaticCalendar::new(events))
}
