use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use trajectium::export::SessionExport;
use trajectium::sensors::{save_log, ReplaySource, SampleLog, SensorSource, StaticFix, SyntheticSource};
use trajectium::{
    AnchorFix, LiveUpdate, PipelineConfig, Recorder, RecorderConfig, SessionId, SessionStore,
    SqliteSessionStore,
};

#[derive(Parser, Debug)]
#[command(name = "trajectium")]
#[command(about = "Dead-reckoning motion recorder with SQLite session log", long_about = None)]
struct Args {
    /// Session database
    #[arg(long, default_value = "trajectium.db")]
    db: PathBuf,

    /// Pipeline config (JSON); missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record one session from a sample log or the synthetic walk
    Record {
        /// Anchor latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Anchor longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Replay a recorded sample log (.json or .json.gz)
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Synthetic samples to generate when not replaying
        #[arg(long, default_value = "400")]
        samples: u64,

        /// Stop after this many seconds of wall time
        #[arg(long)]
        duration: Option<u64>,

        /// Pace samples at the configured interval
        #[arg(long)]
        realtime: bool,
    },
    /// Write a synthetic sample log for later replay
    Generate {
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value = "400")]
        samples: u64,
    },
    /// List recorded sessions
    Sessions,
    /// Show statistics of one session
    Show { id: SessionId },
    /// Export one session
    Export {
        id: SessionId,

        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Output file (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a closed session and its motion rows
    Delete { id: SessionId },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Gpx,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let pipeline = match &args.config {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mut store = SqliteSessionStore::open(&args.db)
        .with_context(|| format!("Failed to open session database {}", args.db.display()))?;
    let recovered = store.close_dangling_sessions(Utc::now())?;
    if recovered > 0 {
        warn!("Closed {} session(s) left open by an earlier run", recovered);
    }

    match args.command {
        Command::Record {
            lat,
            lon,
            replay,
            samples,
            duration,
            realtime,
        } => {
            let anchor = AnchorFix::new(lat, lon)?;
            let config = RecorderConfig {
                pipeline,
                ..Default::default()
            };
            let interval = config.pipeline.sample_interval();
            let source: Box<dyn SensorSource> = match replay {
                Some(path) => Box::new(
                    ReplaySource::open(&path, interval)
                        .with_context(|| format!("Failed to read sample log {}", path.display()))?,
                ),
                None => Box::new(SyntheticSource::new(now_seconds(), interval).with_limit(samples)),
            };
            record(store, config, anchor, source, duration, realtime)
        }
        Command::Generate { out, samples } => {
            let mut source =
                SyntheticSource::new(now_seconds(), pipeline.sample_interval()).with_limit(samples);
            let mut log = SampleLog::default();
            while let Some(sample) = source.next_sample()? {
                log.samples.push(sample);
            }
            save_log(&out, &log)?;
            info!("Wrote {} samples to {}", log.samples.len(), out.display());
            Ok(())
        }
        Command::Sessions => {
            let sessions = store.list_sessions()?;
            if sessions.is_empty() {
                println!("No sessions recorded");
            }
            for session in sessions {
                let points = store.list_motion(session.id)?.len();
                println!(
                    "{:>5}  {}  {:>8}  {:>6} points",
                    session.id,
                    session.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
                    session
                        .duration_seconds()
                        .map(|d| format!("{:.1}s", d))
                        .unwrap_or_else(|| "open".to_string()),
                    points
                );
            }
            Ok(())
        }
        Command::Show { id } => {
            let export = SessionExport::load(&store, id)?;
            println!("{}", serde_json::to_string_pretty(&export.stats)?);
            Ok(())
        }
        Command::Export { id, format, out } => {
            let export = SessionExport::load(&store, id)?;
            let body = match format {
                ExportFormat::Json => export.to_json()?,
                ExportFormat::Gpx => export.to_gpx().to_gpx_xml(),
            };
            write_output(out.as_deref(), &body)
        }
        Command::Delete { id } => {
            store.delete_session(id)?;
            println!("Deleted session {}", id);
            Ok(())
        }
    }
}

fn record(
    store: SqliteSessionStore,
    config: RecorderConfig,
    anchor: AnchorFix,
    mut source: Box<dyn SensorSource>,
    duration: Option<u64>,
    realtime: bool,
) -> Result<()> {
    let mut recorder = Recorder::new(store, config)?;
    let live = recorder.subscribe();
    let stop = Arc::new(AtomicBool::new(false));
    let done = Arc::new(AtomicBool::new(false));

    if let Some(seconds) = duration {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            stop.store(true, Ordering::Relaxed);
        });
    }

    let session_id = recorder.start(&mut StaticFix::new(anchor))?;

    // Live view: progress every 20 points, persistence problems as they come
    let printer = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut seen = 0u64;
            while !done.load(Ordering::Relaxed) {
                match live.recv_timeout(Duration::from_millis(200)) {
                    Ok(LiveUpdate::Point { point, .. }) => {
                        seen += 1;
                        if seen % 20 == 0 {
                            let (x, y) = point.planar();
                            info!("t={:.2} x={:+.2}m y={:+.2}m", point.timestamp, x, y);
                        }
                    }
                    Ok(LiveUpdate::PersistFailed { timestamp, error, .. }) => {
                        warn!("Row at t={:.3} not stored: {}", timestamp, error);
                    }
                    Err(_) => {}
                }
            }
        })
    };

    let consumed = recorder.run(source.as_mut(), &stop, realtime);
    let session = recorder.stop()?;
    let consumed = consumed?;

    done.store(true, Ordering::Relaxed);
    if printer.join().is_err() {
        warn!("Live view thread panicked");
    }

    let stats = recorder.stats();
    let export = {
        let store = recorder.store();
        let guard = store
            .lock()
            .map_err(|_| anyhow::anyhow!("Session store lock poisoned"))?;
        SessionExport::load(&*guard, session_id)?
    };
    println!("Session {} recorded", session.id);
    println!("  samples:     {}", consumed);
    println!("  points:      {}", export.stats.point_count);
    println!("  dropped:     {}", stats.pipeline.dropped);
    println!("  rot. gated:  {}", stats.pipeline.rotation_gated);
    println!("  persisted:   {} ({} failed)", stats.persisted, stats.persist_failures);
    println!("  path length: {:.2} m", export.stats.path_length_meters);
    Ok(())
}

fn write_output(out: Option<&Path>, body: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", body),
    }
    Ok(())
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
