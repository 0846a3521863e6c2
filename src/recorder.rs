//! Session lifecycle around the motion pipeline.
//!
//! One producer drives the pipeline: `push_sample` runs a tick to completion
//! before returning, so integrator state is never touched concurrently.
//! Persistence runs on a dedicated writer thread fed through a bounded FIFO
//! channel, which keeps rows of a session in tick order. When the writer
//! falls behind, the producer blocks on the persistence queue; live updates
//! are the ones that get dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RecorderConfig;
use crate::error::{Result, TrajectoryError};
use crate::pipeline::{MotionPipeline, PipelineStats, TickOutcome};
use crate::projection::project_path;
use crate::sensors::{FixSource, SensorSource};
use crate::storage::SessionStore;
use crate::trajectory::TrajectoryBuffer;
use crate::types::{AnchorFix, LatLng, MotionSample, Session, SessionId, TrajectoryPoint};

/// Pushed to live subscribers; may be dropped when they lag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LiveUpdate {
    Point {
        session_id: SessionId,
        point: TrajectoryPoint,
    },
    /// A row could not be written; recording carries on.
    PersistFailed {
        session_id: SessionId,
        timestamp: f64,
        error: String,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderStats {
    pub pipeline: PipelineStats,
    pub persisted: u64,
    pub persist_failures: u64,
    pub live_dropped: u64,
}

#[derive(Default)]
struct Counters {
    persisted: AtomicU64,
    persist_failures: AtomicU64,
    live_dropped: AtomicU64,
}

enum WriteCommand {
    Append {
        session_id: SessionId,
        point: TrajectoryPoint,
    },
}

struct Writer {
    tx: Sender<WriteCommand>,
    handle: JoinHandle<()>,
}

/// Open session. `writer` is gone once `stop` has drained it; the session
/// stays here until the store has actually closed it.
struct ActiveSession {
    id: SessionId,
    writer: Option<Writer>,
}

fn lock<S>(store: &Mutex<S>) -> Result<MutexGuard<'_, S>> {
    store
        .lock()
        .map_err(|_| TrajectoryError::Internal("Failed to acquire store lock".to_string()))
}

fn spawn_writer<S>(
    store: Arc<Mutex<S>>,
    rx: Receiver<WriteCommand>,
    live_tx: Sender<LiveUpdate>,
    counters: Arc<Counters>,
) -> Result<JoinHandle<()>>
where
    S: SessionStore + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("trajectium-writer".to_string())
        .spawn(move || {
            // Runs until every sender is gone and the queue is drained
            for command in rx.iter() {
                let WriteCommand::Append { session_id, point } = command;
                let result = lock(&store).and_then(|mut s| s.append_motion(session_id, &point));
                match result {
                    Ok(()) => {
                        counters.persisted.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        counters.persist_failures.fetch_add(1, Ordering::Relaxed);
                        error!(
                            "Persist failed: session={} t={:.3} error={}",
                            session_id, point.timestamp, err
                        );
                        let notice = LiveUpdate::PersistFailed {
                            session_id,
                            timestamp: point.timestamp,
                            error: err.to_string(),
                        };
                        if live_tx.try_send(notice).is_err() {
                            counters.live_dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
        })?;
    Ok(handle)
}

pub struct Recorder<S: SessionStore + Send + 'static> {
    config: RecorderConfig,
    store: Arc<Mutex<S>>,
    pipeline: MotionPipeline,
    buffer: TrajectoryBuffer,
    active: Option<ActiveSession>,
    anchor: Option<AnchorFix>,
    live_tx: Sender<LiveUpdate>,
    live_rx: Receiver<LiveUpdate>,
    counters: Arc<Counters>,
}

impl<S: SessionStore + Send + 'static> Recorder<S> {
    pub fn new(store: S, config: RecorderConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = MotionPipeline::new(config.pipeline.clone())?;
        let buffer = TrajectoryBuffer::new(config.pipeline.buffer_capacity);
        let (live_tx, live_rx) = channel::bounded(config.live_queue_depth);

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            pipeline,
            buffer,
            active: None,
            anchor: None,
            live_tx,
            live_rx,
            counters: Arc::new(Counters::default()),
            config,
        })
    }

    /// Receiver for live updates. All subscribers share one queue.
    pub fn subscribe(&self) -> Receiver<LiveUpdate> {
        self.live_rx.clone()
    }

    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    /// True while samples are accepted.
    pub fn is_recording(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.writer.is_some())
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn anchor(&self) -> Option<AnchorFix> {
        self.anchor
    }

    /// Acquire the anchor fix, open a session and start the writer.
    ///
    /// Fails with `AlreadyRecording` while a previous session is still open,
    /// including one whose `stop` could not close it yet.
    pub fn start(&mut self, fix: &mut dyn FixSource) -> Result<SessionId> {
        if self.active.is_some() {
            return Err(TrajectoryError::AlreadyRecording);
        }

        let anchor = fix.current_fix()?;
        let id = lock(&self.store)?.create_session(Utc::now(), Some(anchor))?;

        let (writer_tx, writer_rx) = channel::bounded(self.config.persist_queue_depth);
        let handle = match spawn_writer(
            Arc::clone(&self.store),
            writer_rx,
            self.live_tx.clone(),
            Arc::clone(&self.counters),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                // leave no open session behind
                lock(&self.store)?.close_session(id, Utc::now())?;
                return Err(err);
            }
        };

        self.pipeline.reset();
        self.buffer.reset();
        self.anchor = Some(anchor);
        self.active = Some(ActiveSession {
            id,
            writer: Some(Writer {
                tx: writer_tx,
                handle,
            }),
        });
        info!(
            "Recording started: session={} anchor=({:.6}, {:.6})",
            id, anchor.latitude, anchor.longitude
        );
        Ok(id)
    }

    /// Run one sample through the pipeline, buffer it and queue it for storage.
    pub fn push_sample(&mut self, sample: &MotionSample) -> Result<TickOutcome> {
        let Some((session_id, writer)) = self
            .active
            .as_ref()
            .and_then(|a| a.writer.as_ref().map(|w| (a.id, w)))
        else {
            return Err(TrajectoryError::NotRecording);
        };

        let outcome = self.pipeline.process(sample);
        if let TickOutcome::Advanced { point, .. } = &outcome {
            self.buffer.append(point.clone());

            let command = WriteCommand::Append {
                session_id,
                point: point.clone(),
            };
            if writer.tx.send(command).is_err() {
                self.counters.persist_failures.fetch_add(1, Ordering::Relaxed);
                error!("Persist failed: session={} writer stopped", session_id);
            }

            let update = LiveUpdate::Point {
                session_id,
                point: point.clone(),
            };
            match self.live_tx.try_send(update) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.counters.live_dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("Live update dropped at t={:.3}", sample.timestamp);
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
        Ok(outcome)
    }

    /// Stop consuming samples, let queued writes finish, close the session.
    ///
    /// If the store refuses to close the session, the recorder keeps it as
    /// its open session: samples are rejected and `stop` may be called again.
    pub fn stop(&mut self) -> Result<Session> {
        let Some(active) = self.active.as_mut() else {
            return Err(TrajectoryError::NotRecording);
        };
        let id = active.id;

        if let Some(Writer { tx, handle }) = active.writer.take() {
            drop(tx);
            if handle.join().is_err() {
                error!("Writer thread panicked: session={}", id);
            }
        }

        let mut store = lock(&self.store)?;
        match store.close_session(id, Utc::now()) {
            Ok(()) | Err(TrajectoryError::SessionClosed(_)) => {}
            Err(err) => {
                error!("Failed to close session {}: {}", id, err);
                return Err(err);
            }
        }
        self.active = None;
        let session = store.get_session(id)?;
        info!(
            "Recording stopped: session={} ticks={} persisted={}",
            id,
            self.pipeline.stats().ticks,
            self.counters.persisted.load(Ordering::Relaxed)
        );
        Ok(session)
    }

    /// Pull samples until the source runs dry or `stop` is raised.
    ///
    /// With `pace` set, sleeps one nominal interval between samples.
    pub fn run(&mut self, source: &mut dyn SensorSource, stop: &AtomicBool, pace: bool) -> Result<u64> {
        if !self.is_recording() {
            return Err(TrajectoryError::NotRecording);
        }
        source.set_interval(self.config.pipeline.sample_interval());

        let mut consumed = 0u64;
        while !stop.load(Ordering::Relaxed) {
            let Some(sample) = source.next_sample()? else {
                break;
            };
            self.push_sample(&sample)?;
            consumed += 1;
            if pace {
                thread::sleep(source.interval());
            }
        }
        Ok(consumed)
    }

    /// Restart the live path at the origin. Stored rows are kept.
    pub fn reset_path(&mut self) {
        self.buffer.reset();
        self.pipeline.reset_motion();
    }

    /// Zero the displayed path at `since` without touching history.
    pub fn offset_path(&mut self, since: f64) {
        self.buffer.offset(since);
    }

    pub fn snapshot(&self) -> Vec<TrajectoryPoint> {
        self.buffer.snapshot()
    }

    /// Snapshot projected around the session anchor; empty before any start.
    pub fn projected_path(&self) -> Vec<LatLng> {
        match self.anchor {
            Some(anchor) => project_path(&anchor, &self.buffer.snapshot()),
            None => Vec::new(),
        }
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            pipeline: self.pipeline.stats(),
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            persist_failures: self.counters.persist_failures.load(Ordering::Relaxed),
            live_dropped: self.counters.live_dropped.load(Ordering::Relaxed),
        }
    }
}

impl<S: SessionStore + Send + 'static> Drop for Recorder<S> {
    fn drop(&mut self) {
        if self.active.is_some() {
            if let Err(err) = self.stop() {
                warn!("Failed to stop recording on drop: {}", err);
            }
        }
    }
}
