use std::sync::atomic::AtomicBool;
use std::time::Duration;

use nalgebra::Vector3;
use trajectium::export::SessionExport;
use trajectium::projection::project_path;
use trajectium::sensors::{save_log, ReplaySource, SampleLog, SensorSource, StaticFix, SyntheticSource};
use trajectium::{
    AnchorFix, LiveUpdate, MotionPipeline, MotionSample, PipelineConfig, Recorder, RecorderConfig,
    SessionStore, SqliteSessionStore,
};

fn berlin() -> AnchorFix {
    AnchorFix::new(52.52, 13.405).unwrap()
}

fn synthetic(samples: u64) -> Vec<MotionSample> {
    let mut source = SyntheticSource::new(1_700_000_000.0, Duration::from_millis(50)).with_limit(samples);
    std::iter::from_fn(|| source.next_sample().unwrap()).collect()
}

#[test]
fn test_recorded_session_replays_to_same_path() {
    let samples = synthetic(300);
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteSessionStore::open(dir.path().join("walk.db")).unwrap();
    let mut recorder = Recorder::new(store, RecorderConfig::default()).unwrap();

    let id = recorder.start(&mut StaticFix::new(berlin())).unwrap();
    let mut source = ReplaySource::from_samples(samples.clone(), Duration::from_millis(50));
    let consumed = recorder.run(&mut source, &AtomicBool::new(false), false).unwrap();
    assert_eq!(consumed, 300);
    recorder.stop().unwrap();

    let replayed = MotionPipeline::replay(PipelineConfig::default(), &samples).unwrap();
    let store = recorder.store();
    let store = store.lock().unwrap();
    let stored = store.list_motion(id).unwrap();
    assert_eq!(stored, replayed);

    // live window keeps only the newest 100
    let live = recorder.snapshot();
    assert_eq!(live.len(), 100);
    assert_eq!(live[..], stored[200..]);

    let export = SessionExport::load(&*store, id).unwrap();
    assert_eq!(export.path, project_path(&berlin(), &stored));
    assert!(export.stats.path_length_meters > 0.0);
}

#[test]
fn test_device_at_rest_stays_at_anchor() {
    let store = SqliteSessionStore::open_in_memory().unwrap();
    let mut recorder = Recorder::new(store, RecorderConfig::default()).unwrap();
    recorder.start(&mut StaticFix::new(berlin())).unwrap();

    for i in 0..200 {
        recorder.push_sample(&MotionSample::at_rest(i as f64 * 0.05)).unwrap();
    }
    for position in recorder.projected_path() {
        assert_eq!(position.latitude, 52.52);
        assert_eq!(position.longitude, 13.405);
    }
    assert!(recorder.snapshot().iter().all(|p| p.displacement == Vector3::zeros()));
    recorder.stop().unwrap();
}

#[test]
fn test_reset_keeps_persisted_history() {
    let store = SqliteSessionStore::open_in_memory().unwrap();
    let mut recorder = Recorder::new(store, RecorderConfig::default()).unwrap();
    let id = recorder.start(&mut StaticFix::new(berlin())).unwrap();
    let updates = recorder.subscribe();

    let samples = synthetic(60);
    for s in &samples[..40] {
        recorder.push_sample(s).unwrap();
    }
    recorder.reset_path();
    assert!(recorder.snapshot().is_empty());
    for s in &samples[40..] {
        recorder.push_sample(s).unwrap();
    }

    let live = recorder.snapshot();
    assert_eq!(live.len(), 20);
    assert_eq!(live[0].timestamp, samples[40].timestamp);
    recorder.stop().unwrap();

    let stored = recorder.store().lock().unwrap().list_motion(id).unwrap();
    assert_eq!(stored.len(), 60);
    assert_eq!(stored[40..], live[..]);

    let points = updates
        .try_iter()
        .filter(|u| matches!(u, LiveUpdate::Point { .. }))
        .count();
    assert_eq!(points, 60);
}

#[test]
fn test_replay_from_gzip_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walk.json.gz");
    save_log(&path, &SampleLog { samples: synthetic(50) }).unwrap();

    let mut recorder =
        Recorder::new(SqliteSessionStore::open_in_memory().unwrap(), RecorderConfig::default()).unwrap();
    let id = recorder.start(&mut StaticFix::new(berlin())).unwrap();
    let mut source = ReplaySource::open(&path, Duration::from_millis(50)).unwrap();
    assert_eq!(recorder.run(&mut source, &AtomicBool::new(false), false).unwrap(), 50);
    let session = recorder.stop().unwrap();

    assert_eq!(session.id, id);
    assert_eq!(session.anchor, Some(berlin()));
    assert_eq!(recorder.stats().persisted, 50);
}
