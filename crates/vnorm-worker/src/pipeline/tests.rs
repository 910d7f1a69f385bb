use std::sync::Arc;

use vnorm_media::fake::{EngineCall, ScriptedEngine, ScriptedProbe};
use vnorm_media::{INPUT_NAME, OUTPUT_NAME};
use vnorm_models::{EncoderSettings, Geometry};

use super::*;
use crate::consent::FixedConsent;

const VERTICAL: Geometry = Geometry::new(720, 1280, 60_000);
const LANDSCAPE: Geometry = Geometry::new(1920, 1080, 30_000);
const LONG_VERTICAL: Geometry = Geometry::new(720, 1280, 140_000);

fn source(name: &str) -> VideoSource {
    VideoSource::new(format!("bytes of {name}").into_bytes(), name, "video/mp4")
}

fn pipeline(
    engine: Arc<ScriptedEngine>,
    probe: ScriptedProbe,
    consent: Arc<FixedConsent>,
) -> NormalizationPipeline {
    let session = Arc::new(EncoderSession::new(engine, EncoderSettings::default()));
    NormalizationPipeline::new(session, Arc::new(probe), consent)
}

#[tokio::test]
async fn test_conforming_video_passes_through_untouched() {
    let engine = Arc::new(ScriptedEngine::new());
    let consent = Arc::new(FixedConsent::granted());
    let pipeline = pipeline(engine.clone(), ScriptedProbe::returning(VERTICAL), consent.clone());

    let input = source("vertical.mp4");
    let disposition = pipeline.process(input.clone()).await;

    assert_eq!(disposition, Disposition::PassThrough(input.bytes().clone()));
    assert_eq!(consent.times_asked(), 0);
    assert!(engine.calls().is_empty());
    assert_eq!(pipeline.snapshot().state, PipelineState::PassThrough);
}

#[tokio::test]
async fn test_declined_consent_aborts_without_engine_calls() {
    let engine = Arc::new(ScriptedEngine::new());
    let consent = Arc::new(FixedConsent::denied());
    let pipeline = pipeline(engine.clone(), ScriptedProbe::returning(LANDSCAPE), consent.clone());

    let disposition = pipeline.process(source("landscape.mp4")).await;

    assert_eq!(disposition, Disposition::Aborted);
    assert_eq!(consent.times_asked(), 1);
    assert!(engine.calls().is_empty());
    assert_eq!(engine.load_count(), 0);
}

#[tokio::test]
async fn test_granted_consent_normalizes() {
    let engine = Arc::new(ScriptedEngine::new().with_frames(900).with_output(&b"letterboxed"[..]));
    let pipeline = pipeline(
        engine.clone(),
        ScriptedProbe::returning(LANDSCAPE),
        Arc::new(FixedConsent::granted()),
    );
    let progress = pipeline.subscribe_progress();

    let disposition = pipeline.process(source("landscape.mp4")).await;

    let Disposition::NormalizedReady(artifact) = disposition else {
        panic!("expected a normalized artifact, got {disposition:?}");
    };
    assert_eq!(artifact.bytes.as_ref(), b"letterboxed");
    assert_eq!(artifact.mime_type, "video/mp4");
    assert_eq!(artifact.original_name, "landscape.mp4");

    let args = engine.last_transcode_args().unwrap().join(" ");
    assert!(args.contains("-i input.mp4"));
    assert!(args.contains("scale=720:1280:force_original_aspect_ratio=decrease"));
    assert!(args.contains("pad=720:1280:(ow-iw)/2:(oh-ih)/2:black"));
    assert!(args.contains("-t 139.999"));
    assert!(args.contains("-c:a copy"));
    assert!(args.ends_with("output.mp4"));

    assert_eq!(progress.latest().percent, 100);
    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.state, PipelineState::NormalizedReady);
    assert_eq!(snapshot.percent, 100);
    assert!(snapshot.error.is_none());

    assert!(!engine.has_file(INPUT_NAME));
    assert!(!engine.has_file(OUTPUT_NAME));
}

#[tokio::test]
async fn test_long_vertical_video_needs_consent() {
    let engine = Arc::new(ScriptedEngine::new());
    let consent = Arc::new(FixedConsent::denied());
    let pipeline = pipeline(engine, ScriptedProbe::returning(LONG_VERTICAL), consent.clone());

    assert_eq!(pipeline.process(source("long.mp4")).await, Disposition::Aborted);
    assert_eq!(consent.times_asked(), 1);
}

#[tokio::test]
async fn test_probe_error_fails() {
    let engine = Arc::new(ScriptedEngine::new());
    let consent = Arc::new(FixedConsent::granted());
    let pipeline = pipeline(engine.clone(), ScriptedProbe::failing(), consent.clone());

    let disposition = pipeline.process(source("broken.mov")).await;

    let Disposition::Failed(reason) = disposition else {
        panic!("expected a failure, got {disposition:?}");
    };
    assert!(reason.contains("broken.mov"));
    assert_eq!(consent.times_asked(), 0);
    assert!(engine.calls().is_empty());

    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.state, PipelineState::Failed);
    assert_eq!(snapshot.error.as_deref(), Some(reason.as_str()));
}

#[tokio::test]
async fn test_engine_failure_then_retry_on_next_file() {
    let engine = Arc::new(ScriptedEngine::new().failing_loads(1));
    let pipeline = pipeline(
        engine.clone(),
        ScriptedProbe::returning(LANDSCAPE),
        Arc::new(FixedConsent::granted()),
    );

    let first = pipeline.process(source("a.mp4")).await;
    assert!(matches!(&first, Disposition::Failed(reason) if reason.contains("Encoder unavailable")));

    let second = pipeline.process(source("b.mp4")).await;
    assert!(matches!(second, Disposition::NormalizedReady(_)));
    assert_eq!(engine.load_count(), 2);
}

#[tokio::test]
async fn test_stage_failure_fails_job() {
    let engine = Arc::new(ScriptedEngine::new().dropping_writes());
    let pipeline = pipeline(
        engine.clone(),
        ScriptedProbe::returning(LANDSCAPE),
        Arc::new(FixedConsent::granted()),
    );

    let disposition = pipeline.process(source("a.mp4")).await;

    assert!(matches!(&disposition, Disposition::Failed(reason) if reason.contains("stage")));
    assert!(engine.last_transcode_args().is_none());
    assert_eq!(pipeline.snapshot().state, PipelineState::Failed);
}

#[tokio::test]
async fn test_encode_failure_fails_job() {
    let engine = Arc::new(ScriptedEngine::new().failing_encode(183));
    let pipeline = pipeline(
        engine.clone(),
        ScriptedProbe::returning(LANDSCAPE),
        Arc::new(FixedConsent::granted()),
    );

    let disposition = pipeline.process(source("a.mp4")).await;

    assert!(matches!(&disposition, Disposition::Failed(reason) if reason.contains("183")));
    assert!(!engine.has_file(OUTPUT_NAME));
    assert!(!engine.has_file(INPUT_NAME));
}

#[tokio::test]
async fn test_engine_initialized_once_across_files() {
    let engine = Arc::new(ScriptedEngine::new());
    let pipeline = pipeline(
        engine.clone(),
        ScriptedProbe::returning(LANDSCAPE),
        Arc::new(FixedConsent::granted()),
    );

    for name in ["a.mp4", "b.mp4"] {
        let disposition = pipeline.process(source(name)).await;
        assert!(matches!(disposition, Disposition::NormalizedReady(_)));
    }

    assert_eq!(engine.load_count(), 1);
    assert!(pipeline.session().is_loaded());
}

#[tokio::test]
async fn test_new_selection_cancels_in_flight_job() {
    let engine = Arc::new(ScriptedEngine::new().holding_encode());
    let probe = ScriptedProbe::returning(LANDSCAPE).with_file("vertical.mp4", VERTICAL);
    let consent = Arc::new(FixedConsent::granted());
    let pipeline = Arc::new(pipeline(engine.clone(), probe, consent));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.process(source("landscape.mp4")).await }
    });
    engine.encode_started().await;
    let calls_at_cancel = engine.calls().len();

    let second = pipeline.process(source("vertical.mp4")).await;
    assert!(matches!(second, Disposition::PassThrough(_)));
    assert_eq!(first.await.unwrap(), Disposition::Cancelled);

    // Nothing touched the engine after the cancellation point
    assert_eq!(engine.calls().len(), calls_at_cancel);

    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.state, PipelineState::PassThrough);
    assert_eq!(snapshot.percent, 0);
}

#[tokio::test]
async fn test_job_after_cancellation_clears_stale_output() {
    let engine = Arc::new(ScriptedEngine::new().holding_encode());
    let pipeline = Arc::new(pipeline(
        engine.clone(),
        ScriptedProbe::returning(LANDSCAPE),
        Arc::new(FixedConsent::granted()),
    ));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.process(source("a.mp4")).await }
    });
    engine.encode_started().await;
    let calls_at_cancel = engine.calls().len();

    let second = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.process(source("b.mp4")).await }
    });
    assert_eq!(first.await.unwrap(), Disposition::Cancelled);

    // Only the replacement job is left to wake
    engine.release_encode();
    assert!(matches!(second.await.unwrap(), Disposition::NormalizedReady(_)));
    assert_eq!(engine.load_count(), 1);

    let replacement = &engine.calls()[calls_at_cancel..];
    assert_eq!(replacement[0], EngineCall::Delete(OUTPUT_NAME.to_string()));
    assert_eq!(replacement[1], EngineCall::Write(INPUT_NAME.to_string()));
}

#[tokio::test]
async fn test_cancel_active_without_job() {
    let pipeline = pipeline(
        Arc::new(ScriptedEngine::new()),
        ScriptedProbe::returning(VERTICAL),
        Arc::new(FixedConsent::granted()),
    );
    assert!(!pipeline.cancel_active());

    pipeline.process(source("vertical.mp4")).await;
    assert!(!pipeline.cancel_active());
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_landscape_clip_is_letterboxed() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("landscape.mp4");
    let status = std::process::Command::new("ffmpeg")
        .args([
            "-y", "-v", "error",
            "-f", "lavfi", "-i", "testsrc=size=1920x1080:rate=30:duration=3",
            "-f", "lavfi", "-i", "sine=frequency=440:duration=3",
            "-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest",
        ])
        .arg(&clip)
        .status()
        .unwrap();
    assert!(status.success());

    let bytes = tokio::fs::read(&clip).await.unwrap();
    let pipeline = NormalizationPipeline::with_ffmpeg(
        &NormalizerConfig::default(),
        Arc::new(FixedConsent::granted()),
    );

    let disposition = pipeline
        .process(VideoSource::new(bytes, "landscape.mp4", "video/mp4"))
        .await;
    let Disposition::NormalizedReady(artifact) = disposition else {
        panic!("expected a normalized artifact, got {disposition:?}");
    };

    let output = VideoSource::new(artifact.bytes, "normalized.mp4", "video/mp4");
    let geometry = FfprobeProbe::new().probe(&output).await.unwrap();
    assert_eq!((geometry.width, geometry.height), (720, 1280));
    assert!(geometry.duration_ms <= 139_999);
}
