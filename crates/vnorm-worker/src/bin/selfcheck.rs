use std::sync::Arc;
use std::time::Duration;

use vnorm_media::{check_ffmpeg, check_ffprobe, EncoderSession, FfmpegEngine};
use vnorm_worker::NormalizerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = NormalizerConfig::from_env();

    println!(
        "vnorm-selfcheck: starting with canvas={}x{} max_duration_ms={} backend={}",
        config.canvas_width, config.canvas_height, config.max_duration_ms, config.backend_url
    );

    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    let ffprobe = check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    println!("vnorm-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    ensure_engine_loads(&config).await?;

    println!("vnorm-selfcheck: ok");
    Ok(())
}

async fn ensure_engine_loads(config: &NormalizerConfig) -> anyhow::Result<()> {
    let settings = config.encoder_settings();
    let engine = FfmpegEngine::new().with_timeout(settings.exec_timeout_secs.map(Duration::from_secs));
    let session = EncoderSession::new(Arc::new(engine), settings);

    session
        .ensure_loaded()
        .await
        .map_err(|e| anyhow::anyhow!("engine failed to load: {}", e))?;
    Ok(())
}
