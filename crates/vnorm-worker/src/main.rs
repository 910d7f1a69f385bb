//! Video normalizer binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::Parser;
use tracing::{info, warn};

use vnorm_models::schedule::parse_scheduled_at;
use vnorm_models::{Disposition, PrivacyStatus, ScheduleRequest, VideoSource};
use vnorm_worker::{
    init_tracing, ArtifactUploader, ConsentProvider, FixedConsent, NormalizationPipeline,
    NormalizerConfig, PromptConsent, ScheduleClient,
};

#[derive(Parser)]
#[command(name = "vnorm")]
#[command(author, version, about = "Normalize a video to a 9:16 vertical clip and schedule it")]
struct Cli {
    /// Video file to normalize
    input: PathBuf,

    /// Reformat without asking
    #[arg(long, conflicts_with = "no")]
    yes: bool,

    /// Never reformat; stop if the video does not conform
    #[arg(long)]
    no: bool,

    /// Where to write the upload-ready video
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output canvas width
    #[arg(long)]
    canvas_width: Option<u32>,

    /// Output canvas height
    #[arg(long)]
    canvas_height: Option<u32>,

    /// Longest duration kept, in milliseconds
    #[arg(long)]
    max_duration_ms: Option<u64>,

    /// x264 constant rate factor
    #[arg(long)]
    crf: Option<u8>,

    /// Schedule publication at this local time (YYYY-MM-DDTHH:MM)
    #[arg(long, requires = "title")]
    schedule_at: Option<String>,

    /// Video title
    #[arg(long)]
    title: Option<String>,

    /// Video description
    #[arg(long, default_value = "")]
    description: String,

    /// Comma-separated tags
    #[arg(long, default_value = "")]
    tags: String,

    /// default, public or private
    #[arg(long, default_value = "public")]
    privacy: PrivacyStatus,

    /// YouTube category id
    #[arg(long, default_value = "1")]
    category: String,

    /// Thumbnail position in milliseconds
    #[arg(long, default_value_t = 0)]
    thumbnail_offset_ms: u64,
}

impl Cli {
    fn apply(&self, config: &mut NormalizerConfig) {
        if let Some(width) = self.canvas_width {
            config.canvas_width = width;
        }
        if let Some(height) = self.canvas_height {
            config.canvas_height = height;
        }
        if let Some(max) = self.max_duration_ms {
            config.max_duration_ms = max;
        }
        if let Some(crf) = self.crf {
            config.crf = crf;
        }
    }

    fn consent(&self) -> Arc<dyn ConsentProvider> {
        if self.yes {
            Arc::new(FixedConsent::granted())
        } else if self.no {
            Arc::new(FixedConsent::denied())
        } else {
            Arc::new(PromptConsent)
        }
    }

    fn schedule_request(&self) -> anyhow::Result<Option<ScheduleRequest>> {
        let Some(at) = self.schedule_at.as_deref() else {
            return Ok(None);
        };
        let mut request = ScheduleRequest::new(
            self.title.clone().unwrap_or_default(),
            parse_scheduled_at(at)?,
        );
        request.description = self.description.clone();
        request.tags = self.tags.clone();
        request.privacy = self.privacy;
        request.category_id = self.category.clone();
        request.thumbnail_offset_ms = self.thumbnail_offset_ms;
        Ok(Some(request))
    }
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    input.with_file_name(format!("{stem}.vertical.mp4"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = NormalizerConfig::from_env();
    cli.apply(&mut config);
    init_tracing(config.json_logs);

    // Validate schedule flags before spending time on an encode
    let schedule = cli.schedule_request()?;

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("cannot read {}", cli.input.display()))?;
    let source = VideoSource::new(bytes, source_name(&cli.input), content_type(&cli.input));

    let pipeline = Arc::new(NormalizationPipeline::with_ffmpeg(&config, cli.consent()));

    let mut progress = pipeline.subscribe_progress();
    let printer = tokio::spawn(async move {
        while let Some(event) = progress.changed().await {
            eprint!("\rEncoding: {:>3}%", event.percent);
            if event.is_complete() {
                eprintln!();
            }
        }
    });

    let interrupt = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                pipeline.cancel_active();
            }
        })
    };

    let disposition = pipeline.process(source).await;
    interrupt.abort();
    printer.abort();

    let (upload, file_name, mime_type): (Bytes, String, String) = match disposition {
        Disposition::PassThrough(bytes) => {
            info!("Video already conforms, no reformat needed");
            if let Some(output) = &cli.output {
                tokio::fs::write(output, &bytes).await?;
            }
            (bytes, source_name(&cli.input), content_type(&cli.input).to_string())
        }
        Disposition::NormalizedReady(artifact) => {
            let output = cli.output.clone().unwrap_or_else(|| default_output(&cli.input));
            tokio::fs::write(&output, &artifact.bytes)
                .await
                .with_context(|| format!("cannot write {}", output.display()))?;
            info!(output = %output.display(), bytes = artifact.bytes.len(), "Wrote normalized video");
            (artifact.bytes, source_name(&output), artifact.mime_type)
        }
        Disposition::Aborted => {
            info!("Reformat declined, nothing to upload");
            return Ok(());
        }
        Disposition::Failed(reason) => bail!(reason),
        Disposition::Cancelled => bail!("normalization cancelled"),
    };

    if let Some(request) = schedule {
        let client = ScheduleClient::new(&config.backend_url);
        let message = client.schedule(upload, &file_name, &mime_type, &request).await?;
        println!("{message}");
    }

    Ok(())
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("video")
        .to_string()
}
