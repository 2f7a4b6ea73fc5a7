use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use faceswap_core::frames::infrastructure::image_file_reader::ImageFileReader;
use faceswap_core::frames::infrastructure::image_file_writer::ImageFileWriter;
use faceswap_core::pipeline::frame_processor::FrameProcessor;
use faceswap_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use faceswap_core::pipeline::source_face::is_image_path;
use faceswap_core::pipeline::swap_frames_use_case::SwapFramesUseCase;
use faceswap_core::pipeline::swap_image_use_case::SwapImageUseCase;
use faceswap_core::pipeline::swap_settings::{default_execution_threads, SwapSettings};
use faceswap_core::shared::execution_provider::{
    preferred_execution_providers, ExecutionProvider,
};
use faceswap_core::shared::model_resolver::{ensure_models, ModelPaths};

/// Swap the face from a source image into a target image or a directory of
/// extracted video frames.
#[derive(Parser)]
#[command(name = "faceswap")]
struct Cli {
    /// Image containing the face to swap in.
    source: PathBuf,

    /// Target image, or a directory of extracted frames processed in place.
    target: PathBuf,

    /// Output image (required when TARGET is an image).
    output: Option<PathBuf>,

    /// Swap every face in the target instead of only the left-most one.
    #[arg(long)]
    many_faces: bool,

    /// ONNX Runtime backend: cpu, coreml or directml. Repeat to set a fallback order.
    #[arg(long = "execution-provider", value_name = "PROVIDER")]
    execution_providers: Vec<ExecutionProvider>,

    /// Worker threads for frame directories (default: available parallelism).
    #[arg(long)]
    execution_threads: Option<usize>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Directory with pre-downloaded model files, checked before downloading.
    #[arg(long)]
    models_dir: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = settings(&cli);
    log::info!(
        "Execution providers: {}",
        settings
            .execution_providers
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let models = resolve_models(cli.models_dir.as_deref())?;
    let processor = FrameProcessor::new(
        settings.lazy_analyser(&models),
        settings.lazy_swapper(&models),
        settings.many_faces,
    );
    let mut logger = StdoutPipelineLogger::default();

    if cli.target.is_dir() {
        let frame_paths = list_frames(&cli.target)?;
        log::info!(
            "Found {} frames in {}, using {} thread(s)",
            frame_paths.len(),
            cli.target.display(),
            settings.execution_threads
        );
        let use_case = SwapFramesUseCase::new(
            Box::new(ImageFileReader::new()),
            Box::new(ImageFileWriter::new()),
            processor,
            settings.frame_executor(),
        );
        use_case.execute(&cli.source, &frame_paths, &mut logger)?;
        log::info!("Frames written in place to {}", cli.target.display());
    } else {
        let output = cli.output.as_deref().ok_or("OUTPUT is required for an image target")?;
        let use_case = SwapImageUseCase::new(
            Box::new(ImageFileReader::new()),
            Box::new(ImageFileWriter::new()),
            processor,
        );
        use_case.execute(&cli.source, &cli.target, output, &mut logger)?;
        log::info!("Output written to {}", output.display());
    }

    logger.summary();
    Ok(())
}

fn settings(cli: &Cli) -> SwapSettings {
    let execution_providers = if cli.execution_providers.is_empty() {
        preferred_execution_providers()
    } else {
        cli.execution_providers.clone()
    };
    SwapSettings {
        many_faces: cli.many_faces,
        execution_providers,
        execution_threads: cli
            .execution_threads
            .unwrap_or_else(default_execution_threads),
        confidence: cli.confidence,
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.source.is_file() {
        return Err(format!("Source image not found: {}", cli.source.display()).into());
    }
    if !is_image_path(&cli.source) {
        return Err(format!("Source must be an image file: {}", cli.source.display()).into());
    }
    if cli.target.is_dir() {
        if cli.output.is_some() {
            return Err("OUTPUT is not used when TARGET is a frame directory; frames are overwritten in place".into());
        }
    } else if cli.target.is_file() {
        if !is_image_path(&cli.target) {
            return Err(format!(
                "Target must be an image file or a directory of frames: {}",
                cli.target.display()
            )
            .into());
        }
        match &cli.output {
            None => return Err("OUTPUT is required when TARGET is an image".into()),
            Some(output) if !is_image_path(output) => {
                return Err(format!(
                    "Output must have an image extension: {}",
                    output.display()
                )
                .into())
            }
            Some(_) => {}
        }
    } else {
        return Err(format!("Target not found: {}", cli.target.display()).into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.execution_threads == Some(0) {
        return Err("Execution threads must be at least 1".into());
    }
    Ok(())
}

/// Image files directly inside `dir`, sorted by file name.
fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_path(&path) {
            frames.push(path);
        }
    }
    if frames.is_empty() {
        return Err(format!("No image frames found in {}", dir.display()).into());
    }
    frames.sort();
    Ok(frames)
}

static DOWNLOADING: AtomicBool = AtomicBool::new(false);

fn resolve_models(models_dir: Option<&Path>) -> Result<ModelPaths, Box<dyn std::error::Error>> {
    let models = ensure_models(models_dir, Some(download_progress))?;
    if DOWNLOADING.swap(false, Ordering::Relaxed) {
        eprintln!();
    }
    log::debug!("Models: {models:?}");
    Ok(models)
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    DOWNLOADING.store(true, Ordering::Relaxed);
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
