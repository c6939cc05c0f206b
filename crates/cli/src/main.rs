mod settings;

use std::error::Error;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use clap::Parser;

use facewatch_core::camera::domain::video_surface::VideoSurface;
use facewatch_core::detection::infrastructure::detector_factory::{
    create_detector, DetectorBackend, DetectorSpec,
};
use facewatch_core::detection::infrastructure::detector_loader::DetectorLoader;
use facewatch_core::pipeline::monitor_session::MonitorSession;
use facewatch_core::pipeline::pipeline_logger::LogPipelineLogger;
use facewatch_core::pipeline::render_loop::{RenderConfig, RenderLoop};
use facewatch_core::render::domain::render_surface::RenderSurface;
use facewatch_core::render::infrastructure::console_status_display::ConsoleStatusDisplay;
use facewatch_core::render::infrastructure::image_canvas::ImageCanvas;

use settings::{ModelChoice, Settings};

/// Watches a camera and alerts when no face or several faces are in view.
#[derive(Parser, Debug)]
#[command(name = "facewatch")]
struct Cli {
    /// Capture device (e.g. /dev/video0, "0" on macOS, "video=<name>" on Windows).
    #[arg(long)]
    device: Option<String>,

    /// libavdevice capture API (v4l2, avfoundation, dshow).
    #[arg(long)]
    input_format: Option<String>,

    /// Capture option as key=value (e.g. framerate=30); repeatable.
    #[arg(long = "device-option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    device_options: Vec<(String, String)>,

    /// Milliseconds between detection ticks.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Face detection model.
    #[arg(long, value_enum)]
    model: Option<ModelChoice>,

    /// Local model file; required for blazeface.
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Write the annotated frame to this PNG after every detection.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Enter.
    /// Without it, a closed stdin runs until the process is interrupted.
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Settings file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persist the effective settings to the settings file.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(Settings::default_path);
    let mut settings = config_path
        .as_deref()
        .map(Settings::load_from)
        .unwrap_or_default();
    apply_overrides(&mut settings, &cli);
    validate(&settings)?;

    if cli.save_settings {
        let path = config_path.ok_or("No config directory available to save settings")?;
        settings.save_to(&path)?;
        log::info!("Settings saved to {}", path.display());
    }

    let spec = DetectorSpec {
        backend: DetectorBackend::from(settings.model),
        model_path: settings.model_path.clone(),
        confidence: settings.confidence,
    };
    log::info!("Loading {} face model", spec.backend);
    let loader = DetectorLoader::spawn_cancellable(move |cancelled: &AtomicBool| {
        create_detector(&spec, Some(Box::new(download_progress)), cancelled)
    });

    let surface: Box<dyn RenderSurface> = match &settings.snapshot {
        Some(path) => Box::new(ImageCanvas::with_snapshot(path)),
        None => Box::new(ImageCanvas::new()),
    };
    let config = RenderConfig {
        tick_interval: Duration::from_millis(settings.interval_ms),
        ..RenderConfig::default()
    };
    let render_loop = RenderLoop::new(
        config,
        VideoSurface::new(),
        loader,
        surface,
        Box::new(ConsoleStatusDisplay::new()),
    )
    .with_logger(Box::new(LogPipelineLogger::default()));

    let mut device = settings.camera_device();
    log::debug!(
        "Camera {} via {} with options {:?}",
        device.device(),
        device.input_format(),
        device.options()
    );
    let session = MonitorSession::start(render_loop, &mut device);
    if let Some(e) = session.camera_error() {
        eprintln!("Camera unavailable: {e}");
    }

    wait_for_stop(cli.duration_secs)?;

    if let Some(summary) = session.teardown() {
        log::info!(
            "Stopped after {} ticks, {} frames rendered",
            summary.ticks,
            summary.rendered
        );
    }
    Ok(())
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(device) = &cli.device {
        settings.device = device.clone();
    }
    if let Some(input_format) = &cli.input_format {
        settings.input_format = input_format.clone();
    }
    settings
        .device_options
        .extend(cli.device_options.iter().cloned());
    if let Some(interval_ms) = cli.interval_ms {
        settings.interval_ms = interval_ms;
    }
    if let Some(confidence) = cli.confidence {
        settings.confidence = confidence;
    }
    if let Some(model) = cli.model {
        settings.model = model;
    }
    if cli.model_path.is_some() {
        settings.model_path = cli.model_path.clone();
    }
    if cli.snapshot.is_some() {
        settings.snapshot = cli.snapshot.clone();
    }
}

fn validate(settings: &Settings) -> Result<(), Box<dyn Error>> {
    if !(0.0..=1.0).contains(&settings.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            settings.confidence
        )
        .into());
    }
    if settings.interval_ms == 0 {
        return Err("Interval must be at least 1 ms".into());
    }
    if settings.device.trim().is_empty() {
        return Err("Device must not be empty".into());
    }
    if settings.input_format.trim().is_empty() {
        return Err("Input format must not be empty".into());
    }
    if settings.model == ModelChoice::Blazeface && settings.model_path.is_none() {
        return Err("The blazeface model needs --model-path".into());
    }
    Ok(())
}

fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{arg}'")),
    }
}

fn wait_for_stop(duration_secs: Option<u64>) -> io::Result<()> {
    if let Some(secs) = duration_secs {
        thread::sleep(Duration::from_secs(secs));
        return Ok(());
    }
    eprintln!("Monitoring. Press Enter to stop.");
    if !enter_pressed(&mut io::stdin().lock())? {
        log::info!("stdin is closed; monitoring until interrupted");
        loop {
            thread::park();
        }
    }
    Ok(())
}

/// True once a line is read; false when the input is already at EOF.
fn enter_pressed(input: &mut impl BufRead) -> io::Result<bool> {
    let mut line = String::new();
    Ok(input.read_line(&mut line)? > 0)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("facewatch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = parse(&[
            "--device",
            "/dev/video3",
            "--interval-ms",
            "200",
            "--confidence",
            "0.8",
            "--model",
            "blazeface",
            "--model-path",
            "/models/blazeface.onnx",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli);

        assert_eq!(settings.device, "/dev/video3");
        assert_eq!(settings.interval_ms, 200);
        assert!((settings.confidence - 0.8).abs() < f64::EPSILON);
        assert_eq!(settings.model, ModelChoice::Blazeface);
        assert_eq!(
            settings.model_path,
            Some(PathBuf::from("/models/blazeface.onnx"))
        );
        assert!(validate(&settings).is_ok());
    }

    #[test]
    fn test_absent_flags_keep_file_values() {
        let cli = parse(&[]);
        let mut settings = Settings {
            interval_ms: 900,
            snapshot: Some(PathBuf::from("/tmp/out.png")),
            ..Settings::default()
        };
        apply_overrides(&mut settings, &cli);
        assert_eq!(settings.interval_ms, 900);
        assert_eq!(settings.snapshot, Some(PathBuf::from("/tmp/out.png")));
    }

    #[test]
    fn test_validate_rejects_out_of_range_confidence() {
        let settings = Settings {
            confidence: 1.5,
            ..Settings::default()
        };
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("Confidence"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let settings = Settings {
            interval_ms: 0,
            ..Settings::default()
        };
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_blazeface_requires_model_path() {
        let settings = Settings {
            model: ModelChoice::Blazeface,
            ..Settings::default()
        };
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_device_options_are_collected() {
        let cli = parse(&[
            "--device-option",
            "framerate=30",
            "--device-option",
            "video_size = 1280x720",
        ]);
        let mut settings = Settings::default();
        settings.device_options.insert("framerate".into(), "15".into());
        apply_overrides(&mut settings, &cli);

        assert_eq!(
            settings.device_options.get("framerate").map(String::as_str),
            Some("30")
        );
        assert_eq!(
            settings.device_options.get("video_size").map(String::as_str),
            Some("1280x720")
        );
    }

    #[test]
    fn test_malformed_device_option_is_rejected() {
        assert!(Cli::try_parse_from(["facewatch", "--device-option", "framerate"]).is_err());
        assert!(Cli::try_parse_from(["facewatch", "--device-option", "=30"]).is_err());
    }

    #[test]
    fn test_closed_stdin_does_not_count_as_enter() {
        let mut closed = io::Cursor::new(Vec::new());
        assert!(!enter_pressed(&mut closed).unwrap());

        let mut enter = io::Cursor::new(b"\n".to_vec());
        assert!(enter_pressed(&mut enter).unwrap());
    }

    #[test]
    fn test_unknown_model_is_a_parse_error() {
        let result = Cli::try_parse_from(["facewatch", "--model", "ssd"]);
        assert!(result.is_err());
    }
}
