use clap::{Parser, ValueEnum};
use donut_repair::{
    float_to_luma16, to_monochrome, Annotation, DownsamplingFactor, RepairConfig, RepairSession,
    Sampling,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "donut-repair")]
#[command(about = "Remove a dust donut from a single-channel image", long_about = None)]
struct Cli {
    #[arg(help = "Input image file path (single channel)")]
    input: PathBuf,

    #[arg(help = "Output image file path (16-bit grayscale)")]
    output: PathBuf,

    /// JSON file with the donut outline: {"points": [[x, y], ...], "downsampling": 2}
    #[arg(long, conflicts_with = "ellipse", required_unless_present = "ellipse")]
    annotation: Option<PathBuf>,

    /// Donut ellipse as CENTER_X,CENTER_Y,RADIUS_X,RADIUS_Y in preview pixels
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    ellipse: Option<Vec<f32>>,

    /// Ratio between full-resolution and preview coordinates
    #[arg(long)]
    downsampling: Option<f32>,

    /// JSON file overriding the repair constants
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    sampling: Option<SamplingArg>,

    /// Save the final correction field (working window only) to a separate file
    #[arg(long)]
    dump_field: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SamplingArg {
    Nearest,
    Bilinear,
}

impl From<SamplingArg> for Sampling {
    fn from(arg: SamplingArg) -> Self {
        match arg {
            SamplingArg::Nearest => Sampling::Nearest,
            SamplingArg::Bilinear => Sampling::Bilinear,
        }
    }
}

#[derive(Deserialize)]
struct AnnotationFile {
    #[serde(flatten)]
    annotation: Annotation,
    downsampling: Option<f32>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&text).map_err(|err| format!("Failed to parse {}: {err}", path.display()))
}

fn build_session(cli: &Cli) -> Result<RepairSession, String> {
    let (annotation, file_downsampling) = match (&cli.annotation, &cli.ellipse) {
        (Some(path), _) => {
            let file: AnnotationFile = read_json(path)?;
            (file.annotation, file.downsampling)
        }
        (None, Some(e)) => {
            if e.len() != 4 {
                return Err(format!("--ellipse expects 4 values, got {}", e.len()));
            }
            let annotation = Annotation::from_drag(
                [e[0] - e[2], e[1] - e[3]],
                [e[0] + e[2], e[1] + e[3]],
            );
            (annotation, None)
        }
        (None, None) => return Err("Either --annotation or --ellipse is required".to_string()),
    };

    let factor = cli.downsampling.or(file_downsampling).unwrap_or(1.0);
    let downsampling = DownsamplingFactor::new(factor).map_err(|err| err.to_string())?;

    let mut config = match &cli.config {
        Some(path) => read_json::<RepairConfig>(path)?,
        None => RepairConfig::default(),
    };
    if let Some(sampling) = cli.sampling {
        config.sampling = sampling.into();
    }

    Ok(RepairSession::new(annotation, downsampling).with_config(config))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let session = match build_session(&cli) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let image = match image::open(&cli.input) {
        Ok(img) => img,
        Err(err) => {
            eprintln!("Failed to open {}: {err}", cli.input.display());
            std::process::exit(1);
        }
    };

    let mut mono = match to_monochrome(&image) {
        Ok(mono) => mono,
        Err(err) => {
            eprintln!("Processing failed: {err}");
            std::process::exit(1);
        }
    };

    let correction = match session.compute(&mono, &mono) {
        Ok(correction) => correction,
        Err(err) => {
            eprintln!("Processing failed: {err}");
            std::process::exit(1);
        }
    };

    // Save the correction field if requested
    if let Some(field_path) = &cli.dump_field {
        if let Err(err) = float_to_luma16(correction.field()).save(field_path) {
            eprintln!("Failed to save correction field {}: {err}", field_path.display());
            std::process::exit(1);
        }
        println!("Saved correction field to {}", field_path.display());
    }

    let stats = match correction.apply(&mut mono) {
        Ok(stats) => stats,
        Err(err) => {
            eprintln!("Processing failed: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = float_to_luma16(&mono).save(&cli.output) {
        eprintln!("Failed to save {}: {err}", cli.output.display());
        std::process::exit(1);
    }
    println!(
        "Saved result to {} (correction factor {:.4})",
        cli.output.display(),
        stats.correction.factor
    );
}
