use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod analyze;
mod config;
mod fetch;
mod report;

use acx_core::{FaceMesh, Landmarker, Sidecar};
use config::{AnalyzeConfig, Backend, Config, FetchConfig};
use report::{UnusableReport, UNUSABLE_REPORT_NAME};

#[derive(Parser)]
#[command(name = "acx", version, about = "Face pose metadata for photo galleries")]
struct Cli {
    /// Config file (default: acx.toml in the project root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging for acx crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces, embed pose XMP into sources and write WebP copies
    Analyze(AnalyzeArgs),
    /// Download portrait images for a list of keywords
    Fetch(FetchArgs),
}

#[derive(Args, Debug, Default)]
struct AnalyzeArgs {
    /// Directory containing source images
    #[arg(long)]
    in_dir: Option<PathBuf>,
    /// Directory for WebP display copies
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Max number of images to process (0 for no limit)
    #[arg(long)]
    limit: Option<usize>,
    /// Only process images missing the required pose metadata tags
    #[arg(long)]
    only_missing: bool,
    /// Also emit mirrored variants with a `_mirror` suffix
    #[arg(long)]
    mirror: bool,
    /// missing-pose-metadata.json used by --only-missing
    #[arg(long)]
    missing_report: Option<PathBuf>,
    /// Unusable image report (default: <out-dir>/unusable-images-report.json)
    #[arg(long)]
    unusable_report: Option<PathBuf>,
    /// Landmark backend
    #[arg(long, value_enum)]
    backend: Option<Backend>,
    /// Face mesh ONNX model
    #[arg(long)]
    model_path: Option<PathBuf>,
    /// Minimum face flag score of the face mesh network
    #[arg(long)]
    min_face_confidence: Option<f32>,
    /// Skip faces whose landmark confidence is below this
    #[arg(long)]
    min_landmark_confidence: Option<f64>,
}

impl AnalyzeArgs {
    fn apply(self, config: &mut AnalyzeConfig) {
        if let Some(v) = self.in_dir {
            config.in_dir = v;
        }
        if let Some(v) = self.out_dir {
            config.out_dir = v;
        }
        if let Some(v) = self.limit {
            config.limit = v;
        }
        if self.mirror {
            config.mirror = true;
        }
        if let Some(v) = self.missing_report {
            config.missing_report = v;
        }
        if let Some(v) = self.unusable_report {
            config.unusable_report = Some(v);
        }
        if let Some(v) = self.backend {
            config.backend = v;
        }
        if let Some(v) = self.model_path {
            config.model_path = Some(v);
        }
        if let Some(v) = self.min_face_confidence {
            config.min_face_confidence = v;
        }
        if let Some(v) = self.min_landmark_confidence {
            config.min_landmark_confidence = v;
        }
    }
}

#[derive(Args, Debug, Default)]
struct FetchArgs {
    /// Keywords file, one per line
    #[arg(long, alias = "csv")]
    keywords: Option<PathBuf>,
    /// Output directory
    #[arg(long, alias = "output")]
    out_dir: Option<PathBuf>,
    /// Minimum width
    #[arg(long)]
    width: Option<u32>,
    /// Minimum height
    #[arg(long)]
    height: Option<u32>,
    /// Images per keyword
    #[arg(long)]
    count: Option<usize>,
    /// Seconds to wait after each download
    #[arg(long)]
    delay: Option<f64>,
    /// Search region, e.g. wt-wt or us-en
    #[arg(long)]
    region: Option<String>,
    /// on, moderate or off
    #[arg(long)]
    safesearch: Option<acx_fetch::SafeSearch>,
}

impl FetchArgs {
    fn apply(self, config: &mut FetchConfig) {
        if let Some(v) = self.keywords {
            config.keywords = v;
        }
        if let Some(v) = self.out_dir {
            config.out_dir = v;
        }
        if let Some(v) = self.width {
            config.min_width = v;
        }
        if let Some(v) = self.height {
            config.min_height = v;
        }
        if let Some(v) = self.count {
            config.count = v;
        }
        if let Some(v) = self.delay {
            config.delay_secs = v;
        }
        if let Some(v) = self.region {
            config.region = v;
        }
        if let Some(v) = self.safesearch {
            config.safesearch = v;
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info,acx=debug,acx_core=debug,acx_xmp=debug,acx_fetch=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_landmarker(config: &Config) -> Result<Box<dyn Landmarker>> {
    match config.analyze.backend {
        Backend::FaceMesh => {
            let model = config.model_path();
            let mesh = FaceMesh::load(&model, config.analyze.min_face_confidence)
                .context("loading face mesh model (set --model-path or ACX_LANDMARKER_MODEL)")?;
            Ok(Box::new(mesh))
        }
        Backend::Sidecar => Ok(Box::new(Sidecar)),
    }
}

fn run_analyze(config: Config, only_missing: bool) -> Result<()> {
    let settings = &config.analyze;
    let in_dir = config.resolve(&settings.in_dir);
    if !in_dir.is_dir() {
        bail!("input directory {} does not exist", in_dir.display());
    }
    let out_dir = config.resolve(&settings.out_dir);
    let unusable_path = settings
        .unusable_report
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| config.resolve(p))
        .unwrap_or_else(|| out_dir.join(UNUSABLE_REPORT_NAME));

    let mut landmarker = load_landmarker(&config)?;
    tracing::info!(backend = landmarker.name(), in_dir = %in_dir.display(), "analyzing");

    let mut images = analyze::collect_images(&in_dir)?;
    if only_missing {
        let report_path = config.resolve(&settings.missing_report);
        let listed = analyze::load_missing_report_paths(&in_dir, &report_path);
        if listed.is_empty() {
            images.retain(|p| !acx_xmp::file_has_required_pose_xmp(p));
            println!("Found {} images missing required pose metadata.", images.len());
        } else {
            println!(
                "Found {} images from {} missing required pose metadata.",
                listed.len(),
                report_path.display()
            );
            images = listed;
        }
    }

    let options = analyze::AnalyzeOptions {
        out_dir,
        upscale_averaging: !only_missing,
        mirror: settings.mirror,
        min_landmark_confidence: settings.min_landmark_confidence,
    };
    let report = analyze::run(landmarker.as_mut(), &images, settings.limit, &options)?;

    println!("Done. Processed {} images.", report.total_images);
    print!("{}", report.render());
    UnusableReport::build(&report, &in_dir).write(&unusable_path)?;
    println!("Unusable image report written to {}", unusable_path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze(args) => {
            let only_missing = args.only_missing;
            args.apply(&mut config.analyze);
            tokio::task::spawn_blocking(move || run_analyze(config, only_missing))
                .await
                .context("analyze worker panicked")??;
        }
        Commands::Fetch(args) => {
            args.apply(&mut config.fetch);
            fetch::run(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_analyze_flags() {
        let cli = Cli::try_parse_from([
            "acx", "-v", "analyze", "--in-dir", "photos", "--limit", "3", "--mirror",
            "--backend", "sidecar", "--only-missing",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert!(args.only_missing);

        let mut config = AnalyzeConfig::default();
        args.apply(&mut config);
        assert_eq!(config.in_dir, PathBuf::from("photos"));
        assert_eq!(config.limit, 3);
        assert!(config.mirror);
        assert_eq!(config.backend, Backend::Sidecar);
        // Untouched flags keep file/default values.
        assert_eq!(config.out_dir, PathBuf::from("processed-images"));
    }

    #[test]
    fn test_cli_fetch_aliases() {
        let cli = Cli::try_parse_from([
            "acx", "fetch", "--csv", "names.txt", "--output", "dl", "--count", "2",
            "--safesearch", "off",
        ])
        .unwrap();
        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        let mut config = FetchConfig::default();
        args.apply(&mut config);
        assert_eq!(config.keywords, PathBuf::from("names.txt"));
        assert_eq!(config.out_dir, PathBuf::from("dl"));
        assert_eq!(config.count, 2);
        assert_eq!(config.safesearch, acx_fetch::SafeSearch::Off);
        assert_eq!(config.min_width, 1000);
    }

    #[test]
    fn test_run_analyze_rejects_missing_input_dir() {
        let mut config = Config::default();
        config.analyze.in_dir = PathBuf::from("/nonexistent/acx-input");
        config.analyze.backend = Backend::Sidecar;
        assert!(run_analyze(config, false).is_err());
    }
}
