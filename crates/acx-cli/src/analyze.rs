//! Analyze engine: detect faces, embed pose metadata, write display copies.

use crate::report::DetectionReport;
use acx_core::variants::{average_landmarks, average_transform, mirror_landmarks, mirror_metrics};
use acx_core::{compute_face_metrics, Detection, Landmarker};
use acx_xmp::{display_name, generate_xmp, write_xmp_to_source};
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];
const MIRROR_SUFFIX: &str = "_mirror";
const UPSCALE_FACTOR: u32 = 2;

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub out_dir: PathBuf,
    /// Average in a detection on a 2× upscaled copy when it succeeds.
    pub upscale_averaging: bool,
    pub mirror: bool,
    pub min_landmark_confidence: f64,
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_mirror(path: &Path) -> bool {
    stem_of(path).ends_with(MIRROR_SUFFIX)
}

/// Regular files under `dir`. Symlinked directories are not descended into;
/// unreadable subtrees are skipped. Only a failure on `dir` itself is an error.
fn walk_files(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Supported images under `dir`, recursively, mirrors excluded, sorted.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let files = walk_files(dir).with_context(|| format!("scanning {}", dir.display()))?;
    let mut images: Vec<PathBuf> = files
        .into_iter()
        .filter(|p| is_supported(p) && !is_mirror(p))
        .collect();
    images.sort();
    Ok(images)
}

#[derive(Debug, Deserialize)]
struct MissingReport {
    #[serde(default)]
    missing: Vec<serde_json::Value>,
}

/// Images listed in a missing-metadata report, resolved against `in_dir`.
///
/// Each `missing[].file` entry is tried relative to `in_dir`, then its parent,
/// then by file name anywhere under `in_dir`. Unresolvable entries and mirror
/// variants are dropped. An unreadable report yields an empty list.
pub fn load_missing_report_paths(in_dir: &Path, report_path: &Path) -> Vec<PathBuf> {
    let report: MissingReport = match std::fs::read_to_string(report_path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
    {
        Ok(report) => report,
        Err(e) => {
            tracing::debug!(path = %report_path.display(), error = %e, "missing-metadata report unavailable");
            return Vec::new();
        }
    };

    let mut all_files: Option<Vec<PathBuf>> = None;
    let parent = in_dir.parent().unwrap_or(in_dir);
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for entry in &report.missing {
        let Some(file) = entry.get("file").and_then(|f| f.as_str()) else {
            continue;
        };
        if file.trim().is_empty() {
            continue;
        }
        let relative = Path::new(file);

        let mut chosen = [in_dir.join(relative), parent.join(relative)]
            .into_iter()
            .find(|c| c.exists() && is_supported(c));

        if chosen.is_none() {
            if let Some(name) = relative.file_name() {
                let files = all_files.get_or_insert_with(|| {
                    let mut files = walk_files(in_dir).unwrap_or_else(|e| {
                        tracing::warn!(dir = %in_dir.display(), error = %e, "cannot scan input dir");
                        Vec::new()
                    });
                    files.sort();
                    files
                });
                chosen = files
                    .iter()
                    .find(|f| f.file_name() == Some(name) && f.is_file() && is_supported(f))
                    .cloned();
            }
        }

        match chosen {
            Some(path) if !is_mirror(&path) => {
                if seen.insert(path.clone()) {
                    resolved.push(path);
                }
            }
            _ => {}
        }
    }

    resolved.sort();
    resolved
}

/// Encode for `path`'s format, converting pixel layouts the encoder rejects.
fn save_image(image: &DynamicImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("unknown image format for {}", path.display()))?;
    let encodable = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ if image.color().has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    };
    encodable
        .save_with_format(path, format)
        .with_context(|| format!("writing {}", path.display()))
}

/// Detect on a 2× Catmull-Rom upscale and average with `primary`.
///
/// The second pass only counts when it yields both landmarks and a transform.
fn refine_with_upscale(
    landmarker: &mut dyn Landmarker,
    image: &DynamicImage,
    path: &Path,
    primary: Detection,
) -> Detection {
    let (width, height) = image.dimensions();
    let upscaled = image.resize_exact(
        width * UPSCALE_FACTOR,
        height * UPSCALE_FACTOR,
        FilterType::CatmullRom,
    );
    match landmarker.detect(&upscaled, path) {
        Ok(Some(Detection {
            landmarks,
            transform: Some(second),
            ..
        })) => {
            let transform = primary.transform.map(|t| average_transform(&t, &second));
            Detection {
                landmarks: average_landmarks(&primary.landmarks, &landmarks),
                transform,
                score: primary.score,
            }
        }
        Ok(_) => primary,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "upscaled averaging skipped");
            primary
        }
    }
}

/// Run the full pipeline on one image, recording the outcome in `report`.
pub fn process_image(
    landmarker: &mut dyn Landmarker,
    path: &Path,
    options: &AnalyzeOptions,
    report: &mut DetectionReport,
) {
    report.total_images += 1;
    tracing::debug!(path = %path.display(), "processing");

    let image = match image::open(path) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot decode image, skipping");
            report.record_unreadable(path);
            return;
        }
    };

    let detection = match landmarker.detect(&image, path) {
        Ok(Some(detection)) => detection,
        Ok(None) => {
            report.record_no_face(path);
            return;
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "landmarker error");
            report.record_error(path, e.kind());
            return;
        }
    };
    if detection.transform.is_none() {
        report.record_missing_matrix(path);
        return;
    }

    let detection = if options.upscale_averaging && landmarker.needs_pixels() {
        refine_with_upscale(landmarker, &image, path, detection)
    } else {
        detection
    };

    let metrics = match compute_face_metrics(
        &detection.landmarks,
        detection.transform.as_ref(),
        detection.score as f64,
    ) {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "metrics failed");
            report.record_error(path, "too_few_landmarks");
            return;
        }
    };

    if metrics.landmark_confidence < options.min_landmark_confidence {
        tracing::info!(
            path = %path.display(),
            confidence = metrics.landmark_confidence,
            threshold = options.min_landmark_confidence,
            "low landmark confidence, skipped"
        );
        report.record_low_confidence(path);
        return;
    }

    let stem = stem_of(path);
    let name = display_name(&stem);
    let packet = generate_xmp(&metrics, &name, &detection.landmarks);
    match write_xmp_to_source(path, &packet) {
        Ok(outcome) => tracing::debug!(path = %path.display(), ?outcome, "wrote XMP"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot write XMP"),
    }

    let webp_path = options.out_dir.join(format!("{stem}.webp"));
    if let Err(e) = save_image(&image, &webp_path) {
        tracing::warn!(path = %webp_path.display(), error = %e, "cannot write WebP");
    }

    tracing::info!(
        path = %path.display(),
        pitch = metrics.pitch,
        yaw = metrics.yaw,
        roll = metrics.roll,
        "analyzed"
    );

    if options.mirror && !stem.ends_with(MIRROR_SUFFIX) {
        write_mirror(&image, path, &stem, &name, &metrics, &detection, options);
    }
}

fn write_mirror(
    image: &DynamicImage,
    path: &Path,
    stem: &str,
    name: &str,
    metrics: &acx_core::FaceMetrics,
    detection: &Detection,
    options: &AnalyzeOptions,
) {
    let flipped = image.fliph();
    let landmarks = mirror_landmarks(&detection.landmarks);
    let mirrored = match mirror_metrics(metrics, &landmarks) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot mirror metrics");
            return;
        }
    };
    let packet = generate_xmp(&mirrored, &format!("{name} Mirror"), &landmarks);

    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mirror_source = path.with_file_name(format!("{stem}{MIRROR_SUFFIX}{ext}"));
    match save_image(&flipped, &mirror_source) {
        Ok(()) => {
            if let Err(e) = write_xmp_to_source(&mirror_source, &packet) {
                tracing::warn!(path = %mirror_source.display(), error = %e, "cannot write XMP");
            }
        }
        Err(e) => tracing::warn!(path = %mirror_source.display(), error = %e, "cannot write mirrored source"),
    }

    let webp_path = options.out_dir.join(format!("{stem}{MIRROR_SUFFIX}.webp"));
    if let Err(e) = save_image(&flipped, &webp_path) {
        tracing::warn!(path = %webp_path.display(), error = %e, "cannot write mirrored WebP");
    }
}

/// Process `images` in order, stopping after `limit` when non-zero.
pub fn run(
    landmarker: &mut dyn Landmarker,
    images: &[PathBuf],
    limit: usize,
    options: &AnalyzeOptions,
) -> Result<DetectionReport> {
    std::fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("creating {}", options.out_dir.display()))?;

    let mut report = DetectionReport::default();
    let take = if limit > 0 { limit } else { images.len() };
    for path in images.iter().take(take) {
        process_image(landmarker, path, options, &mut report);
    }
    Ok(report)
}
