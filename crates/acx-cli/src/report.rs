//! Run reports: the console summary and the unusable-image JSON.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const UNUSABLE_REPORT_NAME: &str = "unusable-images-report.json";
const TOP_ERROR_TYPES: usize = 8;

/// Outcome tallies for one analyze run.
#[derive(Debug, Default)]
pub struct DetectionReport {
    pub total_images: usize,
    /// The landmarker ran and found no face.
    pub landmarker_no_face: Vec<PathBuf>,
    /// Every image without a usable detection, whatever the reason.
    pub no_face: Vec<PathBuf>,
    pub missing_matrix: Vec<PathBuf>,
    pub errors: Vec<PathBuf>,
    pub low_confidence: Vec<PathBuf>,
    pub error_types: BTreeMap<String, usize>,
}

impl DetectionReport {
    pub fn record_unreadable(&mut self, path: &Path) {
        self.no_face.push(path.to_path_buf());
    }

    pub fn record_error(&mut self, path: &Path, kind: &str) {
        self.errors.push(path.to_path_buf());
        *self.error_types.entry(kind.to_string()).or_default() += 1;
        self.no_face.push(path.to_path_buf());
    }

    pub fn record_no_face(&mut self, path: &Path) {
        self.landmarker_no_face.push(path.to_path_buf());
        self.no_face.push(path.to_path_buf());
    }

    pub fn record_missing_matrix(&mut self, path: &Path) {
        self.missing_matrix.push(path.to_path_buf());
        self.no_face.push(path.to_path_buf());
    }

    pub fn record_low_confidence(&mut self, path: &Path) {
        self.low_confidence.push(path.to_path_buf());
    }

    /// Most frequent error kinds first, ties by name.
    pub fn top_error_types(&self) -> Vec<(&str, usize)> {
        let mut types: Vec<(&str, usize)> = self
            .error_types
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        types.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        types.truncate(TOP_ERROR_TYPES);
        types
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Detection report:");
        let _ = writeln!(out, "- Total images processed: {}", self.total_images);
        let _ = writeln!(out, "- Landmarker returned no face: {}", self.landmarker_no_face.len());
        let _ = writeln!(out, "- Missing transformation matrix: {}", self.missing_matrix.len());
        let _ = writeln!(out, "- Landmarker errors: {}", self.errors.len());
        let _ = writeln!(out, "- Low landmark confidence (skipped): {}", self.low_confidence.len());
        let _ = writeln!(out, "- No usable detection: {}", self.no_face.len());

        let top = self.top_error_types();
        if !top.is_empty() {
            let _ = writeln!(out, "Error types:");
            for (kind, count) in top {
                let _ = writeln!(out, "  - {kind}: {count}");
            }
        }

        if !self.no_face.is_empty() {
            let _ = writeln!(out, "No-face images:");
            let mut sorted: Vec<&PathBuf> = self.no_face.iter().collect();
            sorted.sort();
            for path in sorted {
                let _ = writeln!(out, "  - {}", path.display());
            }
        }
        out
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByCategory {
    pub no_face_or_detection_error: Vec<String>,
    pub low_landmark_confidence: Vec<String>,
}

/// Images a caller may want to delete, in the format scripts consume.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnusableReport {
    pub input_dir: String,
    pub total_images_processed: usize,
    pub no_face_count: usize,
    pub low_confidence_count: usize,
    pub deletion_candidate_count: usize,
    pub deletion_candidates: Vec<String>,
    pub by_category: ByCategory,
    pub error_types: BTreeMap<String, usize>,
}

/// `path` relative to `root` when it lies inside it, else unchanged.
pub fn relative_to(path: &Path, root: &Path) -> String {
    let canonical = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    let (path_abs, root_abs) = (canonical(path), canonical(root));
    match path_abs.strip_prefix(&root_abs) {
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

impl UnusableReport {
    pub fn build(report: &DetectionReport, input_root: &Path) -> Self {
        let relative = |paths: &[PathBuf]| -> BTreeSet<String> {
            paths.iter().map(|p| relative_to(p, input_root)).collect()
        };
        let no_face = relative(&report.no_face);
        let low_confidence = relative(&report.low_confidence);
        let deletion_candidates: Vec<String> = no_face.union(&low_confidence).cloned().collect();

        Self {
            input_dir: input_root.display().to_string(),
            total_images_processed: report.total_images,
            no_face_count: no_face.len(),
            low_confidence_count: low_confidence.len(),
            deletion_candidate_count: deletion_candidates.len(),
            deletion_candidates,
            by_category: ByCategory {
                no_face_or_detection_error: no_face.into_iter().collect(),
                low_landmark_confidence: low_confidence.into_iter().collect(),
            },
            error_types: report.error_types.clone(),
        }
    }

    /// Write as pretty JSON with a trailing newline, creating parent dirs.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
