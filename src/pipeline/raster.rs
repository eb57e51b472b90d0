//! PDF rasterization via the `pdftoppm` subprocess.
//!
//! The rasterizer is an external collaborator: we shell out to poppler's
//! `pdftoppm`, which writes one PNG per page into the per-document workspace.
//! pdftoppm zero-pads page numbers in its output names, so a lexicographic
//! sort restores page order.

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Render resolution handed to pdftoppm.
const RASTER_DPI: &str = "150";

/// Rasterize a PDF into ordered page PNGs inside `work_dir`.
///
/// Fails with [`ExtractError::Rasterization`] when the tool cannot be
/// launched, exits nonzero, or produces zero pages.
pub async fn rasterize(pdf: &Path, work_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let prefix = work_dir.join("page");

    let output = Command::new("pdftoppm")
        .args(["-png", "-r", RASTER_DPI])
        .arg(pdf)
        .arg(&prefix)
        .output()
        .await
        .map_err(|e| ExtractError::Rasterization {
            path: pdf.to_path_buf(),
            detail: format!("failed to launch pdftoppm: {e}"),
        })?;

    if !output.status.success() {
        return Err(ExtractError::Rasterization {
            path: pdf.to_path_buf(),
            detail: format!(
                "pdftoppm exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let mut pages: Vec<PathBuf> = std::fs::read_dir(work_dir)
        .map_err(|e| ExtractError::io(work_dir, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("png"))
                .unwrap_or(false)
        })
        .collect();
    pages.sort();

    if pages.is_empty() {
        return Err(ExtractError::Rasterization {
            path: pdf.to_path_buf(),
            detail: "no pages produced".into(),
        });
    }

    debug!("rasterized {} -> {} pages", pdf.display(), pages.len());
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_pdf_is_a_rasterization_error() {
        // Fails either way: pdftoppm absent (launch error) or present
        // (nonzero exit on a nonexistent input).
        let dir = tempfile::tempdir().unwrap();
        let err = rasterize(Path::new("/no/such/file.pdf"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Rasterization { .. }), "{err}");
    }
}
