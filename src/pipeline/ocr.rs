//! OCR adapter around the `tesseract` subprocess.
//!
//! The engine runs LSTM-only (`--oem 1`) with inter-word spaces preserved,
//! which keeps column layouts in EOBs and medical charts readable to the
//! regex probes downstream. Engine failures are logged and yield empty text;
//! the caller decides whether an all-empty document is fatal.

use crate::error::ExtractError;
use crate::pipeline::preprocess;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Preprocess one page image and OCR it.
///
/// The preprocessed tile is written into `work_dir` and removed as soon as
/// the OCR engine returns, pass or fail. Preprocessing errors propagate;
/// OCR engine errors degrade to empty text.
pub async fn ocr_page(page: &Path, work_dir: &Path, lang: &str) -> Result<String, ExtractError> {
    let page_owned = page.to_path_buf();
    let processed = tokio::task::spawn_blocking(move || preprocess::preprocess(&page_owned))
        .await
        .map_err(|e| ExtractError::ImageRead {
            path: page.to_path_buf(),
            detail: format!("preprocess task panicked: {e}"),
        })??;

    let stem = page
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let tile = work_dir.join(format!("{stem}.ocr.png"));
    processed
        .save(&tile)
        .map_err(|e| ExtractError::io(&tile, std::io::Error::other(e)))?;

    let text = run_tesseract(&tile, lang).await;
    if let Err(e) = std::fs::remove_file(&tile) {
        warn!("failed to remove OCR tile {}: {e}", tile.display());
    }

    debug!("ocr {} -> {} bytes", page.display(), text.len());
    Ok(text)
}

/// Invoke tesseract on a preprocessed tile. Empty string on any engine
/// failure.
async fn run_tesseract(tile: &Path, lang: &str) -> String {
    let result = Command::new("tesseract")
        .arg(tile)
        .arg("stdout")
        .args(["-l", lang, "--oem", "1", "-c", "preserve_interword_spaces=1"])
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
        Ok(out) => {
            warn!(
                "tesseract exited with {} for {}: {}",
                out.status,
                tile.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
            String::new()
        }
        Err(e) => {
            warn!("failed to launch tesseract for {}: {e}", tile.display());
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreadable_page_propagates_image_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ocr_page(Path::new("/no/such/page.png"), dir.path(), "eng")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::ImageRead { .. }), "{err}");
    }

    #[tokio::test]
    async fn tile_is_removed_after_ocr() {
        use image::{GrayImage, Luma};

        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("scan.png");
        GrayImage::from_pixel(32, 32, Luma([255]))
            .save(&page)
            .unwrap();

        // Works whether or not tesseract is installed: engine failure still
        // returns Ok("") and still removes the tile.
        let _ = ocr_page(&page, dir.path(), "eng").await.unwrap();
        assert!(!dir.path().join("scan.png.ocr.png").exists());
    }
}
