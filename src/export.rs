//! Writing decoded bitmaps to disk.
//!
//! For every bitmap two files land in the output directory:
//! - `<label>.png` - set pixels black, clear pixels white
//! - `<label>.txt` - one line per row of `0`/`1` characters

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat, Luma};

use crate::codec::{BitMatrix, LabeledBitmap};
use crate::error::Result;

const INK: Luma<u8> = Luma([0]);
const PAPER: Luma<u8> = Luma([255]);

/// Render a matrix as a greyscale image.
pub fn to_image(matrix: &BitMatrix) -> GrayImage {
    GrayImage::from_fn(matrix.width() as u32, matrix.height() as u32, |x, y| {
        if matrix.get(x as usize, y as usize) {
            INK
        } else {
            PAPER
        }
    })
}

/// Write one bitmap as PNG.
pub fn write_png(matrix: &BitMatrix, path: &Path) -> Result<()> {
    to_image(matrix).save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Write one bitmap as a `0`/`1` text dump.
pub fn write_text(matrix: &BitMatrix, path: &Path) -> Result<()> {
    fs::write(path, matrix.to_text())?;
    Ok(())
}

/// Export every bitmap into `dir`, creating it if needed.
///
/// Returns the paths written, PNG then text for each bitmap.
pub fn export_bitmaps(dir: impl AsRef<Path>, bitmaps: &[LabeledBitmap]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(bitmaps.len() * 2);
    for bitmap in bitmaps {
        let png = dir.join(format!("{}.png", bitmap.label));
        write_png(&bitmap.matrix, &png)?;

        let txt = dir.join(format!("{}.txt", bitmap.label));
        write_text(&bitmap.matrix, &txt)?;

        tracing::info!("Saved {} (scale {})", png.display(), bitmap.scale);
        written.push(png);
        written.push(txt);
    }
    Ok(written)
}
