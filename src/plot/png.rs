use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::{ImageFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;

/// Drawing surface handed to the figure code.
pub type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Encode a packed RGB buffer as a PNG file.
pub fn save_png(path: &Path, buffer: Vec<u8>, width: u32, height: u32) -> Result<()> {
    let expected = width as usize * height as usize * 3;
    if buffer.len() != expected {
        return Err(anyhow!(
            "image buffer holds {} bytes, {width}x{height} RGB needs {expected}",
            buffer.len()
        ));
    }
    let img = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| anyhow!("cannot build a {width}x{height} image"))?;
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}

/// Draw a figure into a white in-memory canvas and save it as PNG.
pub fn render<F>(path: &Path, (width, height): (u32, u32), draw: F) -> Result<()>
where
    F: FnOnce(&Area<'_>) -> Result<()>,
{
    let mut buffer = vec![255u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }
    save_png(path, buffer, width, height)
}
