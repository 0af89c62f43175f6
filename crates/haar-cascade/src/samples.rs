use std::fs;
use std::path::{Path, PathBuf};

use ::image::imageops::{self, FilterType};
use ::image::{GrayImage, ImageReader};

use crate::core::{GridError, IntegralGrid, PixelGridView};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced while turning image files into training windows.
#[derive(thiserror::Error, Debug)]
pub enum SampleError {
    #[error("failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("no readable images in {0}")]
    Empty(PathBuf),
}

/// Borrow an `image::GrayImage` as a core pixel view.
pub fn pixel_view(img: &GrayImage) -> Result<PixelGridView<'_>, GridError> {
    PixelGridView::new(img.width() as usize, img.height() as usize, img.as_raw())
}

/// Integral grid of a whole grayscale image.
pub fn integral_from_image(img: &GrayImage) -> Result<IntegralGrid, GridError> {
    Ok(IntegralGrid::new(&pixel_view(img)?))
}

/// Integral grid of `img` after resizing it to `window × window`.
pub fn window_integral(img: &GrayImage, window: usize) -> Result<IntegralGrid, GridError> {
    let side = window as u32;
    if img.width() == side && img.height() == side {
        return integral_from_image(img);
    }
    let resized = imageops::resize(img, side, side, FilterType::Triangle);
    integral_from_image(&resized)
}

/// Load every decodable image in `dir` as a `window × window` training
/// sample.
///
/// Files are visited in path order so repeated runs see the same sample
/// order. Files that fail to decode are skipped with a warning.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(dir), fields(dir = %dir.as_ref().display())))]
pub fn load_window_samples(
    dir: impl AsRef<Path>,
    window: usize,
) -> Result<Vec<IntegralGrid>, SampleError> {
    let dir = dir.as_ref();
    let read_dir = |source| SampleError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir)? {
        let path = entry.map_err(read_dir)?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut samples = Vec::with_capacity(paths.len());
    for path in &paths {
        let decoded = ImageReader::open(path)
            .map_err(::image::ImageError::IoError)
            .and_then(|r| r.with_guessed_format().map_err(::image::ImageError::IoError))
            .and_then(|r| r.decode());
        match decoded {
            Ok(img) => samples.push(window_integral(&img.to_luma8(), window)?),
            Err(err) => log::warn!("skipping {}: {err}", path.display()),
        }
    }

    if samples.is_empty() {
        return Err(SampleError::Empty(dir.to_path_buf()));
    }
    log::info!("loaded {} samples from {}", samples.len(), dir.display());
    Ok(samples)
}
