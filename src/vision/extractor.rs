//! Marker reader: captured photo -> fixed-length bit string.
//!
//! 1. Load as 8-bit grayscale.
//! 2. Gaussian blur the calibrated region of interest, reading neighbouring
//!    pixels outside it so its edges are not clamped.
//! 3. Crop the region of interest.
//! 4. Binarize at a fixed threshold.
//! 5. Split into a grid and average each cell, row-major.
//! 6. Cells brighter than the cell threshold read as '1'.
//!
//! Every call is independent; the same image and config always give the same
//! bits.

use image::{imageops, GrayImage};
use std::path::Path;
use tracing::{debug, warn};

use crate::core::config::VisionConfig;
use crate::core::error::VisionError;
use crate::vision::annotate::save_annotation;

/// Result of reading one captured image
#[derive(Debug, Clone)]
pub struct Extraction {
    /// One '0'/'1' per grid cell, row-major
    pub bits: String,
    /// Floor of the mean intensity of each cell, row-major
    pub cell_means: Vec<u8>,
    /// Region of interest after blur and binarization
    pub processed: GrayImage,
    pub cell_width: u32,
    pub cell_height: u32,
}

pub struct BinaryExtractor {
    config: VisionConfig,
}

impl BinaryExtractor {
    pub fn new(config: VisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Read the marker from an image file, writing the debug overlay if enabled
    pub fn extract(&self, path: &Path) -> Result<Extraction, VisionError> {
        let gray = load_grayscale(path)?;
        let extraction = self.extract_from_image(&gray)?;

        if self.config.annotate {
            if let Err(e) = save_annotation(&extraction, &self.config) {
                warn!(error = %e, "Failed to write annotated image");
            }
        }

        Ok(extraction)
    }

    pub fn extract_from_image(&self, gray: &GrayImage) -> Result<Extraction, VisionError> {
        let cfg = &self.config;

        check_roi(gray, cfg)?;
        let mut processed = blur_roi(gray, cfg);
        binarize(&mut processed, cfg.binarize_threshold);

        let (width, height) = processed.dimensions();
        let cell_width = width / cfg.grid_cols;
        let cell_height = height / cfg.grid_rows;
        if cell_width == 0 || cell_height == 0 {
            return Err(VisionError::GridTooFine {
                rows: cfg.grid_rows,
                cols: cfg.grid_cols,
                width,
                height,
            });
        }

        let cells = (cfg.grid_rows * cfg.grid_cols) as usize;
        let mut bits = String::with_capacity(cells);
        let mut cell_means = Vec::with_capacity(cells);

        for row in 0..cfg.grid_rows {
            for col in 0..cfg.grid_cols {
                let mean = cell_mean(
                    &processed,
                    col * cell_width,
                    row * cell_height,
                    cell_width,
                    cell_height,
                );
                bits.push(if mean > cfg.cell_threshold { '1' } else { '0' });
                cell_means.push(mean);
            }
        }

        debug!(bits = %bits, cell_means = ?cell_means, "Marker grid sampled");

        Ok(Extraction {
            bits,
            cell_means,
            processed,
            cell_width,
            cell_height,
        })
    }
}

pub fn load_grayscale(path: &Path) -> Result<GrayImage, VisionError> {
    let img = image::open(path).map_err(|e| VisionError::ImageLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let gray = img.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(VisionError::ImageLoad {
            path: path.display().to_string(),
            reason: "image is empty".to_string(),
        });
    }

    Ok(gray)
}

fn check_roi(gray: &GrayImage, cfg: &VisionConfig) -> Result<(), VisionError> {
    let (image_width, image_height) = gray.dimensions();

    let fits = |start: u32, len: u32, limit: u32| {
        start.checked_add(len).is_some_and(|end| end <= limit)
    };
    if !fits(cfg.crop_x, cfg.crop_width, image_width)
        || !fits(cfg.crop_y, cfg.crop_height, image_height)
    {
        return Err(VisionError::RoiOutOfBounds {
            x: cfg.crop_x,
            y: cfg.crop_y,
            width: cfg.crop_width,
            height: cfg.crop_height,
            image_width,
            image_height,
        });
    }

    Ok(())
}

/// Sigma implied by a kernel size when none is given explicitly
pub fn kernel_sigma(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Blur the region of interest in place within the full frame, then crop it
///
/// The blur runs over the ROI grown by one kernel width on each side (clamped
/// to the frame), so pixels near the ROI border mix with their real
/// neighbours. Only the frame border itself is edge-clamped.
fn blur_roi(gray: &GrayImage, cfg: &VisionConfig) -> GrayImage {
    if cfg.blur_kernel <= 1 {
        return imageops::crop_imm(gray, cfg.crop_x, cfg.crop_y, cfg.crop_width, cfg.crop_height)
            .to_image();
    }

    let (image_width, image_height) = gray.dimensions();
    let pad = cfg.blur_kernel;
    let x0 = cfg.crop_x.saturating_sub(pad);
    let y0 = cfg.crop_y.saturating_sub(pad);
    let x1 = (cfg.crop_x + cfg.crop_width).saturating_add(pad).min(image_width);
    let y1 = (cfg.crop_y + cfg.crop_height).saturating_add(pad).min(image_height);

    let context = imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image();
    let blurred = imageops::blur(&context, kernel_sigma(cfg.blur_kernel));

    imageops::crop_imm(
        &blurred,
        cfg.crop_x - x0,
        cfg.crop_y - y0,
        cfg.crop_width,
        cfg.crop_height,
    )
    .to_image()
}

fn binarize(img: &mut GrayImage, threshold: u8) {
    for pixel in img.pixels_mut() {
        pixel.0[0] = if pixel.0[0] >= threshold { 255 } else { 0 };
    }
}

fn cell_mean(img: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> u8 {
    let mut sum: u64 = 0;
    for py in y..y + height {
        for px in x..x + width {
            sum += u64::from(img.get_pixel(px, py).0[0]);
        }
    }

    let count = u64::from(width) * u64::from(height);
    if count == 0 {
        return 0;
    }
    // Mean of u8 samples always fits in u8
    (sum / count) as u8
}
