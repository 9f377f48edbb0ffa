use image::{imageops, DynamicImage, Rgb, RgbImage};

use crate::core::config::VisionConfig;
use crate::core::error::VisionError;
use crate::vision::extractor::Extraction;

const GRID_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BRIGHT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Cells brighter than this are marked green on the overlay
const BRIGHT_CELL: u8 = 150;

/// Draw the sampling grid over the processed region
///
/// Each cell gets a centered marker colored by brightness and a bar along its
/// bottom edge whose length is proportional to the cell mean.
pub fn render_annotation(extraction: &Extraction, config: &VisionConfig) -> RgbImage {
    let scale = config.annotation_scale.max(1);
    let (width, height) = extraction.processed.dimensions();

    let rgb = DynamicImage::ImageLuma8(extraction.processed.clone()).to_rgb8();
    let mut canvas = imageops::resize(
        &rgb,
        width * scale,
        height * scale,
        imageops::FilterType::Nearest,
    );

    let cell_w = extraction.cell_width * scale;
    let cell_h = extraction.cell_height * scale;

    for (index, mean) in extraction.cell_means.iter().enumerate() {
        let row = index as u32 / config.grid_cols;
        let col = index as u32 % config.grid_cols;
        let x = col * cell_w;
        let y = row * cell_h;

        let color = if *mean > BRIGHT_CELL { BRIGHT_COLOR } else { DARK_COLOR };

        let marker = (cell_w.min(cell_h) / 3).max(1);
        fill_rect(
            &mut canvas,
            x + (cell_w - marker) / 2,
            y + (cell_h - marker) / 2,
            marker,
            marker,
            color,
        );

        let bar = (u32::from(*mean) * cell_w.saturating_sub(2)) / 255;
        let bar_y = (y + cell_h).saturating_sub(scale.min(cell_h) + 1);
        fill_rect(&mut canvas, x + 1, bar_y, bar, scale.min(cell_h), color);

        stroke_rect(&mut canvas, x, y, cell_w, cell_h, GRID_COLOR);
    }

    canvas
}

pub fn save_annotation(extraction: &Extraction, config: &VisionConfig) -> Result<(), VisionError> {
    let path = &config.annotated_path;
    let save_error = |reason: String| VisionError::AnnotationSave {
        path: path.display().to_string(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
    }

    render_annotation(extraction, config)
        .save(path)
        .map_err(|e| save_error(e.to_string()))
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    let x_end = (x + width).min(img.width());
    let y_end = (y + height).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

fn stroke_rect(img: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    fill_rect(img, x, y, width, 1, color);
    fill_rect(img, x, y + height - 1, width, 1, color);
    fill_rect(img, x, y, 1, height, color);
    fill_rect(img, x + width - 1, y, 1, height, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::extractor::tests::{marker_image, test_config};
    use crate::vision::extractor::BinaryExtractor;
    use tempfile::TempDir;

    #[test]
    fn test_overlay_dimensions_and_grid() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir.path().join("out.png"));
        let extraction = BinaryExtractor::new(config.clone())
            .extract_from_image(&marker_image("0100101010000000"))
            .unwrap();

        let overlay = render_annotation(&extraction, &config);
        assert_eq!(overlay.dimensions(), (80, 80));
        // Top-left corner sits on a grid line
        assert_eq!(*overlay.get_pixel(0, 0), GRID_COLOR);
    }

    #[test]
    fn test_cell_markers_follow_brightness() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir.path().join("out.png"));
        let extraction = BinaryExtractor::new(config.clone())
            .extract_from_image(&marker_image("1000000000000000"))
            .unwrap();

        let overlay = render_annotation(&extraction, &config);
        // Cells are 20x20 at scale 2; centers at (10, 10) and (30, 10)
        assert_eq!(*overlay.get_pixel(10, 10), BRIGHT_COLOR);
        assert_eq!(*overlay.get_pixel(30, 10), DARK_COLOR);
    }

    #[test]
    fn test_save_annotation_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pictures").join("output.png");
        let config = test_config(&path);
        let extraction = BinaryExtractor::new(config.clone())
            .extract_from_image(&marker_image("0000111100001111"))
            .unwrap();

        save_annotation(&extraction, &config).unwrap();
        assert!(path.exists());
    }
}
