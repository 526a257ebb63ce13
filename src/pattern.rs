//! Pattern sources: JSON grids and images on disk, plus the built-in demo.
//!
//! ## Rust concepts
//! - `fs::read_dir()` for directory traversal
//! - `Path::extension()` and `matches!` to dispatch on file type
//! - `serde::Serialize` for automatic JSON conversion

use crate::{Grid, MatrixError, PanelConfig};
use image::imageops::FilterType;
use image::ImageReader;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Pixels at or above this luminance are lit when converting an image.
const LUMA_THRESHOLD: u8 = 128;

/// Information about one pattern file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PatternEntry {
    /// Filename (e.g., "heart.json")
    pub name: String,
    /// File size in bytes
    pub size: u64,
}

fn is_image(ext: &str) -> bool {
    matches!(ext, "png" | "jpg" | "jpeg")
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Scan `dir` for JSON and image patterns, sorted by name.
pub fn list_patterns(dir: &Path) -> Vec<PatternEntry> {
    let mut entries = Vec::new();

    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(_) => return entries,
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let supported = extension(&path).is_some_and(|e| e == "json" || is_image(&e));
        if supported {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let name = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned();
            entries.push(PatternEntry { name, size });
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// Load a pattern sized for `panel`.
///
/// JSON files hold nested arrays of 0/1 and must match the panel exactly.
/// Images are scaled to the panel and thresholded on luminance.
pub fn load_pattern(path: &Path, panel: PanelConfig) -> Result<Grid, MatrixError> {
    let grid = match extension(path).as_deref() {
        Some("json") => {
            let text = fs::read_to_string(path)
                .map_err(|e| MatrixError::Pattern(format!("{}: {e}", path.display())))?;
            serde_json::from_str::<Grid>(&text)
                .map_err(|e| MatrixError::Pattern(format!("{}: {e}", path.display())))?
        }
        Some(ext) if is_image(ext) => load_image(path, panel)?,
        _ => {
            return Err(MatrixError::Pattern(format!(
                "unsupported pattern file: {}",
                path.display()
            )));
        }
    };

    if grid.dimensions() != (panel.rows, panel.cols) {
        return Err(MatrixError::grid_mismatch(
            (panel.rows, panel.cols),
            grid.dimensions(),
        ));
    }
    Ok(grid)
}

fn load_image(path: &Path, panel: PanelConfig) -> Result<Grid, MatrixError> {
    let img = ImageReader::open(path)
        .map_err(|e| MatrixError::Pattern(format!("{}: {e}", path.display())))?
        .decode()
        .map_err(|e| MatrixError::Pattern(format!("{}: {e}", path.display())))?;
    let luma = img
        .resize_exact(panel.cols as u32, panel.rows as u32, FilterType::Triangle)
        .to_luma8();

    let rows = luma
        .rows()
        .map(|row| row.map(|pixel| pixel[0] >= LUMA_THRESHOLD).collect())
        .collect();
    Grid::from_rows(rows)
}

/// The "H" the display shows when no pattern is given, centred on the panel.
///
/// Fails only for a panel with no rows or no columns.
pub fn demo_pattern(panel: PanelConfig) -> Result<Grid, MatrixError> {
    const GLYPH: [[u8; 8]; 8] = [
        [0, 0, 0, 0, 0, 0, 0, 0],
        [0, 1, 1, 0, 0, 1, 1, 0],
        [0, 1, 1, 0, 0, 1, 1, 0],
        [0, 1, 1, 1, 1, 1, 1, 0],
        [0, 1, 1, 1, 1, 1, 1, 0],
        [0, 1, 1, 0, 0, 1, 1, 0],
        [0, 1, 1, 0, 0, 1, 1, 0],
        [0, 0, 0, 0, 0, 0, 0, 0],
    ];

    // Offset of the glyph's top-left corner; negative when the panel is
    // smaller than the glyph and it gets clipped.
    let top = (panel.rows as isize - 8) / 2;
    let left = (panel.cols as isize - 8) / 2;

    let rows = (0..panel.rows as isize)
        .map(|y| {
            (0..panel.cols as isize)
                .map(|x| {
                    let (gy, gx) = (y - top, x - left);
                    (0..8).contains(&gy)
                        && (0..8).contains(&gx)
                        && GLYPH[gy as usize][gx as usize] == 1
                })
                .collect()
        })
        .collect();

    Grid::from_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, contents: &[u8]) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn list_patterns_finds_supported_formats() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "heart.json", b"[[1]]");
        create_file(tmp.path(), "logo.png", b"fake");
        create_file(tmp.path(), "photo.JPG", b"fake");
        create_file(tmp.path(), "notes.txt", b"skip me");
        std::fs::create_dir(tmp.path().join("nested.json")).unwrap();

        let names: Vec<String> = list_patterns(tmp.path())
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["heart.json", "logo.png", "photo.JPG"]);
    }

    #[test]
    fn list_patterns_returns_empty_when_no_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(list_patterns(&tmp.path().join("missing")).is_empty());
    }

    #[test]
    fn load_json_pattern() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "diag.json", b"[[1,0],[0,1]]");

        let grid = load_pattern(&tmp.path().join("diag.json"), PanelConfig::new(2, 2)).unwrap();
        assert_eq!(grid.to_rows(), vec![vec![true, false], vec![false, true]]);
    }

    #[test]
    fn json_pattern_of_wrong_size_is_rejected() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "wide.json", b"[[1,0,1],[0,1,0]]");

        let result = load_pattern(&tmp.path().join("wide.json"), PanelConfig::new(2, 2));
        assert_eq!(result, Err(MatrixError::grid_mismatch((2, 2), (2, 3))));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "notes.txt", b"[[1]]");
        let result = load_pattern(&tmp.path().join("notes.txt"), PanelConfig::new(1, 1));
        assert!(matches!(result, Err(MatrixError::Pattern(_))));
    }

    #[test]
    fn image_is_thresholded_on_luminance() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("checker.png");
        let img = GrayImage::from_fn(2, 2, |x, y| {
            if x == y { Luma([255]) } else { Luma([0]) }
        });
        img.save(&path).unwrap();

        let grid = load_pattern(&path, PanelConfig::new(2, 2)).unwrap();
        assert_eq!(grid.to_rows(), vec![vec![true, false], vec![false, true]]);
    }

    #[test]
    fn demo_pattern_is_the_h_glyph_on_8x8() {
        let grid = demo_pattern(PanelConfig::new(8, 8)).unwrap();
        assert_eq!(grid.row(0), &[false; 8]);
        assert_eq!(
            grid.row(3),
            &[false, true, true, true, true, true, true, false]
        );
        assert_eq!(grid.lit_count(), 28);
    }

    #[test]
    fn demo_pattern_fits_any_panel() {
        for (rows, cols) in [(2, 2), (4, 16), (16, 4)] {
            let grid = demo_pattern(PanelConfig::new(rows, cols)).unwrap();
            assert_eq!(grid.dimensions(), (rows, cols));
        }
    }

    #[test]
    fn demo_pattern_rejects_empty_panel() {
        let result = demo_pattern(PanelConfig::new(8, 0));
        assert!(matches!(result, Err(MatrixError::Pattern(_))));
    }
}
