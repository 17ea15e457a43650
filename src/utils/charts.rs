//! SVG heatmap rendering for confusion matrices.
//!
//! Produces a standalone annotated SVG usable directly in reports. This is
//! the visualization collaborator for the evaluation module; the numeric
//! metrics never depend on it.

use std::fs;
use std::path::Path;

use crate::utils::metrics::ConfusionMatrix;

const CELL_SIZE: f64 = 80.0;
const MARGIN_TOP: f64 = 70.0;
const MARGIN_LEFT: f64 = 110.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 90.0;

const COLOR_TEXT: &str = "#2c3e50";
const COLOR_GRID: &str = "#bdc3c7";

/// Render an annotated confusion-matrix heatmap to an SVG file.
///
/// Rows are actual classes, columns predicted classes. Cell shading scales
/// with the count relative to the matrix maximum.
pub fn confusion_heatmap(
    cm: &ConfusionMatrix,
    class_names: &[&str],
    output_path: &Path,
) -> std::io::Result<()> {
    let n = cm.num_classes;
    let width = MARGIN_LEFT + n as f64 * CELL_SIZE + MARGIN_RIGHT;
    let height = MARGIN_TOP + n as f64 * CELL_SIZE + MARGIN_BOTTOM;
    let max_count = cm.matrix.iter().copied().max().unwrap_or(0).max(1);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));
    svg.push_str(&format!(
        r#"<rect width="{width}" height="{height}" fill="white"/>"#
    ));

    // Title
    svg.push_str(&format!(
        r#"<text x="{}" y="30" font-family="sans-serif" font-size="18" font-weight="bold" fill="{COLOR_TEXT}" text-anchor="middle">Confusion Matrix</text>"#,
        width / 2.0
    ));

    for row in 0..n {
        for col in 0..n {
            let count = cm.get(row, col);
            let intensity = count as f64 / max_count as f64;
            let x = MARGIN_LEFT + col as f64 * CELL_SIZE;
            let y = MARGIN_TOP + row as f64 * CELL_SIZE;

            // Shade from white to a deep blue
            let r = (255.0 - intensity * (255.0 - 41.0)) as u8;
            let g = (255.0 - intensity * (255.0 - 128.0)) as u8;
            let b = (255.0 - intensity * (255.0 - 185.0)) as u8;

            svg.push_str(&format!(
                r##"<rect x="{x}" y="{y}" width="{CELL_SIZE}" height="{CELL_SIZE}" fill="rgb({r},{g},{b})" stroke="{COLOR_GRID}"/>"##
            ));

            let text_color = if intensity > 0.5 { "white" } else { COLOR_TEXT };
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" font-family="sans-serif" font-size="16" fill="{text_color}" text-anchor="middle" dominant-baseline="central">{count}</text>"#,
                x + CELL_SIZE / 2.0,
                y + CELL_SIZE / 2.0
            ));
        }
    }

    // Row labels (actual) and column labels (predicted)
    for (idx, name) in class_names.iter().enumerate().take(n) {
        let row_y = MARGIN_TOP + idx as f64 * CELL_SIZE + CELL_SIZE / 2.0;
        svg.push_str(&format!(
            r#"<text x="{}" y="{row_y}" font-family="sans-serif" font-size="13" fill="{COLOR_TEXT}" text-anchor="end" dominant-baseline="central">{name}</text>"#,
            MARGIN_LEFT - 10.0
        ));

        let col_x = MARGIN_LEFT + idx as f64 * CELL_SIZE + CELL_SIZE / 2.0;
        svg.push_str(&format!(
            r#"<text x="{col_x}" y="{}" font-family="sans-serif" font-size="13" fill="{COLOR_TEXT}" text-anchor="middle">{name}</text>"#,
            MARGIN_TOP + n as f64 * CELL_SIZE + 25.0
        ));
    }

    // Axis titles
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" font-family="sans-serif" font-size="14" fill="{COLOR_TEXT}" text-anchor="middle">Predicted</text>"#,
        MARGIN_LEFT + n as f64 * CELL_SIZE / 2.0,
        MARGIN_TOP + n as f64 * CELL_SIZE + 60.0
    ));
    svg.push_str(&format!(
        r#"<text x="25" y="{}" font-family="sans-serif" font-size="14" fill="{COLOR_TEXT}" text-anchor="middle" transform="rotate(-90 25 {})">Actual</text>"#,
        MARGIN_TOP + n as f64 * CELL_SIZE / 2.0,
        MARGIN_TOP + n as f64 * CELL_SIZE / 2.0
    ));

    svg.push_str("</svg>");

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heatmap_renders_counts_and_labels() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 2, 0, 1, 1], &[0, 1, 2, 0, 2, 1], 3);
        let path = std::env::temp_dir().join("leaf_severity_heatmap_test.svg");

        confusion_heatmap(&cm, &["Low", "Moderate", "Severe"], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.contains("Moderate"));
        assert!(content.contains("Actual"));
        std::fs::remove_file(&path).ok();
    }
}
