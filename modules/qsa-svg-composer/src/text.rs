use qsa_interface::{ErrorCode, WorkflowError, WorkflowResult};

use crate::fmt::mm;
use crate::font::{glyph, UNITS_PER_EM};

/// Horizontal anchoring of a text run relative to its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Anchor {
    Start,
    Middle,
    End,
}

/// Renders `text` as one stroked path element at (x, y) baseline origin
/// in the SVG frame. Lowercase letters other than the revision 'a' are
/// engraved with their uppercase glyph.
///
/// Output carries its stroke attributes inline (no CSS, no fonts); the
/// stroke width follows the text height so small and large runs engrave
/// with proportionate line weight.
pub(crate) fn render_text(
    text: &str,
    x: f64,
    y: f64,
    rotation: f64,
    height_mm: f64,
    anchor: Anchor,
    tracking: f64,
) -> WorkflowResult<String> {
    let scale = height_mm / UNITS_PER_EM;
    let glyphs: Vec<_> = text
        .chars()
        .map(|c| {
            let mapped = if c == 'a' { 'a' } else { c.to_ascii_uppercase() };
            glyph(mapped).ok_or_else(|| {
                WorkflowError::validation(
                    ErrorCode::InvalidParams,
                    format!("character '{}' is outside the engraving charset", c),
                )
            })
        })
        .collect::<Result<_, _>>()?;

    if glyphs.is_empty() {
        return Err(WorkflowError::validation(
            ErrorCode::InvalidParams,
            "cannot render empty text",
        ));
    }

    // Body width: full advances for all but the last glyph, body only
    // (4 units) for the last.
    let total_units: f64 = glyphs[..glyphs.len() - 1]
        .iter()
        .map(|g| g.advance * tracking)
        .sum::<f64>()
        + 4.0;
    let anchor_shift = match anchor {
        Anchor::Start => 0.0,
        Anchor::Middle => -total_units * scale / 2.0,
        Anchor::End => -total_units * scale,
    };

    let mut d = String::new();
    let mut pen_x = anchor_shift;
    for g in &glyphs {
        for stroke in g.strokes {
            for (i, &(gx, gy)) in stroke.iter().enumerate() {
                let px = pen_x + gx * scale;
                // Glyph frame is y-up from the baseline; SVG is y-down.
                let py = -gy * scale;
                let op = if i == 0 { 'M' } else { 'L' };
                d.push_str(&format!("{}{} {}", op, mm(px), mm(py)));
            }
        }
        pen_x += g.advance * tracking * scale;
    }

    let transform = if rotation == 0.0 {
        format!("translate({} {})", mm(x), mm(y))
    } else {
        format!("translate({} {}) rotate({})", mm(x), mm(y), mm(rotation))
    };
    Ok(format!(
        "<path transform=\"{}\" d=\"{}\" fill=\"none\" stroke=\"#000\" stroke-width=\"{}\" stroke-linecap=\"round\" stroke-linejoin=\"round\"/>",
        transform,
        d,
        mm(height_mm * 0.12),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_stroked_path_without_fonts() {
        let path = render_text("CUBE-00001", 10.0, 20.0, 0.0, 1.5, Anchor::Start, 1.0).unwrap();
        assert!(path.starts_with("<path transform=\"translate(10 20)\""));
        assert!(path.contains("fill=\"none\""));
        assert!(path.contains("stroke=\"#000\""));
        assert!(path.contains("stroke-width=\"0.18\""));
        assert!(!path.contains("font"));
    }

    #[test]
    fn lowercase_maps_to_uppercase_except_revision_a() {
        let upper = render_text("W2X", 0.0, 0.0, 0.0, 1.0, Anchor::Start, 1.0).unwrap();
        let lower = render_text("w2x", 0.0, 0.0, 0.0, 1.0, Anchor::Start, 1.0).unwrap();
        assert_eq!(upper, lower);

        let revision_a = render_text("a", 0.0, 0.0, 0.0, 1.0, Anchor::Start, 1.0).unwrap();
        let capital_a = render_text("A", 0.0, 0.0, 0.0, 1.0, Anchor::Start, 1.0).unwrap();
        assert_ne!(revision_a, capital_a);
    }

    #[test]
    fn rejects_characters_outside_the_charset() {
        let err = render_text("ABC_1", 0.0, 0.0, 0.0, 1.0, Anchor::Start, 1.0).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert!(render_text("", 0.0, 0.0, 0.0, 1.0, Anchor::Start, 1.0).is_err());
    }

    #[test]
    fn tracking_widens_the_run() {
        let tight = render_text("AAA", 0.0, 0.0, 0.0, 1.0, Anchor::Start, 1.0).unwrap();
        let loose = render_text("AAA", 0.0, 0.0, 0.0, 1.0, Anchor::Start, 2.0).unwrap();
        assert_ne!(tight, loose);
    }

    #[test]
    fn middle_anchor_centers_the_run() {
        // A single 'I' centered: the vertical stem at glyph x=2 lands
        // left of the origin once the 4-unit body is centered.
        let path = render_text("I", 0.0, 0.0, 0.0, 6.0, Anchor::Middle, 1.0).unwrap();
        assert!(path.contains("M-1 -6"));
    }

    #[test]
    fn rotation_is_applied_in_the_transform() {
        let path = render_text("A", 1.0, 2.0, 90.0, 1.0, Anchor::Start, 1.0).unwrap();
        assert!(path.contains("rotate(90)"));
    }
}
