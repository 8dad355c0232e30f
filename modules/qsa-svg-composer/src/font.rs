//! The single-stroke engraving font: straight-segment polylines on a
//! 4-wide, 6-high unit grid (y up, baseline at 0). Covers the restricted
//! engraving charset: A-Z, the revision 'a', 0-9 and `. - / :`.

/// One glyph: its advance in grid units and its polyline strokes.
pub(crate) struct Glyph {
    pub advance: f64,
    pub strokes: &'static [&'static [(f64, f64)]],
}

/// Grid units per cap height; scale = text_height_mm / UNITS_PER_EM.
pub(crate) const UNITS_PER_EM: f64 = 6.0;

/// Default advance: glyph body plus inter-character gap.
const ADV: f64 = 5.5;
/// Advance for narrow punctuation.
const ADV_NARROW: f64 = 3.0;

static GLYPHS: &[(char, Glyph)] = &[
    ('A', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (2.0, 6.0), (4.0, 0.0)], &[(0.7, 2.0), (3.3, 2.0)]] }),
    ('B', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (0.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 3.8), (3.0, 3.0), (0.0, 3.0)], &[(3.0, 3.0), (4.0, 2.2), (4.0, 1.0), (3.0, 0.0), (0.0, 0.0)]] }),
    ('C', Glyph { advance: ADV, strokes: &[&[(4.0, 5.0), (3.0, 6.0), (1.0, 6.0), (0.0, 5.0), (0.0, 1.0), (1.0, 0.0), (3.0, 0.0), (4.0, 1.0)]] }),
    ('D', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (0.0, 6.0), (2.5, 6.0), (4.0, 4.5), (4.0, 1.5), (2.5, 0.0), (0.0, 0.0)]] }),
    ('E', Glyph { advance: ADV, strokes: &[&[(4.0, 6.0), (0.0, 6.0), (0.0, 0.0), (4.0, 0.0)], &[(0.0, 3.0), (3.0, 3.0)]] }),
    ('F', Glyph { advance: ADV, strokes: &[&[(4.0, 6.0), (0.0, 6.0), (0.0, 0.0)], &[(0.0, 3.0), (3.0, 3.0)]] }),
    ('G', Glyph { advance: ADV, strokes: &[&[(4.0, 5.0), (3.0, 6.0), (1.0, 6.0), (0.0, 5.0), (0.0, 1.0), (1.0, 0.0), (3.0, 0.0), (4.0, 1.0), (4.0, 3.0), (2.5, 3.0)]] }),
    ('H', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (0.0, 6.0)], &[(4.0, 0.0), (4.0, 6.0)], &[(0.0, 3.0), (4.0, 3.0)]] }),
    ('I', Glyph { advance: ADV, strokes: &[&[(1.0, 6.0), (3.0, 6.0)], &[(2.0, 6.0), (2.0, 0.0)], &[(1.0, 0.0), (3.0, 0.0)]] }),
    ('J', Glyph { advance: ADV, strokes: &[&[(3.0, 6.0), (3.0, 1.0), (2.0, 0.0), (1.0, 0.0), (0.0, 1.0)]] }),
    ('K', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (0.0, 6.0)], &[(4.0, 6.0), (0.0, 2.5)], &[(1.5, 3.8), (4.0, 0.0)]] }),
    ('L', Glyph { advance: ADV, strokes: &[&[(0.0, 6.0), (0.0, 0.0), (4.0, 0.0)]] }),
    ('M', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (0.0, 6.0), (2.0, 3.0), (4.0, 6.0), (4.0, 0.0)]] }),
    ('N', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (0.0, 6.0), (4.0, 0.0), (4.0, 6.0)]] }),
    ('O', Glyph { advance: ADV, strokes: &[&[(1.0, 0.0), (0.0, 1.0), (0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 1.0), (3.0, 0.0), (1.0, 0.0)]] }),
    ('P', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (0.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 3.5), (3.0, 2.5), (0.0, 2.5)]] }),
    ('Q', Glyph { advance: ADV, strokes: &[&[(1.0, 0.0), (0.0, 1.0), (0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 1.0), (3.0, 0.0), (1.0, 0.0)], &[(2.5, 1.5), (4.0, 0.0)]] }),
    ('R', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (0.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 3.5), (3.0, 2.5), (0.0, 2.5)], &[(2.0, 2.5), (4.0, 0.0)]] }),
    ('S', Glyph { advance: ADV, strokes: &[&[(4.0, 5.0), (3.0, 6.0), (1.0, 6.0), (0.0, 5.0), (0.0, 4.0), (1.0, 3.2), (3.0, 2.8), (4.0, 2.0), (4.0, 1.0), (3.0, 0.0), (1.0, 0.0), (0.0, 1.0)]] }),
    ('T', Glyph { advance: ADV, strokes: &[&[(0.0, 6.0), (4.0, 6.0)], &[(2.0, 6.0), (2.0, 0.0)]] }),
    ('U', Glyph { advance: ADV, strokes: &[&[(0.0, 6.0), (0.0, 1.0), (1.0, 0.0), (3.0, 0.0), (4.0, 1.0), (4.0, 6.0)]] }),
    ('V', Glyph { advance: ADV, strokes: &[&[(0.0, 6.0), (2.0, 0.0), (4.0, 6.0)]] }),
    ('W', Glyph { advance: ADV, strokes: &[&[(0.0, 6.0), (1.0, 0.0), (2.0, 4.0), (3.0, 0.0), (4.0, 6.0)]] }),
    ('X', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (4.0, 6.0)], &[(0.0, 6.0), (4.0, 0.0)]] }),
    ('Y', Glyph { advance: ADV, strokes: &[&[(0.0, 6.0), (2.0, 3.0), (4.0, 6.0)], &[(2.0, 3.0), (2.0, 0.0)]] }),
    ('Z', Glyph { advance: ADV, strokes: &[&[(0.0, 6.0), (4.0, 6.0), (0.0, 0.0), (4.0, 0.0)]] }),
    ('a', Glyph { advance: ADV, strokes: &[&[(4.0, 4.0), (4.0, 0.0)], &[(4.0, 3.0), (3.0, 4.0), (1.0, 4.0), (0.0, 3.0), (0.0, 1.0), (1.0, 0.0), (3.0, 0.0), (4.0, 1.0)]] }),
    ('0', Glyph { advance: ADV, strokes: &[&[(1.0, 0.0), (0.0, 1.0), (0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 1.0), (3.0, 0.0), (1.0, 0.0)], &[(0.5, 1.0), (3.5, 5.0)]] }),
    ('1', Glyph { advance: ADV, strokes: &[&[(1.0, 4.5), (2.5, 6.0), (2.5, 0.0)], &[(1.5, 0.0), (3.5, 0.0)]] }),
    ('2', Glyph { advance: ADV, strokes: &[&[(0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 4.0), (0.0, 0.0), (4.0, 0.0)]] }),
    ('3', Glyph { advance: ADV, strokes: &[&[(0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 4.0), (3.0, 3.0), (1.5, 3.0)], &[(3.0, 3.0), (4.0, 2.0), (4.0, 1.0), (3.0, 0.0), (1.0, 0.0), (0.0, 1.0)]] }),
    ('4', Glyph { advance: ADV, strokes: &[&[(3.0, 0.0), (3.0, 6.0), (0.0, 2.0), (4.0, 2.0)]] }),
    ('5', Glyph { advance: ADV, strokes: &[&[(4.0, 6.0), (0.0, 6.0), (0.0, 3.5), (3.0, 3.5), (4.0, 2.5), (4.0, 1.0), (3.0, 0.0), (1.0, 0.0), (0.0, 1.0)]] }),
    ('6', Glyph { advance: ADV, strokes: &[&[(4.0, 5.0), (3.0, 6.0), (1.0, 6.0), (0.0, 5.0), (0.0, 1.0), (1.0, 0.0), (3.0, 0.0), (4.0, 1.0), (4.0, 2.0), (3.0, 3.0), (1.0, 3.0), (0.0, 2.0)]] }),
    ('7', Glyph { advance: ADV, strokes: &[&[(0.0, 6.0), (4.0, 6.0), (1.5, 0.0)]] }),
    ('8', Glyph { advance: ADV, strokes: &[&[(1.0, 3.0), (0.0, 4.0), (0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 4.0), (3.0, 3.0), (1.0, 3.0), (0.0, 2.0), (0.0, 1.0), (1.0, 0.0), (3.0, 0.0), (4.0, 1.0), (4.0, 2.0), (3.0, 3.0)]] }),
    ('9', Glyph { advance: ADV, strokes: &[&[(4.0, 4.0), (3.0, 3.0), (1.0, 3.0), (0.0, 4.0), (0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 1.0), (3.0, 0.0), (1.0, 0.0), (0.0, 1.0)]] }),
    ('.', Glyph { advance: ADV_NARROW, strokes: &[&[(0.8, 0.0), (1.2, 0.0)]] }),
    ('-', Glyph { advance: ADV, strokes: &[&[(0.5, 2.5), (3.5, 2.5)]] }),
    ('/', Glyph { advance: ADV, strokes: &[&[(0.0, 0.0), (4.0, 6.0)]] }),
    (':', Glyph { advance: ADV_NARROW, strokes: &[&[(0.8, 1.2), (1.2, 1.2)], &[(0.8, 4.2), (1.2, 4.2)]] }),
];

pub(crate) fn glyph(c: char) -> Option<&'static Glyph> {
    GLYPHS.iter().find(|(ch, _)| *ch == c).map(|(_, g)| g)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_full_charset_is_covered() {
        for c in ('A'..='Z').chain('0'..='9').chain(['a', '.', '-', '/', ':']) {
            assert!(glyph(c).is_some(), "missing glyph for '{}'", c);
        }
    }

    #[test]
    fn unsupported_characters_are_absent() {
        for c in ['b', 'z', '_', ' ', '#', 'ä'] {
            assert!(glyph(c).is_none(), "unexpected glyph for '{}'", c);
        }
    }

    #[test]
    fn strokes_stay_inside_the_glyph_cell() {
        for (c, glyph) in GLYPHS {
            for stroke in glyph.strokes {
                for &(x, y) in stroke.iter() {
                    assert!((0.0..=4.0).contains(&x), "'{}' x {}", c, x);
                    assert!((0.0..=6.0).contains(&y), "'{}' y {}", c, y);
                }
            }
        }
    }
}
