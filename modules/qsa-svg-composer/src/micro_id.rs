use qsa_interface::SerialInteger;

use crate::fmt::mm;

/// Center-to-center dot pitch, millimeters.
pub const MICRO_ID_DOT_PITCH_MM: f64 = 0.225;
/// Engraved dot diameter, millimeters.
pub const MICRO_ID_DOT_DIAMETER_MM: f64 = 0.10;

/// Offset of the first dot center from the grid origin, millimeters.
const FIRST_DOT_OFFSET_MM: f64 = 0.05;
/// The orientation marker sits one pitch left of the top-left anchor.
const ORIENTATION_MARKER_X_MM: f64 = -0.175;
const ORIENTATION_MARKER_Y_MM: f64 = 0.05;

/// The four always-on anchor corners of the 5x5 grid, (row, col).
const CORNERS: [(u8, u8); 4] = [(0, 0), (0, 4), (4, 0), (4, 4)];

/// The 25 grid slots of a serial's Micro-ID, row-major, true = dot on.
///
/// The 21 data-carrying slots (20 serial bits plus one even-parity bit)
/// fill the non-corner positions left-to-right, top-to-bottom; the four
/// corners are always on. Parity makes the total count of one-bits across
/// the 21 data slots even.
pub fn micro_id_bits(serial: SerialInteger) -> [[bool; 5]; 5] {
    let data = serial.data_bits();
    let parity = data.iter().filter(|&&b| b).count() % 2 == 1;

    let mut grid = [[false; 5]; 5];
    let mut bit_index = 0;
    for row in 0..5u8 {
        for col in 0..5u8 {
            if CORNERS.contains(&(row, col)) {
                grid[row as usize][col as usize] = true;
                continue;
            }
            grid[row as usize][col as usize] = if bit_index < 20 {
                data[bit_index]
            } else {
                parity
            };
            bit_index += 1;
        }
    }
    grid
}

/// Renders the Micro-ID group for one module: anchor corners, data dots,
/// and the orientation marker outside the grid. `x`/`y` are the group
/// origin in the SVG frame.
pub(crate) fn render(serial: SerialInteger, x: f64, y: f64, rotation: f64) -> String {
    let grid = micro_id_bits(serial);
    let radius = MICRO_ID_DOT_DIAMETER_MM / 2.0;

    let mut out = String::new();
    out.push_str(&format!("<g transform=\"{}\">", transform(x, y, rotation)));
    for (row, cols) in grid.iter().enumerate() {
        for (col, &on) in cols.iter().enumerate() {
            if !on {
                continue;
            }
            let cx = FIRST_DOT_OFFSET_MM + col as f64 * MICRO_ID_DOT_PITCH_MM;
            let cy = FIRST_DOT_OFFSET_MM + row as f64 * MICRO_ID_DOT_PITCH_MM;
            out.push_str(&circle(cx, cy, radius));
        }
    }
    out.push_str(&circle(
        ORIENTATION_MARKER_X_MM,
        ORIENTATION_MARKER_Y_MM,
        radius,
    ));
    out.push_str("</g>");
    out
}

fn circle(cx: f64, cy: f64, r: f64) -> String {
    format!(
        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"#000\"/>",
        mm(cx),
        mm(cy),
        mm(r)
    )
}

fn transform(x: f64, y: f64, rotation: f64) -> String {
    if rotation == 0.0 {
        format!("translate({} {})", mm(x), mm(y))
    } else {
        format!("translate({} {}) rotate({})", mm(x), mm(y), mm(rotation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn popcount(grid: &[[bool; 5]; 5]) -> usize {
        let mut count = 0;
        for (row, cols) in grid.iter().enumerate() {
            for (col, &on) in cols.iter().enumerate() {
                if CORNERS.contains(&((row as u8), (col as u8))) {
                    continue;
                }
                if on {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn serial_one_lights_first_data_slot_and_parity() {
        let grid = micro_id_bits(SerialInteger::new(1).unwrap());
        // Bit 0 sits at (row 0, col 1), the first non-corner slot.
        assert!(grid[0][1]);
        // Parity sits at (row 4, col 3), the last non-corner slot.
        assert!(grid[4][3]);
        // Anchors are on.
        for (row, col) in CORNERS {
            assert!(grid[row as usize][col as usize]);
        }
        // Every other data slot is off: exactly data bit + parity bit.
        assert_eq!(popcount(&grid), 2);
    }

    #[test]
    fn corners_are_always_on() {
        for serial in [1u32, 76, 0x7FFFF, qsa_interface::SERIAL_MAX] {
            let grid = micro_id_bits(SerialInteger::new(serial).unwrap());
            for (row, col) in CORNERS {
                assert!(grid[row as usize][col as usize], "serial {}", serial);
            }
        }
    }

    #[test]
    fn data_slot_parity_is_even_for_every_bit_pattern() {
        // Exhaustive over a stride plus the boundary serials.
        let mut serials: Vec<u32> = (1..qsa_interface::SERIAL_MAX).step_by(997).collect();
        serials.push(qsa_interface::SERIAL_MAX);
        for serial in serials {
            let grid = micro_id_bits(SerialInteger::new(serial).unwrap());
            assert_eq!(popcount(&grid) % 2, 0, "serial {}", serial);
        }
    }

    #[test]
    fn render_is_stable_and_contains_marker() {
        let serial = SerialInteger::new(76).unwrap();
        let a = render(serial, 10.0, 20.0, 0.0);
        let b = render(serial, 10.0, 20.0, 0.0);
        assert_eq!(a, b);
        assert!(a.contains("cx=\"-0.175\""));
        assert!(a.starts_with("<g transform=\"translate(10 20)\">"));
    }

    proptest::proptest! {
        #[test]
        fn parity_holds_across_the_serial_space(value in 1u32..=qsa_interface::SERIAL_MAX) {
            let grid = micro_id_bits(SerialInteger::new(value).unwrap());
            proptest::prop_assert_eq!(popcount(&grid) % 2, 0);
        }
    }
}
