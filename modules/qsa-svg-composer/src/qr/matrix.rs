//! Module placement for the QR encoder: function patterns, the zigzag
//! data walk, the eight masks with their penalty scores, and format
//! information.

/// Level M in the format-information field.
const EC_LEVEL_BITS: u16 = 0b00;
const FORMAT_MASK: u16 = 0b101010000010010;

struct Grid {
    size: usize,
    dark: Vec<bool>,
    function: Vec<bool>,
}

impl Grid {
    fn new(size: usize) -> Self {
        Self {
            size,
            dark: vec![false; size * size],
            function: vec![false; size * size],
        }
    }

    fn set_function(&mut self, row: usize, col: usize, dark: bool) {
        let index = row * self.size + col;
        self.dark[index] = dark;
        self.function[index] = true;
    }

    fn is_function(&self, row: usize, col: usize) -> bool {
        self.function[row * self.size + col]
    }

    fn set(&mut self, row: usize, col: usize, dark: bool) {
        self.dark[row * self.size + col] = dark;
    }
}

/// Builds the final symbol for `version` from interleaved codewords.
/// Returns (size, modules row-major).
pub(super) fn build(version: u8, alignment: &[usize], codewords: &[u8]) -> (usize, Vec<bool>) {
    let size = 17 + 4 * version as usize;
    let mut grid = Grid::new(size);

    place_finders(&mut grid);
    place_alignment(&mut grid, alignment);
    place_timing(&mut grid);
    reserve_format(&mut grid);
    // The dark module above the bottom-left finder.
    grid.set_function(size - 8, 8, true);

    place_data(&mut grid, codewords);

    // Try every mask on the data modules, keep the lowest penalty.
    let mut best: Option<(u32, u8, Vec<bool>)> = None;
    for mask in 0..8u8 {
        let mut candidate = grid.dark.clone();
        for row in 0..size {
            for col in 0..size {
                if !grid.is_function(row, col) && mask_bit(mask, row, col) {
                    candidate[row * size + col] ^= true;
                }
            }
        }
        write_format(&mut candidate, size, mask);
        let score = penalty(&candidate, size);
        if best.as_ref().map_or(true, |(s, _, _)| score < *s) {
            best = Some((score, mask, candidate));
        }
    }
    let (_, _, modules) = best.expect("eight masks were scored");
    (size, modules)
}

fn place_finders(grid: &mut Grid) {
    let size = grid.size;
    for &(base_row, base_col) in &[(0usize, 0usize), (0, size - 7), (size - 7, 0)] {
        for dr in 0..7 {
            for dc in 0..7 {
                let ring = dr == 0 || dr == 6 || dc == 0 || dc == 6;
                let core = (2..=4).contains(&dr) && (2..=4).contains(&dc);
                grid.set_function(base_row + dr, base_col + dc, ring || core);
            }
        }
    }
    // Separators: one light module around each finder.
    for i in 0..8 {
        grid.set_function(7, i, false);
        grid.set_function(i, 7, false);
        grid.set_function(7, size - 1 - i, false);
        grid.set_function(i, size - 8, false);
        grid.set_function(size - 8, i, false);
        grid.set_function(size - 1 - i, 7, false);
    }
}

fn place_alignment(grid: &mut Grid, centers: &[usize]) {
    for &row in centers {
        for &col in centers {
            // Skip patterns that would overlap a finder.
            if grid.is_function(row, col) {
                continue;
            }
            for dr in 0..5 {
                for dc in 0..5 {
                    let ring = dr == 0 || dr == 4 || dc == 0 || dc == 4;
                    let center = dr == 2 && dc == 2;
                    grid.set_function(row - 2 + dr, col - 2 + dc, ring || center);
                }
            }
        }
    }
}

fn place_timing(grid: &mut Grid) {
    for i in 8..grid.size - 8 {
        if !grid.is_function(6, i) {
            grid.set_function(6, i, i % 2 == 0);
        }
        if !grid.is_function(i, 6) {
            grid.set_function(i, 6, i % 2 == 0);
        }
    }
}

/// Marks the format-information modules as function area so the data
/// walk skips them; actual bits are written after mask selection.
fn reserve_format(grid: &mut Grid) {
    let size = grid.size;
    for i in 0..9 {
        if !grid.is_function(8, i) {
            grid.set_function(8, i, false);
        }
        if !grid.is_function(i, 8) {
            grid.set_function(i, 8, false);
        }
    }
    for i in 0..8 {
        if !grid.is_function(8, size - 1 - i) {
            grid.set_function(8, size - 1 - i, false);
        }
        if !grid.is_function(size - 1 - i, 8) {
            grid.set_function(size - 1 - i, 8, false);
        }
    }
}

/// The standard zigzag: column pairs right to left (skipping the timing
/// column), alternating upward and downward. Remainder modules stay
/// light.
fn place_data(grid: &mut Grid, codewords: &[u8]) {
    let size = grid.size;
    let mut bits = codewords
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1 == 1));

    let mut col = size as isize - 1;
    let mut upward = true;
    while col > 0 {
        if col == 6 {
            col -= 1;
        }
        let rows: Vec<usize> = if upward {
            (0..size).rev().collect()
        } else {
            (0..size).collect()
        };
        for row in rows {
            for c in [col, col - 1] {
                let c = c as usize;
                if !grid.is_function(row, c) {
                    let bit = bits.next().unwrap_or(false);
                    grid.set(row, c, bit);
                }
            }
        }
        upward = !upward;
        col -= 2;
    }
}

fn mask_bit(mask: u8, row: usize, col: usize) -> bool {
    let (i, j) = (row, col);
    match mask {
        0 => (i + j) % 2 == 0,
        1 => i % 2 == 0,
        2 => j % 3 == 0,
        3 => (i + j) % 3 == 0,
        4 => (i / 2 + j / 3) % 2 == 0,
        5 => (i * j) % 2 + (i * j) % 3 == 0,
        6 => ((i * j) % 2 + (i * j) % 3) % 2 == 0,
        7 => ((i + j) % 2 + (i * j) % 3) % 2 == 0,
        _ => unreachable!("mask ids are 0-7"),
    }
}

/// The 15 format bits: EC level and mask id, BCH-protected, XORed with
/// the fixed pattern.
fn format_bits(mask: u8) -> u16 {
    let data = (EC_LEVEL_BITS << 3) | mask as u16;
    let mut remainder = data << 10;
    let generator = 0b10100110111u16;
    for i in (0..5).rev() {
        if remainder & (1 << (i + 10)) != 0 {
            remainder ^= generator << i;
        }
    }
    ((data << 10) | (remainder & 0x3FF)) ^ FORMAT_MASK
}

fn write_format(modules: &mut [bool], size: usize, mask: u8) {
    let bits = format_bits(mask);
    let bit = |i: usize| (bits >> (14 - i)) & 1 == 1;

    // Copy A around the top-left finder, bit 0 at (8, 0).
    let copy_a: [(usize, usize); 15] = [
        (8, 0), (8, 1), (8, 2), (8, 3), (8, 4), (8, 5), (8, 7), (8, 8),
        (7, 8), (5, 8), (4, 8), (3, 8), (2, 8), (1, 8), (0, 8),
    ];
    // Copy B split between the bottom-left and top-right finders.
    let mut copy_b: Vec<(usize, usize)> = (0..7).map(|i| (size - 1 - i, 8)).collect();
    copy_b.extend((0..8).map(|i| (8, size - 8 + i)));

    for (i, &(row, col)) in copy_a.iter().enumerate() {
        modules[row * size + col] = bit(i);
    }
    for (i, &(row, col)) in copy_b.iter().enumerate() {
        modules[row * size + col] = bit(i);
    }
}

/// The four standard penalty rules.
fn penalty(modules: &[bool], size: usize) -> u32 {
    let at = |row: usize, col: usize| modules[row * size + col];
    let mut score = 0u32;

    // N1: runs of five or more same-colored modules.
    for i in 0..size {
        let mut run_row = 1u32;
        let mut run_col = 1u32;
        for j in 1..size {
            if at(i, j) == at(i, j - 1) {
                run_row += 1;
                if run_row == 5 {
                    score += 3;
                } else if run_row > 5 {
                    score += 1;
                }
            } else {
                run_row = 1;
            }
            if at(j, i) == at(j - 1, i) {
                run_col += 1;
                if run_col == 5 {
                    score += 3;
                } else if run_col > 5 {
                    score += 1;
                }
            } else {
                run_col = 1;
            }
        }
    }

    // N2: 2x2 blocks of one color.
    for row in 0..size - 1 {
        for col in 0..size - 1 {
            let color = at(row, col);
            if at(row, col + 1) == color
                && at(row + 1, col) == color
                && at(row + 1, col + 1) == color
            {
                score += 3;
            }
        }
    }

    // N3: finder-like 1:1:3:1:1 runs with four light modules on a side.
    const PATTERNS: [[bool; 11]; 2] = [
        [true, false, true, true, true, false, true, false, false, false, false],
        [false, false, false, false, true, false, true, true, true, false, true],
    ];
    for i in 0..size {
        for start in 0..size.saturating_sub(10) {
            for pattern in &PATTERNS {
                if (0..11).all(|k| at(i, start + k) == pattern[k]) {
                    score += 40;
                }
                if (0..11).all(|k| at(start + k, i) == pattern[k]) {
                    score += 40;
                }
            }
        }
    }

    // N4: deviation of the dark-module proportion from 50%.
    let dark = modules.iter().filter(|&&m| m).count();
    let percent = dark * 100 / modules.len();
    let deviation = percent.abs_diff(50) / 5;
    score += 10 * deviation as u32;

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bits_match_the_published_example() {
        // Level M, mask 5 is the worked example in the standard's annex:
        // 100000011001110 after masking.
        assert_eq!(format_bits(5), 0b100000011001110);
    }

    #[test]
    fn format_bits_differ_per_mask() {
        let mut seen: Vec<u16> = (0..8).map(format_bits).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn data_region_capacity_matches_the_codeword_count() {
        // Version 1: 26 codewords exactly fill the 208 data modules.
        let mut grid = Grid::new(21);
        place_finders(&mut grid);
        place_timing(&mut grid);
        reserve_format(&mut grid);
        grid.set_function(21 - 8, 8, true);

        let free = (0..21)
            .flat_map(|r| (0..21).map(move |c| (r, c)))
            .filter(|&(r, c)| !grid.is_function(r, c))
            .count();
        assert_eq!(free, 26 * 8);
    }
}
