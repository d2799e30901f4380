use rand::Rng;
use serde::Deserialize;

/// Wiring of the 50 LED cloud. The strip enters on the top row, drops into
/// the middle row, climbs back up to finish the top row and ends on the
/// bottom row.
const CLOUD_ROWS: [&[usize]; 3] = [
    &[0, 1, 2, 3, 4, 33, 32, 31, 30, 29, 28, 27, 26, 25, 24, 23, 22],
    &[
        5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21,
    ],
    &[
        34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49,
    ],
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub const fn new(row: usize, col: usize) -> Coord {
        Coord { row, col }
    }
}

/// Tunables of the organic flash shape
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Jitter {
    /// Cells whose draw exceeds this are kept in place, the rest are
    /// displaced sideways
    pub keep_threshold: f32,
    pub max_displacement_attempts: u32,
}

impl Jitter {
    /// Draws whether a cell stays where it is
    pub fn keeps<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f32>() > self.keep_threshold
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Jitter {
            keep_threshold: 0.33,
            max_displacement_attempts: 20,
        }
    }
}

/// Ragged 2-D layout of a 1-D LED strip
#[derive(Clone, Debug)]
pub struct Grid {
    rows: Vec<Vec<usize>>,
    positions: Vec<Coord>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<usize>>) -> Result<Grid, String> {
        if rows.is_empty() {
            return Err("Grid layout has no rows".to_string());
        }

        let led_count: usize = rows.iter().map(Vec::len).sum();
        let mut positions: Vec<Option<Coord>> = vec![None; led_count];

        for (row, leds) in rows.iter().enumerate() {
            if leds.is_empty() {
                return Err(format!("Grid row {} is empty", row));
            }

            for (col, &led) in leds.iter().enumerate() {
                let Some(slot) = positions.get_mut(led) else {
                    return Err(format!(
                        "LED {} at ({}, {}) is outside 0..{}",
                        led, row, col, led_count
                    ));
                };
                if let Some(other) = slot {
                    return Err(format!(
                        "LED {} is mapped twice, at ({}, {}) and ({}, {})",
                        led, other.row, other.col, row, col
                    ));
                }
                *slot = Some(Coord::new(row, col));
            }
        }

        // Every slot is filled: the indices are unique and there are exactly
        // `led_count` of them.
        let positions = positions.into_iter().flatten().collect();

        Ok(Grid { rows, positions })
    }

    /// The canonical 17/17/16 cloud layout
    pub fn cloud() -> Grid {
        Grid {
            rows: CLOUD_ROWS.iter().map(|row| row.to_vec()).collect(),
            positions: Self::cloud_positions(),
        }
    }

    fn cloud_positions() -> Vec<Coord> {
        let mut positions = vec![Coord::new(0, 0); 50];
        for (row, leds) in CLOUD_ROWS.iter().enumerate() {
            for (col, &led) in leds.iter().enumerate() {
                positions[led] = Coord::new(row, col);
            }
        }
        positions
    }

    pub fn led_count(&self) -> usize {
        self.positions.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row_len(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, Vec::len)
    }

    pub fn max_row_len(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn led_at(&self, coord: Coord) -> Option<usize> {
        self.rows.get(coord.row)?.get(coord.col).copied()
    }

    pub fn all_leds(&self) -> Vec<usize> {
        (0..self.led_count()).collect()
    }

    pub fn random_coord<R: Rng + ?Sized>(&self, rng: &mut R) -> Coord {
        self.positions[rng.gen_range(0..self.led_count())]
    }

    /// Clamps signed coordinates onto the grid. The column is clamped to the
    /// length of the (already clamped) row.
    pub fn clamp(&self, row: isize, col: isize) -> Coord {
        let row = row.clamp(0, self.row_count() as isize - 1) as usize;
        let col = col.clamp(0, self.row_len(row) as isize - 1) as usize;
        Coord::new(row, col)
    }

    /// Square neighborhood around `origin`, clipped to the grid. Columns are
    /// clipped against the origin's row.
    pub fn area_bounds(&self, origin: Coord, radius: usize) -> (Coord, Coord) {
        let origin = self.clamp(origin.row as isize, origin.col as isize);
        let last_row = self.row_count() - 1;
        let last_col = self.row_len(origin.row) - 1;

        let min = Coord::new(
            origin.row.saturating_sub(radius),
            origin.col.saturating_sub(radius),
        );
        let max = Coord::new(
            (origin.row + radius).min(last_row),
            (origin.col + radius).min(last_col),
        );
        (min, max)
    }

    /// Resolves the LEDs of an inclusive rectangle, jittering the shape.
    ///
    /// Cells past the end of a short row are skipped. Roughly a third of the
    /// cells is nudged one column sideways; a nudge that lands on an LED
    /// already taken keeps walking in the same direction and gives up after
    /// `max_displacement_attempts`.
    pub fn leds_in_area<R: Rng + ?Sized>(
        &self,
        min: Coord,
        max: Coord,
        jitter: &Jitter,
        rng: &mut R,
    ) -> Vec<usize> {
        if min == max {
            return self.led_at(min).into_iter().collect();
        }

        let mut leds = Vec::new();
        for row in min.row..=max.row {
            for col in min.col..=max.col {
                let Some(led) = self.led_at(Coord::new(row, col)) else {
                    continue;
                };

                let led = if jitter.keeps(rng) {
                    Some(led)
                } else {
                    let step = if rng.gen_bool(0.5) { 1 } else { -1 };
                    self.displace(Coord::new(row, col), step, &leds, jitter)
                };

                if let Some(led) = led {
                    if !leds.contains(&led) {
                        leds.push(led);
                    }
                }
            }
        }
        leds
    }

    /// Shifts `coord` by `step` columns until it hits a free LED
    fn displace(
        &self,
        coord: Coord,
        step: isize,
        taken: &[usize],
        jitter: &Jitter,
    ) -> Option<usize> {
        let row = coord.row;
        let mut col = coord.col as isize;

        for _ in 0..jitter.max_displacement_attempts.max(1) {
            col = self.clamp(row as isize, col + step).col as isize;
            let led = self.led_at(Coord::new(row, col as usize))?;
            if !taken.contains(&led) {
                return Some(led);
            }
        }

        log::trace!(
            "Dropping ({}, {}) from the flash, no free neighbour",
            coord.row,
            coord.col
        );
        None
    }
}
