use serde::{Deserialize, Serialize};

/// A 2D height grid storing values as f32, row-major.
///
/// `min_value`/`max_value` are recorded by whichever stage produced the grid
/// (noise normalization, curve remapping) rather than recomputed on demand;
/// erosion changes the data without touching them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightGrid {
    /// Row-major values: index `row * width + col`.
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min_value: f32,
    pub max_value: f32,
}

/// Bilinearly interpolated height and gradient at a fractional position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightAndGradient {
    pub height: f32,
    pub gradient_x: f32,
    pub gradient_y: f32,
}

impl HeightGrid {
    /// Create a new grid filled with the given value.
    pub fn new(width: usize, height: usize, fill: f32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            min_value: fill,
            max_value: fill,
        }
    }

    /// Create a square zero grid of side `size`.
    pub fn square(size: usize) -> Self {
        Self::new(size, size, 0.0)
    }

    /// Wrap existing row-major data, recording its observed min/max.
    pub fn from_data(width: usize, height: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        let mut grid = Self { data, width, height, min_value: 0.0, max_value: 0.0 };
        grid.refresh_range();
        grid
    }

    /// Side length; terrain grids are always square.
    #[inline]
    pub fn size(&self) -> usize {
        debug_assert_eq!(self.width, self.height, "terrain grids are square");
        self.width
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// Recompute `min_value`/`max_value` from the data.
    pub fn refresh_range(&mut self) {
        if self.data.is_empty() {
            self.min_value = 0.0;
            self.max_value = 0.0;
            return;
        }
        self.min_value = self.data.iter().cloned().fold(f32::INFINITY, f32::min);
        self.max_value = self.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    }

    /// Sum of all cell values in f64, used for mass-balance checks.
    pub fn total(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }

    /// Height and gradient at fractional position `(x, y)` (column, row)
    /// from the four surrounding cells.
    ///
    /// Caller must ensure `0 <= x < width - 1` and `0 <= y < height - 1`.
    pub fn height_and_gradient(&self, x: f32, y: f32) -> HeightAndGradient {
        let cx = x as usize;
        let cy = y as usize;
        let u = x - cx as f32;
        let v = y - cy as f32;

        let nw = self.get(cy, cx);
        let ne = self.get(cy, cx + 1);
        let sw = self.get(cy + 1, cx);
        let se = self.get(cy + 1, cx + 1);

        let gradient_x = (ne - nw) * (1.0 - v) + (se - sw) * v;
        let gradient_y = (sw - nw) * (1.0 - u) + (se - ne) * u;
        let height = nw * (1.0 - u) * (1.0 - v) + ne * u * (1.0 - v) + sw * (1.0 - u) * v + se * u * v;

        HeightAndGradient { height, gradient_x, gradient_y }
    }
}
