// Lookup tables
// Basis functions sampled on an integer grid over [-1, 1], read back by interpolation

/// Half size of the sampling grid
pub const LUT_RADIUS: usize = 50;

/// Samples along one axis
pub const LUT_SIZE: usize = 2 * LUT_RADIUS + 1;

/// Grid cell and fractional offset for a normalized coordinate
fn locate(v: f64) -> (usize, f64) {
    let last = (LUT_SIZE - 1) as f64;
    let pos = ((v + 1.0) * LUT_RADIUS as f64).clamp(0.0, last);
    let cell = (pos.floor() as usize).min(LUT_SIZE - 2);
    (cell, pos - cell as f64)
}

fn grid_value(i: usize) -> f64 {
    (i as f64 - LUT_RADIUS as f64) / LUT_RADIUS as f64
}

/// One-dimensional table, linearly interpolated
#[derive(Debug, Clone)]
pub struct Lut1 {
    samples: Vec<f64>,
}

impl Lut1 {
    pub fn sample<F: Fn(f64) -> f64>(f: F) -> Self {
        Lut1 {
            samples: (0..LUT_SIZE).map(|i| f(grid_value(i))).collect(),
        }
    }

    pub fn interpolate(&self, x: f64) -> f64 {
        let (i, fx) = locate(x);
        self.samples[i] * (1.0 - fx) + self.samples[i + 1] * fx
    }
}

/// Two-dimensional table, bilinearly interpolated
#[derive(Debug, Clone)]
pub struct Lut2 {
    /// Row-major, y outer
    samples: Vec<f64>,
}

impl Lut2 {
    pub fn sample<F: Fn(f64, f64) -> f64>(f: F) -> Self {
        let mut samples = Vec::with_capacity(LUT_SIZE * LUT_SIZE);
        for j in 0..LUT_SIZE {
            for i in 0..LUT_SIZE {
                samples.push(f(grid_value(i), grid_value(j)));
            }
        }
        Lut2 { samples }
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.samples[j * LUT_SIZE + i]
    }

    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        let (i, fx) = locate(x);
        let (j, fy) = locate(y);

        let top = self.at(i, j) * (1.0 - fx) + self.at(i + 1, j) * fx;
        let bottom = self.at(i, j + 1) * (1.0 - fx) + self.at(i + 1, j + 1) * fx;

        top * (1.0 - fy) + bottom * fy
    }
}
