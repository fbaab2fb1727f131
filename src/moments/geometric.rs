// Geometric moments
// Size measures plus normalized central moments up to order 3, with optional Hu invariants

use serde::{Deserialize, Serialize};

use super::{MomentsError, MomentsExtractor, Window};

/// Labels of the base moments, in storage order
pub const LABELS: [&str; 10] = [
    "weight", "width", "height", "n20", "n11", "n02", "n30", "n21", "n12", "n03",
];

/// Labels of the Hu invariants
pub const HU_LABELS: [&str; 7] = ["h1", "h2", "h3", "h4", "h5", "h6", "h7"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometricMoments {
    /// Pixel count, in interline squares
    pub weight: f64,
    /// Bounding width, in interlines
    pub width: f64,
    /// Bounding height, in interlines
    pub height: f64,

    pub n20: f64,
    pub n11: f64,
    pub n02: f64,
    pub n30: f64,
    pub n21: f64,
    pub n12: f64,
    pub n03: f64,

    /// The 7 Hu invariants, when requested
    pub hu: Option<[f64; 7]>,
}

impl GeometricMoments {
    /// Base moments in `LABELS` order, followed by Hu invariants if present
    pub fn to_vec(&self) -> Vec<f64> {
        let mut values = vec![
            self.weight,
            self.width,
            self.height,
            self.n20,
            self.n11,
            self.n02,
            self.n30,
            self.n21,
            self.n12,
            self.n03,
        ];
        if let Some(hu) = &self.hu {
            values.extend_from_slice(hu);
        }
        values
    }

    /// Value by label, None for an unknown or absent label
    pub fn value(&self, label: &str) -> Option<f64> {
        let index = LABELS
            .iter()
            .chain(HU_LABELS.iter())
            .position(|l| *l == label)?;
        self.to_vec().get(index).copied()
    }

    /// Manhattan distance over base moments and shared Hu invariants
    pub fn distance_to(&self, other: &GeometricMoments) -> f64 {
        self.to_vec()
            .iter()
            .zip(other.to_vec())
            .map(|(a, b)| (a - b).abs())
            .sum()
    }

    fn compute_hu(&mut self) {
        let (n20, n11, n02) = (self.n20, self.n11, self.n02);
        let (n30, n21, n12, n03) = (self.n30, self.n21, self.n12, self.n03);

        let a = n30 + n12;
        let b = n21 + n03;

        self.hu = Some([
            n20 + n02,
            (n20 - n02).powi(2) + 4.0 * n11 * n11,
            (n30 - 3.0 * n12).powi(2) + (3.0 * n21 - n03).powi(2),
            a * a + b * b,
            (n30 - 3.0 * n12) * a * (a * a - 3.0 * b * b)
                + (3.0 * n21 - n03) * b * (3.0 * a * a - b * b),
            (n20 - n02) * (a * a - b * b) + 4.0 * n11 * a * b,
            (3.0 * n21 - n03) * a * (a * a - 3.0 * b * b)
                - (n30 - 3.0 * n12) * b * (3.0 * a * a - b * b),
        ]);
    }
}

/// Computes geometric moments at a given staff scale
#[derive(Debug, Clone, Copy)]
pub struct GeometricExtractor {
    interline: f64,
    with_hu: bool,
}

impl GeometricExtractor {
    pub fn new(interline: u32) -> Self {
        GeometricExtractor {
            interline: interline.max(1) as f64,
            with_hu: false,
        }
    }

    /// Also compute the Hu invariants
    pub fn with_hu(mut self) -> Self {
        self.with_hu = true;
        self
    }
}

impl MomentsExtractor<GeometricMoments> for GeometricExtractor {
    fn extract(
        &self,
        xs: &[i32],
        ys: &[i32],
        descriptor: &mut GeometricMoments,
    ) -> Result<(), MomentsError> {
        let window = Window::of(xs, ys)?;
        let mass = xs.len() as f64;

        let mut mu = [[0.0_f64; 4]; 4];
        for (&x, &y) in xs.iter().zip(ys) {
            let dx = x as f64 - window.cx;
            let dy = y as f64 - window.cy;
            mu[2][0] += dx * dx;
            mu[1][1] += dx * dy;
            mu[0][2] += dy * dy;
            mu[3][0] += dx * dx * dx;
            mu[2][1] += dx * dx * dy;
            mu[1][2] += dx * dy * dy;
            mu[0][3] += dy * dy * dy;
        }

        let second = mass * mass;
        let third = mass.powf(2.5);

        // Window::of has already rejected empty input
        let width = xs.iter().max().zip(xs.iter().min()).map_or(0, |(a, b)| a - b + 1);
        let height = ys.iter().max().zip(ys.iter().min()).map_or(0, |(a, b)| a - b + 1);

        *descriptor = GeometricMoments {
            weight: mass / (self.interline * self.interline),
            width: width as f64 / self.interline,
            height: height as f64 / self.interline,
            n20: mu[2][0] / second,
            n11: mu[1][1] / second,
            n02: mu[0][2] / second,
            n30: mu[3][0] / third,
            n21: mu[2][1] / third,
            n12: mu[1][2] / third,
            n03: mu[0][3] / third,
            hu: None,
        };

        if self.with_hu {
            descriptor.compute_hu();
        }

        Ok(())
    }
}
