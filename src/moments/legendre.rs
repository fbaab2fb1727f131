// Legendre moments
// Orthogonal moments over the centroid window, up to a fixed total order

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::lut::Lut1;
use super::{MomentsError, MomentsExtractor, Window};

/// Highest total order m + n
pub const ORDER: usize = 10;

/// Number of populated (m, n) cells
pub const CELL_COUNT: usize = (ORDER + 1) * (ORDER + 2) / 2;

/// Legendre polynomials P0..=P[ORDER] at x, by three-term recurrence
pub fn polynomials(x: f64) -> [f64; ORDER + 1] {
    let mut p = [0.0; ORDER + 1];
    p[0] = 1.0;
    p[1] = x;
    for n in 1..ORDER {
        let nf = n as f64;
        p[n + 1] = ((2.0 * nf + 1.0) * x * p[n] - nf * p[n - 1]) / (nf + 1.0);
    }
    p
}

/// Legendre moments, indexed (m, n) with m + n <= ORDER
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendreMoments {
    values: [[f64; ORDER + 1]; ORDER + 1],
}

impl Default for LegendreMoments {
    fn default() -> Self {
        LegendreMoments {
            values: [[0.0; ORDER + 1]; ORDER + 1],
        }
    }
}

impl LegendreMoments {
    /// Populated cells, m outer, n inner
    pub fn cells() -> impl Iterator<Item = (usize, usize)> {
        (0..=ORDER).flat_map(|m| (0..=ORDER - m).map(move |n| (m, n)))
    }

    /// Feature label of a cell
    pub fn label(m: usize, n: usize) -> String {
        format!("L{}_{}", m, n)
    }

    /// # Panics
    /// When m + n exceeds ORDER
    pub fn get(&self, m: usize, n: usize) -> f64 {
        assert!(m + n <= ORDER, "Legendre cell ({}, {}) out of order", m, n);
        self.values[m][n]
    }

    /// # Panics
    /// When m + n exceeds ORDER
    pub fn set(&mut self, m: usize, n: usize, value: f64) {
        assert!(m + n <= ORDER, "Legendre cell ({}, {}) out of order", m, n);
        self.values[m][n] = value;
    }

    /// Values of all populated cells, in `cells()` order
    pub fn to_vec(&self) -> Vec<f64> {
        Self::cells().map(|(m, n)| self.values[m][n]).collect()
    }

    /// Manhattan distance over populated cells
    pub fn distance_to(&self, other: &LegendreMoments) -> f64 {
        Self::cells()
            .map(|(m, n)| (self.values[m][n] - other.values[m][n]).abs())
            .sum()
    }
}

/// One sampled polynomial per degree
///
/// The 2-D basis Pm(x)Pn(y) is separable, so interpolating each factor is the
/// bilinear interpolation of the 2-D table.
#[derive(Debug)]
pub struct LegendreTables {
    polynomials: Vec<Lut1>,
}

static SHARED_TABLES: Lazy<LegendreTables> = Lazy::new(LegendreTables::build);

impl LegendreTables {
    fn build() -> Self {
        log::debug!("Building Legendre lookup tables up to order {}", ORDER);
        LegendreTables {
            polynomials: (0..=ORDER)
                .map(|d| Lut1::sample(move |x| polynomials(x)[d]))
                .collect(),
        }
    }

    /// Process-wide tables, built on first use
    pub fn shared() -> &'static LegendreTables {
        &SHARED_TABLES
    }

    fn polynomials(&self, x: f64) -> [f64; ORDER + 1] {
        let mut p = [0.0; ORDER + 1];
        for (d, lut) in self.polynomials.iter().enumerate() {
            p[d] = lut.interpolate(x);
        }
        p
    }
}

/// Computes Legendre moments, directly or through lookup tables
#[derive(Debug, Clone, Copy)]
pub struct LegendreExtractor<'a> {
    tables: Option<&'a LegendreTables>,
}

impl<'a> LegendreExtractor<'a> {
    pub fn new(tables: Option<&'a LegendreTables>) -> Self {
        LegendreExtractor { tables }
    }
}

impl LegendreExtractor<'static> {
    /// Extractor on the shared lookup tables
    pub fn tabulated() -> Self {
        LegendreExtractor::new(Some(LegendreTables::shared()))
    }

    /// Extractor evaluating polynomials for every pixel
    pub fn direct() -> Self {
        LegendreExtractor::new(None)
    }
}

impl MomentsExtractor<LegendreMoments> for LegendreExtractor<'_> {
    fn extract(
        &self,
        xs: &[i32],
        ys: &[i32],
        descriptor: &mut LegendreMoments,
    ) -> Result<(), MomentsError> {
        let window = Window::of(xs, ys)?;
        let mut sums = [[0.0; ORDER + 1]; ORDER + 1];

        for (&x, &y) in xs.iter().zip(ys) {
            let (nx, ny) = window.normalize(x, y);
            let (px, py) = match self.tables {
                Some(tables) => (tables.polynomials(nx), tables.polynomials(ny)),
                None => (polynomials(nx), polynomials(ny)),
            };

            for (m, n) in LegendreMoments::cells() {
                sums[m][n] += px[m] * py[n];
            }
        }

        // Each pixel covers 1 / radius² of the normalized plane
        let area = 1.0 / (window.radius * window.radius);

        for (m, n) in LegendreMoments::cells() {
            let norm = (((2 * m + 1) * (2 * n + 1)) as f64).sqrt() / 2.0;
            descriptor.set(m, n, norm * sums[m][n] * area);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moments::test_support::{ell, square};
    use approx::assert_abs_diff_eq;

    fn extract(extractor: LegendreExtractor, xs: &[i32], ys: &[i32]) -> LegendreMoments {
        let mut moments = LegendreMoments::default();
        extractor.extract(xs, ys, &mut moments).unwrap();
        moments
    }

    #[test]
    fn test_polynomials() {
        let p = polynomials(0.5);
        assert_abs_diff_eq!(p[0], 1.0);
        assert_abs_diff_eq!(p[1], 0.5);
        assert_abs_diff_eq!(p[2], -0.125, epsilon = 1e-12);
        assert_abs_diff_eq!(p[3], -0.4375, epsilon = 1e-12);

        // Pn(1) = 1 for every degree
        assert!(polynomials(1.0).iter().all(|v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_cell_count() {
        assert_eq!(LegendreMoments::cells().count(), CELL_COUNT);
        assert_eq!(CELL_COUNT, 66);
    }

    #[test]
    fn test_self_distance_zero() {
        let (xs, ys) = ell(0, 0);
        let moments = extract(LegendreExtractor::direct(), &xs, &ys);
        assert_eq!(moments.distance_to(&moments), 0.0);
    }

    #[test]
    fn test_square_symmetry() {
        let (xs, ys) = square(30, 30, 6);
        let moments = extract(LegendreExtractor::direct(), &xs, &ys);

        for (m, n) in LegendreMoments::cells() {
            assert_abs_diff_eq!(moments.get(m, n), moments.get(n, m), epsilon = 1e-9);
            if m % 2 == 1 || n % 2 == 1 {
                assert_abs_diff_eq!(moments.get(m, n), 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_translation_invariance() {
        let (xs, ys) = ell(0, 0);
        let (txs, tys) = ell(137, -42);
        let a = extract(LegendreExtractor::direct(), &xs, &ys);
        let b = extract(LegendreExtractor::direct(), &txs, &tys);

        assert!(a.distance_to(&b) < 1e-9);
    }

    #[test]
    fn test_tables_match_direct_on_grid() {
        // Radius 5 puts every pixel on a table sample
        let (xs, ys) = square(0, 0, 5);
        let direct = extract(LegendreExtractor::direct(), &xs, &ys);
        let tabulated = extract(LegendreExtractor::tabulated(), &xs, &ys);

        assert!(direct.distance_to(&tabulated) < 1e-6);
    }

    #[test]
    fn test_tables_close_to_direct() {
        let (xs, ys) = ell(3, 3);
        let direct = extract(LegendreExtractor::direct(), &xs, &ys);
        let tabulated = extract(LegendreExtractor::tabulated(), &xs, &ys);

        for (m, n) in LegendreMoments::cells().filter(|(m, n)| m + n <= 3) {
            assert_abs_diff_eq!(direct.get(m, n), tabulated.get(m, n), epsilon = 0.05);
        }
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut moments = LegendreMoments::default();
        let result = LegendreExtractor::direct().extract(&[], &[], &mut moments);
        assert_eq!(result, Err(MomentsError::EmptyInput));
    }
}
