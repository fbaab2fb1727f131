// ART moments
// Angular Radial Transform over the unit disk inscribed in the centroid window

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::lut::Lut2;
use super::{MomentsError, MomentsExtractor, Window};

/// Number of angular orders p
pub const ANGULAR: usize = 12;

/// Number of radial orders r
pub const RADIAL: usize = 3;

/// Common access to ART moments, whatever their storage
pub trait ArtMoments {
    /// Module of cell (p, r), in [0, 1]
    fn module(&self, p: usize, r: usize) -> f64;

    fn set_module(&mut self, p: usize, r: usize, value: f64);

    /// Phase of cell (p, r); ignored by descriptors that do not keep it
    fn set_argument(&mut self, _p: usize, _r: usize, _value: f64) {}

    /// Manhattan distance over module values
    fn distance_to<O: ArtMoments + ?Sized>(&self, other: &O) -> f64
    where
        Self: Sized,
    {
        cells()
            .map(|(p, r)| (self.module(p, r) - other.module(p, r)).abs())
            .sum()
    }
}

/// Populated cells, p outer, r inner
pub fn cells() -> impl Iterator<Item = (usize, usize)> {
    (0..ANGULAR).flat_map(|p| (0..RADIAL).map(move |r| (p, r)))
}

/// Feature label of an ART cell
pub fn label(p: usize, r: usize) -> String {
    format!("ART{}_{}", p, r)
}

/// ART moments keeping full precision modules and arguments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicArtMoments {
    modules: [[f64; RADIAL]; ANGULAR],
    arguments: [[f64; RADIAL]; ANGULAR],
}

impl BasicArtMoments {
    pub fn argument(&self, p: usize, r: usize) -> f64 {
        self.arguments[p][r]
    }
}

impl ArtMoments for BasicArtMoments {
    fn module(&self, p: usize, r: usize) -> f64 {
        self.modules[p][r]
    }

    fn set_module(&mut self, p: usize, r: usize, value: f64) {
        self.modules[p][r] = value;
    }

    fn set_argument(&mut self, p: usize, r: usize, value: f64) {
        self.arguments[p][r] = value;
    }
}

/// Radial polar coordinates of a normalized point
fn polar(x: f64, y: f64) -> (f64, f64) {
    (x.hypot(y), y.atan2(x))
}

/// Real and imaginary parts of the conjugate basis at a normalized point
fn basis(p: usize, r: usize, x: f64, y: f64) -> (f64, f64) {
    let (rho, theta) = polar(x, y);
    if rho >= 1.0 {
        return (0.0, 0.0);
    }
    // The angle is undefined at the center, only order 0 has a value there
    if rho == 0.0 && p > 0 {
        return (0.0, 0.0);
    }

    let radial = (r as f64 * PI * rho).cos();
    let angle = p as f64 * theta;
    (radial * angle.cos(), -radial * angle.sin())
}

/// Sampled real and imaginary basis per (p, r)
#[derive(Debug)]
pub struct ArtTables {
    real: Vec<Lut2>,
    imag: Vec<Lut2>,
}

static SHARED_TABLES: Lazy<ArtTables> = Lazy::new(ArtTables::build);

impl ArtTables {
    fn build() -> Self {
        log::debug!("Building ART lookup tables {}x{}", ANGULAR, RADIAL);
        let mut real = Vec::with_capacity(ANGULAR * RADIAL);
        let mut imag = Vec::with_capacity(ANGULAR * RADIAL);

        for p in 0..ANGULAR {
            for r in 0..RADIAL {
                real.push(Lut2::sample(|x, y| basis(p, r, x, y).0));
                imag.push(Lut2::sample(|x, y| basis(p, r, x, y).1));
            }
        }

        ArtTables { real, imag }
    }

    /// Process-wide tables, built on first use
    pub fn shared() -> &'static ArtTables {
        &SHARED_TABLES
    }

    fn basis(&self, p: usize, r: usize, x: f64, y: f64) -> (f64, f64) {
        let i = p * RADIAL + r;
        (self.real[i].interpolate(x, y), self.imag[i].interpolate(x, y))
    }
}

/// Computes ART moments into any `ArtMoments` storage
#[derive(Debug, Clone, Copy)]
pub struct ArtExtractor<'a> {
    tables: Option<&'a ArtTables>,
}

impl<'a> ArtExtractor<'a> {
    pub fn new(tables: Option<&'a ArtTables>) -> Self {
        ArtExtractor { tables }
    }
}

impl ArtExtractor<'static> {
    /// Extractor on the shared lookup tables
    pub fn tabulated() -> Self {
        ArtExtractor::new(Some(ArtTables::shared()))
    }

    /// Extractor evaluating the basis for every pixel
    pub fn direct() -> Self {
        ArtExtractor::new(None)
    }
}

impl<D: ArtMoments> MomentsExtractor<D> for ArtExtractor<'_> {
    fn extract(&self, xs: &[i32], ys: &[i32], descriptor: &mut D) -> Result<(), MomentsError> {
        let window = Window::of(xs, ys)?;
        let mut real = [[0.0; RADIAL]; ANGULAR];
        let mut imag = [[0.0; RADIAL]; ANGULAR];

        for (&x, &y) in xs.iter().zip(ys) {
            let (nx, ny) = window.normalize(x, y);

            // Corners of the window lie outside the unit disk
            if nx.hypot(ny) >= 1.0 {
                continue;
            }

            for (p, r) in cells() {
                let (re, im) = match self.tables {
                    Some(tables) => tables.basis(p, r, nx, ny),
                    None => basis(p, r, nx, ny),
                };
                real[p][r] += re;
                imag[p][r] += im;
            }
        }

        let count = xs.len() as f64;

        for (p, r) in cells() {
            descriptor.set_module(p, r, imag[p][r].hypot(real[p][r]) / count);
            descriptor.set_argument(p, r, imag[p][r].atan2(real[p][r]));
        }

        Ok(())
    }
}
