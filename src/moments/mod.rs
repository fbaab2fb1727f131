// Moments module
// Orthogonal and geometric moment extraction from glyph pixel coordinates

pub mod art;
pub mod geometric;
pub mod legendre;
pub mod lut;
pub mod quantized;

pub use art::{ArtExtractor, ArtMoments, ArtTables, BasicArtMoments, ANGULAR, RADIAL};
pub use geometric::{GeometricExtractor, GeometricMoments};
pub use legendre::{LegendreExtractor, LegendreMoments, LegendreTables, ORDER};
pub use quantized::QuantizedArtMoments;

use thiserror::Error;

/// Precondition violations of moment extraction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MomentsError {
    #[error("Cannot extract moments from an empty pixel set")]
    EmptyInput,

    #[error("Coordinate arrays differ in length: {xs} abscissae, {ys} ordinates")]
    LengthMismatch { xs: usize, ys: usize },
}

/// Fills a moment descriptor `D` from pixel coordinates
pub trait MomentsExtractor<D> {
    fn extract(&self, xs: &[i32], ys: &[i32], descriptor: &mut D) -> Result<(), MomentsError>;
}

/// Square window centered on the glyph centroid
///
/// `radius` is the largest absolute deviation from the centroid along either
/// axis, so every pixel maps into [-1, 1] x [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Window {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl Window {
    pub(crate) fn of(xs: &[i32], ys: &[i32]) -> Result<Window, MomentsError> {
        if xs.len() != ys.len() {
            return Err(MomentsError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        if xs.is_empty() {
            return Err(MomentsError::EmptyInput);
        }

        let n = xs.len() as f64;
        let cx = xs.iter().map(|&x| x as f64).sum::<f64>() / n;
        let cy = ys.iter().map(|&y| y as f64).sum::<f64>() / n;

        let radius = xs
            .iter()
            .map(|&x| (x as f64 - cx).abs())
            .chain(ys.iter().map(|&y| (y as f64 - cy).abs()))
            .fold(0.0_f64, f64::max);

        Ok(Window {
            cx,
            cy,
            radius: if radius > 0.0 { radius } else { 1.0 },
        })
    }

    /// Pixel coordinates mapped into the unit square
    pub(crate) fn normalize(&self, x: i32, y: i32) -> (f64, f64) {
        (
            (x as f64 - self.cx) / self.radius,
            (y as f64 - self.cy) / self.radius,
        )
    }
}
