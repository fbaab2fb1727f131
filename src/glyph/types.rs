// Glyph types
// A glyph is an immutable set of foreground pixels plus the staff interline used as scale

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GlyphError {
    #[error("Interline must be positive")]
    ZeroInterline,

    #[error("Raster of {len} pixels is not a multiple of width {width}")]
    RasterSize { len: usize, width: usize },
}

/// Axis-aligned bounding box of a glyph, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    /// Abscissa just past the right edge
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    /// Ordinate just past the bottom edge
    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }
}

/// Foreground pixels of a candidate musical symbol
///
/// Coordinates are kept as two parallel arrays, the layout consumed by the
/// moment extractors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    xs: Vec<i32>,
    ys: Vec<i32>,

    /// Staff line spacing in pixels, the scale normalization unit
    interline: u32,
}

impl Glyph {
    /// Create a glyph from (x, y) pixel coordinates
    pub fn new<I>(points: I, interline: u32) -> Result<Self, GlyphError>
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        if interline == 0 {
            return Err(GlyphError::ZeroInterline);
        }

        let (xs, ys) = points.into_iter().unzip();

        Ok(Glyph { xs, ys, interline })
    }

    /// Create a glyph from a row-major binary raster
    /// `true` cells are foreground; the raster top-left pixel is (0, 0)
    pub fn from_raster(width: usize, raster: &[bool], interline: u32) -> Result<Self, GlyphError> {
        if width == 0 || raster.len() % width != 0 {
            return Err(GlyphError::RasterSize {
                len: raster.len(),
                width,
            });
        }

        let points = raster
            .iter()
            .enumerate()
            .filter(|(_, fore)| **fore)
            .map(|(i, _)| ((i % width) as i32, (i / width) as i32));

        Glyph::new(points, interline)
    }

    /// Abscissae of foreground pixels
    pub fn xs(&self) -> &[i32] {
        &self.xs
    }

    /// Ordinates of foreground pixels
    pub fn ys(&self) -> &[i32] {
        &self.ys
    }

    pub fn interline(&self) -> u32 {
        self.interline
    }

    /// Number of foreground pixels
    pub fn weight(&self) -> usize {
        self.xs.len()
    }

    /// Weight expressed in interline squares
    pub fn normalized_weight(&self) -> f64 {
        let il = self.interline as f64;
        self.weight() as f64 / (il * il)
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Bounding box, None for an empty glyph
    pub fn bounds(&self) -> Option<Bounds> {
        let left = *self.xs.iter().min()?;
        let right = *self.xs.iter().max()?;
        let top = *self.ys.iter().min()?;
        let bottom = *self.ys.iter().max()?;

        Some(Bounds {
            left,
            top,
            width: right - left + 1,
            height: bottom - top + 1,
        })
    }

    /// Unweighted mean of pixel coordinates, None for an empty glyph
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }

        let n = self.weight() as f64;
        let x: i64 = self.xs.iter().map(|&x| x as i64).sum();
        let y: i64 = self.ys.iter().map(|&y| y as i64).sum();

        Some((x as f64 / n, y as f64 / n))
    }

    /// Same pixels shifted by (dx, dy)
    pub fn translated(&self, dx: i32, dy: i32) -> Glyph {
        Glyph {
            xs: self.xs.iter().map(|x| x + dx).collect(),
            ys: self.ys.iter().map(|y| y + dy).collect(),
            interline: self.interline,
        }
    }
}
