// Quantized ART moments
// Compact ART storage: each module is kept as one byte indexing a non-uniform level table

use serde::{Deserialize, Serialize};

use super::art::{ArtMoments, ANGULAR, RADIAL};

/// Lower bound of each quantization level
pub const QUANT: [f64; 17] = [
    0.0,
    0.003585473,
    0.007418411,
    0.011535520,
    0.015982337,
    0.020816302,
    0.026111312,
    0.031964674,
    0.038508176,
    0.045926586,
    0.054490513,
    0.064619488,
    0.077016351,
    0.092998687,
    0.115524524,
    0.154032694,
    1.0,
];

/// Representative value of each quantization level
pub const IQUANT: [f64; 17] = [
    0.001763817,
    0.005468893,
    0.009438835,
    0.013714449,
    0.018346760,
    0.023400748,
    0.028960940,
    0.035140141,
    0.042093649,
    0.050043696,
    0.059324478,
    0.070472849,
    0.084434761,
    0.103127662,
    0.131506859,
    0.192540857,
    1.0,
];

/// Index of the greatest level lower bound not above `value`
///
/// Values below 0 (and NaN) map to level 0, values above 1 to the last level.
pub fn quantize(value: f64) -> u8 {
    let above = QUANT.partition_point(|&t| t <= value);
    above.saturating_sub(1) as u8
}

/// Representative value of a level; out of range indices saturate
pub fn dequantize(index: u8) -> f64 {
    IQUANT[(index as usize).min(IQUANT.len() - 1)]
}

/// ART moments with byte-sized modules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizedArtMoments {
    indices: [[u8; RADIAL]; ANGULAR],
}

impl QuantizedArtMoments {
    pub fn index(&self, p: usize, r: usize) -> u8 {
        self.indices[p][r]
    }
}

impl ArtMoments for QuantizedArtMoments {
    fn module(&self, p: usize, r: usize) -> f64 {
        dequantize(self.indices[p][r])
    }

    fn set_module(&mut self, p: usize, r: usize, value: f64) {
        self.indices[p][r] = quantize(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moments::art::{cells, ArtExtractor, BasicArtMoments};
    use crate::moments::test_support::ell;
    use crate::moments::MomentsExtractor;

    #[test]
    fn test_quantize_levels() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(0.003585473), 1);
        assert_eq!(quantize(0.1), 13);
        assert_eq!(quantize(0.5), 15);
        assert_eq!(quantize(1.0), 16);
        assert_eq!(quantize(7.0), 16);
        assert_eq!(quantize(-0.2), 0);
        assert_eq!(quantize(f64::NAN), 0);
    }

    #[test]
    fn test_round_trip_within_bucket() {
        for step in 0..=1000 {
            let value = step as f64 / 1000.0;
            let index = quantize(value) as usize;
            let restored = dequantize(index as u8);

            let width = if index + 1 < QUANT.len() {
                QUANT[index + 1] - QUANT[index]
            } else {
                0.0
            };
            assert!(
                (restored - value).abs() <= width,
                "{} restored as {}",
                value,
                restored
            );
        }
    }

    #[test]
    fn test_representatives_inside_levels() {
        for i in 0..QUANT.len() - 1 {
            assert!(QUANT[i] <= IQUANT[i] && IQUANT[i] < QUANT[i + 1]);
        }
    }

    #[test]
    fn test_dequantize_saturates() {
        assert_eq!(dequantize(200), 1.0);
    }

    #[test]
    fn test_matches_basic_moments() {
        let (xs, ys) = ell(0, 0);
        let extractor = ArtExtractor::direct();

        let mut basic = BasicArtMoments::default();
        let mut quantized = QuantizedArtMoments::default();
        extractor.extract(&xs, &ys, &mut basic).unwrap();
        extractor.extract(&xs, &ys, &mut quantized).unwrap();

        for (p, r) in cells() {
            assert_eq!(quantized.index(p, r), quantize(basic.module(p, r)));
        }
        assert_eq!(quantized.distance_to(&quantized), 0.0);
    }
}
