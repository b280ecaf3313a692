//! One-dimensional linear interpolation with clamped extrapolation.
use anyhow::{Result, ensure};
use itertools::Itertools;

/// Linear interpolator over a strictly increasing grid
#[derive(Debug, Clone, PartialEq)]
pub struct Interp1D {
    x: Vec<f64>,
    f_x: Vec<f64>,
}

impl Interp1D {
    /// Create and validate an interpolator.
    ///
    /// `x` must be non-empty, finite, strictly increasing and the same length as `f_x`.
    pub fn new(x: Vec<f64>, f_x: Vec<f64>) -> Result<Self> {
        ensure!(!x.is_empty(), "Interpolation grid is empty");
        ensure!(
            x.len() == f_x.len(),
            "Interpolation grid has {} points but {} values were supplied",
            x.len(),
            f_x.len()
        );
        ensure!(
            x.iter().all(|x| x.is_finite()),
            "Interpolation grid contains non-finite values"
        );
        ensure!(
            x.iter().tuple_windows().all(|(a, b)| a < b),
            "Interpolation grid must be strictly increasing"
        );

        Ok(Self { x, f_x })
    }

    /// Interpolate at `point`, clamping to the end values outside the grid
    pub fn interpolate(&self, point: f64) -> f64 {
        let last = self.x.len() - 1;
        if point <= self.x[0] {
            return self.f_x[0];
        }
        if point >= self.x[last] {
            return self.f_x[last];
        }

        // Index of the lower bracketing grid point
        let lower = self.x.partition_point(|&x| x <= point) - 1;
        let upper = lower + 1;
        let fraction = (point - self.x[lower]) / (self.x[upper] - self.x[lower]);

        self.f_x[lower] + fraction * (self.f_x[upper] - self.f_x[lower])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(-5.0, 10.0)] // clamped below
    #[case(0.0, 10.0)]
    #[case(0.5, 15.0)]
    #[case(1.0, 20.0)]
    #[case(2.5, 5.0)]
    #[case(3.0, 0.0)]
    #[case(100.0, 0.0)] // clamped above
    fn test_interpolate(#[case] point: f64, #[case] expected: f64) {
        let interp = Interp1D::new(vec![0.0, 1.0, 3.0], vec![10.0, 20.0, 0.0]).unwrap();
        assert_approx_eq!(f64, interp.interpolate(point), expected);
    }

    #[test]
    fn test_interpolate_single_point() {
        let interp = Interp1D::new(vec![1.0], vec![7.0]).unwrap();
        assert_eq!(interp.interpolate(0.0), 7.0);
        assert_eq!(interp.interpolate(2.0), 7.0);
    }

    #[rstest]
    #[case(vec![], vec![], "Interpolation grid is empty")]
    #[case(
        vec![0.0, 1.0],
        vec![1.0],
        "Interpolation grid has 2 points but 1 values were supplied"
    )]
    #[case(
        vec![0.0, 0.0],
        vec![1.0, 2.0],
        "Interpolation grid must be strictly increasing"
    )]
    #[case(
        vec![0.0, f64::NAN],
        vec![1.0, 2.0],
        "Interpolation grid contains non-finite values"
    )]
    fn test_new_invalid(#[case] x: Vec<f64>, #[case] f_x: Vec<f64>, #[case] msg: &str) {
        assert_error!(Interp1D::new(x, f_x), msg);
    }
}
