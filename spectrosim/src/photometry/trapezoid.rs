//! Trapezoidal integration over sampled functions

/// Integrate `ys` over `xs` with the trapezoidal rule.
///
/// The grids must have equal length; fewer than two samples integrate to
/// zero. Non-uniform spacing is handled per segment.
///
/// # Arguments
/// * `xs` - Sample positions, ascending
/// * `ys` - Sample values at each position
///
/// # Returns
/// The approximate integral of y over the sampled domain
pub fn trap_integrate(xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());

    let mut sum = 0.0;
    for i in 1..xs.len().min(ys.len()) {
        // Area of trapezoid = (width) * (average height)
        sum += (xs[i] - xs[i - 1]) * (ys[i] + ys[i - 1]) / 2.0;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_function() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [2.0, 2.0, 2.0, 2.0];
        assert_relative_eq!(trap_integrate(&xs, &ys), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_function() {
        // y = x over [0, 4] integrates to 8 exactly under the trapezoid rule
        let xs: Vec<f64> = (0..=4).map(|i| i as f64).collect();
        let ys = xs.clone();
        assert_relative_eq!(trap_integrate(&xs, &ys), 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uneven_spacing() {
        let xs = [0.0, 1.0, 4.0];
        let ys = [1.0, 1.0, 1.0];
        assert_relative_eq!(trap_integrate(&xs, &ys), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_grids() {
        assert_eq!(trap_integrate(&[], &[]), 0.0);
        assert_eq!(trap_integrate(&[1.0], &[5.0]), 0.0);
    }
}
