/// Descriptive statistics over `f64` columns.

/// Arithmetic mean of the finite values, or `None` if there are none.
pub fn finite_mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Population standard deviation (denominator `n`) around `mean`.
///
/// Returns 0.0 for an empty slice.
pub fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Quantile `q` in [0, 1] of an ascending-sorted slice, interpolating
/// linearly between the two nearest order statistics.
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
}

/// Pearson correlation of two equally long columns.
///
/// Pairs with a non-finite member are skipped. Returns `None` when fewer
/// than two pairs remain or either column is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        covariance += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(covariance / (var_x.sqrt() * var_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_finite_mean_skips_nan_and_infinity() {
        let mean = finite_mean([1.0, f64::NAN, 3.0, f64::INFINITY]);
        assert_eq!(mean, Some(2.0));
    }

    #[test]
    fn test_finite_mean_of_nothing_is_none() {
        assert_eq!(finite_mean(Vec::<f64>::new()), None);
        assert_eq!(finite_mean([f64::NAN]), None);
    }

    #[test]
    fn test_population_std_uses_n_denominator() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(population_std(&values, 5.0), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_percentile_interpolates_between_order_statistics() {
        let sorted: Vec<f64> = (0..=10).map(f64::from).collect();
        assert_abs_diff_eq!(percentile(&sorted, 0.05).unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile(&sorted, 0.95).unwrap(), 9.5, epsilon = 1e-12);
        assert_eq!(percentile(&sorted, 0.0), Some(0.0));
        assert_eq!(percentile(&sorted, 1.0), Some(10.0));
    }

    #[test]
    fn test_percentile_of_single_value_is_that_value() {
        assert_eq!(percentile(&[4.0], 0.05), Some(4.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_pearson_perfect_positive_and_negative() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert_abs_diff_eq!(pearson(&xs, &up).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&xs, &down).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_undefined_for_constant_column() {
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
    }
}
