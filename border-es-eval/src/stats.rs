//! Summary statistics of samples.

/// Arithmetic mean, `NaN` for an empty sample.
pub fn mean(vs: &[f64]) -> f64 {
    if vs.is_empty() {
        return f64::NAN;
    }
    vs.iter().sum::<f64>() / vs.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom.
///
/// The sum of squared deviations is divided by `n - ddof`, so `ddof = 0` gives the
/// population standard deviation and `ddof = 1` the sample standard deviation.
/// The result is `NaN` if `n <= ddof`, e.g., the sample standard deviation of a
/// single value.
pub fn std(vs: &[f64], ddof: usize) -> f64 {
    if vs.len() <= ddof {
        return f64::NAN;
    }
    let m = mean(vs);
    let ss = vs.iter().map(|v| (v - m) * (v - m)).sum::<f64>();
    (ss / (vs.len() - ddof) as f64).sqrt()
}
