/// Median of `values`, reordering the slice in the process.
///
/// An odd count gives the middle order statistic; an even count gives the
/// mean of the two middle ones. Returns `None` for an empty slice.
pub fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }

    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }

    // Everything left of `mid` is <= upper, so its maximum is the other
    // middle order statistic.
    let lower = lower.iter().copied().max_by(f64::total_cmp)?;
    Some((lower + upper) / 2.0)
}
