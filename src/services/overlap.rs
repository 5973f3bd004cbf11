/// Half-open interval intersection: `[start_a, end_a)` against `[start_b, end_b)`.
///
/// Touching endpoints (`end_a == start_b`) do not overlap.
pub fn overlaps<T: PartialOrd>(start_a: &T, end_a: &T, start_b: &T, end_b: &T) -> bool {
    start_a < end_b && start_b < end_a
}
