//! Descriptor distance shared by the matcher and merge suggestions.

/// Euclidean distance between two equal-length vectors.
///
/// Generic so centroids (`f64`) can be compared against raw descriptors
/// (`f32`) and against each other without intermediate copies.
pub fn euclidean_distance<A, B>(a: &[A], b: &[B]) -> f64
where
    A: Copy + Into<f64>,
    B: Copy + Into<f64>,
{
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x.into() - y.into();
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
