use ndarray::Array1;

use crate::shared::math;

/// Running arithmetic mean of the descriptors assigned to one identity.
///
/// Both maintenance paths live here: `update` for the per-detection running
/// mean and `merge_with` / `from_descriptors` for combining clusters, so
/// the two cannot drift apart numerically. Accumulation is done in `f64`
/// even though descriptors arrive as `f32`.
#[derive(Clone, Debug, PartialEq)]
pub struct Centroid {
    mean: Array1<f64>,
    count: usize,
}

impl Centroid {
    /// Centroid of a single descriptor.
    pub fn new(descriptor: &[f32]) -> Self {
        Self {
            mean: descriptor.iter().map(|&x| x as f64).collect(),
            count: 1,
        }
    }

    /// Full recompute over a descriptor set. Returns `None` when empty.
    pub fn from_descriptors<'a, I>(descriptors: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut iter = descriptors.into_iter();
        let first = iter.next()?;
        let mut sum: Array1<f64> = first.iter().map(|&x| x as f64).collect();
        let mut count = 1usize;
        for descriptor in iter {
            debug_assert_eq!(descriptor.len(), sum.len());
            sum.iter_mut()
                .zip(descriptor.iter())
                .for_each(|(s, &x)| *s += x as f64);
            count += 1;
        }
        sum /= count as f64;
        Some(Self { mean: sum, count })
    }

    /// Welford-style running mean: `c' = c + (x - c) / n`. O(D).
    pub fn update(&mut self, descriptor: &[f32]) {
        debug_assert_eq!(descriptor.len(), self.mean.len());
        self.count += 1;
        let n = self.count as f64;
        self.mean
            .iter_mut()
            .zip(descriptor.iter())
            .for_each(|(c, &x)| *c += (x as f64 - *c) / n);
    }

    /// Count-weighted combination with another centroid.
    pub fn merge_with(&mut self, other: &Centroid) {
        debug_assert_eq!(other.mean.len(), self.mean.len());
        let total = self.count + other.count;
        let weight = other.count as f64 / total as f64;
        self.mean
            .iter_mut()
            .zip(other.mean.iter())
            .for_each(|(c, &o)| *c += (o - *c) * weight);
        self.count = total;
    }

    pub fn distance_to(&self, descriptor: &[f32]) -> f64 {
        math::euclidean_distance(self.as_slice(), descriptor)
    }

    pub fn distance_to_centroid(&self, other: &Centroid) -> f64 {
        math::euclidean_distance(self.as_slice(), other.as_slice())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        self.mean
            .as_slice()
            .expect("centroid is always a contiguous 1-D array")
    }
}
