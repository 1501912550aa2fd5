use super::geom::Aabb;

#[cfg(feature="parallel")]
use rayon::prelude::*;

/// Number of partial reductions computed in parallel before the serial merge
pub const DEFAULT_BOUNDS_BATCHES: usize = 8;

/// Computes the box enclosing every input box
///
/// The input is split into at most `batches` contiguous runs, each reduced independently; the partial
/// results are then merged on the calling thread.  Returns `None` for empty input.
pub(crate) fn reduce_bounds(aabbs: &[Aabb], batches: usize) -> Option<Aabb> {
    if aabbs.is_empty() {
        return None;
    }

    let batches = std::cmp::max(1, std::cmp::min(batches, aabbs.len()));
    let batch_size = (aabbs.len() + batches - 1) / batches;

    let partials: Vec<Aabb> = par_iter!(aabbs, par_chunks, chunks, batch_size)
        .map(|batch| batch[1..].iter().fold(batch[0], |acc, &aabb| acc.union(aabb)))
        .collect();

    trace!("merging {} partial bounds", partials.len());
    Some(partials[1..].iter().fold(partials[0], |acc, &aabb| acc.union(aabb)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Containment;
    use cgmath::Point3;
    use rand::prelude::*;

    #[test]
    fn empty() {
        assert_eq!(reduce_bounds(&[], DEFAULT_BOUNDS_BATCHES), None);
    }

    #[test]
    fn encloses_exactly() {
        let mut prng = rand_chacha::ChaChaRng::seed_from_u64(3);
        let aabbs: Vec<Aabb> = (0..1001)
            .map(|_| {
                let min = Point3::new(
                    prng.gen_range(-100f32, 100f32),
                    prng.gen_range(-100f32, 100f32),
                    prng.gen_range(-100f32, 100f32));
                let max = Point3::new(
                    min.x + prng.gen_range(0f32, 5f32),
                    min.y + prng.gen_range(0f32, 5f32),
                    min.z + prng.gen_range(0f32, 5f32));
                Aabb::new(min, max)
            })
            .collect();

        let expected = aabbs.iter().fold(Aabb::empty(), |acc, &aabb| acc.union(aabb));
        for &batches in &[1, 3, 8, 5000] {
            let actual = reduce_bounds(&aabbs, batches).unwrap();
            assert_eq!(actual, expected);
            assert!(aabbs.iter().all(|aabb| actual.contains(aabb)));
        }
    }
}
