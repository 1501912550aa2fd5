use super::morton::MortonKey;

#[cfg(feature="parallel")]
use rayon::prelude::*;

/// How (key, index) pairs are ordered
///
/// Both strategies produce the same permutation: ascending by key, ties broken by slot index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature="serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature="serde", serde(crate="serde_crate"))]
pub enum SortStrategy {
    /// A bitonic network of O(log²n) compare-exchange passes over disjoint pairs
    Bitonic,
    /// LSB-first radix sort on the key, 8 bits per pass, ping-ponging through a scratch buffer
    Radix
}

impl Default for SortStrategy {
    fn default() -> Self {
        SortStrategy::Bitonic
    }
}

const RADIX_BITS: u32 = 8;
const RADIX_BUCKETS: usize = 1 << RADIX_BITS;
const RADIX_MASK: u64 = (RADIX_BUCKETS as u64) - 1;
const HISTOGRAM_CHUNK: usize = 4096;

// Entries pack the key into the high half and the slot index into the low half, so that comparing the
// primitive value orders by key first and index second.

#[inline]
fn pack(MortonKey(key): MortonKey, index: u32) -> u64 {
    (u64::from(key) << 32) | u64::from(index)
}

#[inline]
fn unpack(entry: u64) -> (MortonKey, u32) {
    (MortonKey((entry >> 32) as u32), entry as u32)
}

/// Sorts `keys` ascending, applying the same permutation to `index_converter`
///
/// `entries` and `scratch` are working buffers of the same length as `keys`.  The bitonic strategy
/// requires a power-of-two length.
pub(crate) fn sort_keys(
    strategy: SortStrategy,
    keys: &mut [MortonKey],
    index_converter: &mut [u32],
    entries: &mut [u64],
    scratch: &mut [u64])
{
    debug_assert_eq!(keys.len(), index_converter.len());
    debug_assert_eq!(keys.len(), entries.len());
    debug_assert_eq!(keys.len(), scratch.len());

    par_iter!(entries, par_iter_mut, iter_mut)
        .zip(par_iter!(keys, par_iter, iter))
        .zip(par_iter!(index_converter, par_iter, iter))
        .for_each(|((entry, &key), &index)| *entry = pack(key, index));

    match strategy {
        SortStrategy::Bitonic => bitonic_sort(entries),
        SortStrategy::Radix => radix_sort(entries, scratch)
    }

    par_iter!(entries, par_iter, iter)
        .zip(par_iter!(keys, par_iter_mut, iter_mut))
        .zip(par_iter!(index_converter, par_iter_mut, iter_mut))
        .for_each(|((&entry, key), index)| {
            let (key_, index_) = unpack(entry);
            *key = key_;
            *index = index_;
        });
}

fn bitonic_sort(entries: &mut [u64]) {
    let n = entries.len();
    assert!(n.is_power_of_two(), "bitonic sort requires a power-of-two length, got {}", n);

    let mut passes = 0;
    let mut k = 2;
    while k <= n {
        let mut j = k >> 1;
        while j > 0 {
            bitonic_pass(entries, k, j);
            passes += 1;
            j >>= 1;
        }
        k <<= 1;
    }
    trace!("bitonic sort of {} entries took {} passes", n, passes);
}

/// One compare-exchange pass: every element of the lower half of a `2 * stride` block is paired with the
/// element `stride` slots above it, so no two pairs share a slot
fn bitonic_pass(entries: &mut [u64], group: usize, stride: usize) {
    par_iter!(entries, par_chunks_mut, chunks_mut, 2 * stride)
        .enumerate()
        .for_each(|(block, pairs)| {
            let ascending = (block * 2 * stride) & group == 0;
            let (lo, hi) = pairs.split_at_mut(stride);
            for (a, b) in lo.iter_mut().zip(hi.iter_mut()) {
                if (*a > *b) == ascending {
                    std::mem::swap(a, b);
                }
            }
        });
}

fn histogram(src: &[u64], shift: u32) -> [usize; RADIX_BUCKETS] {
    let count = |chunk: &[u64]| {
        let mut counts = [0usize; RADIX_BUCKETS];
        for &entry in chunk {
            counts[((entry >> shift) & RADIX_MASK) as usize] += 1;
        }
        counts
    };

    let partials: Vec<[usize; RADIX_BUCKETS]> = par_iter!(src, par_chunks, chunks, HISTOGRAM_CHUNK)
        .map(count)
        .collect();

    let mut counts = [0usize; RADIX_BUCKETS];
    for partial in &partials {
        for (total, &n) in counts.iter_mut().zip(partial.iter()) {
            *total += n;
        }
    }
    counts
}

/// Stable LSB radix sort on the key half of each entry
///
/// Passes in which every key shares the same digit are skipped, so the result may end up in either
/// buffer; it is copied back into `entries` when it lands in `scratch`.
fn radix_sort(entries: &mut [u64], scratch: &mut [u64]) {
    let mut in_scratch = false;
    for pass in 0..(32 / RADIX_BITS) {
        let shift = 32 + pass * RADIX_BITS;
        let (src, dst): (&[u64], &mut [u64]) = if in_scratch {
            (&*scratch, &mut *entries)
        } else {
            (&*entries, &mut *scratch)
        };

        let counts = histogram(src, shift);
        if counts.iter().any(|&n| n == src.len()) {
            trace!("radix pass {} skipped, single digit", pass);
            continue;
        }

        let mut offsets = [0usize; RADIX_BUCKETS];
        let mut sum = 0;
        for (offset, &n) in offsets.iter_mut().zip(counts.iter()) {
            *offset = sum;
            sum += n;
        }

        for &entry in src {
            let digit = ((entry >> shift) & RADIX_MASK) as usize;
            dst[offsets[digit]] = entry;
            offsets[digit] += 1;
        }
        in_scratch = !in_scratch;
    }

    if in_scratch {
        entries.copy_from_slice(scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn random_keys(seed: u64, n: usize, range: u32) -> Vec<MortonKey> {
        let mut prng = rand_chacha::ChaChaRng::seed_from_u64(seed);
        (0..n).map(|_| MortonKey(prng.gen_range(0, range))).collect()
    }

    fn run(strategy: SortStrategy, keys: &mut Vec<MortonKey>, index_converter: &mut Vec<u32>) {
        let n = keys.len();
        let mut entries = vec![0u64; n];
        let mut scratch = vec![0u64; n];
        sort_keys(strategy, keys, index_converter, &mut entries, &mut scratch);
    }

    fn expected(keys: &[MortonKey]) -> Vec<(MortonKey, u32)> {
        let mut pairs: Vec<(MortonKey, u32)> = keys.iter()
            .enumerate()
            .map(|(i, &key)| (key, i as u32))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn strategies_agree() {
        for &(seed, range) in &[(0, std::u32::MAX), (1, 16), (2, 1)] {
            let original = random_keys(seed, 1024, range);
            let expected = expected(&original);
            for &strategy in &[SortStrategy::Bitonic, SortStrategy::Radix] {
                let mut keys = original.clone();
                let mut index_converter: Vec<u32> = (0..1024).collect();
                run(strategy, &mut keys, &mut index_converter);
                let actual: Vec<(MortonKey, u32)> = keys.into_iter()
                    .zip(index_converter.into_iter())
                    .collect();
                assert_eq!(actual, expected, "{:?} with key range {}", strategy, range);
            }
        }
    }

    #[test]
    fn sorting_twice_is_identity() {
        for &strategy in &[SortStrategy::Bitonic, SortStrategy::Radix] {
            let mut keys = random_keys(7, 512, 64);
            let mut index_converter: Vec<u32> = (0..512).collect();
            run(strategy, &mut keys, &mut index_converter);

            let sorted_keys = keys.clone();
            let sorted_index = index_converter.clone();
            run(strategy, &mut keys, &mut index_converter);
            assert_eq!(keys, sorted_keys);
            assert_eq!(index_converter, sorted_index);
        }
    }

    #[test]
    fn radix_copies_back_from_scratch() {
        // only the lowest digit differs, so exactly one pass runs and the result lands in scratch
        let mut keys: Vec<MortonKey> = (0..8).rev().map(MortonKey).collect();
        let mut index_converter: Vec<u32> = (0..8).collect();
        run(SortStrategy::Radix, &mut keys, &mut index_converter);
        assert_eq!(keys, (0..8).map(MortonKey).collect::<Vec<_>>());
        assert_eq!(index_converter, (0..8).rev().collect::<Vec<u32>>());
    }

    #[test]
    fn sentinels_sort_last() {
        let mut keys = vec![
            MortonKey::SENTINEL,
            MortonKey(5),
            MortonKey::SENTINEL,
            MortonKey(std::u32::MAX - 1)];
        let mut index_converter: Vec<u32> = (0..4).collect();
        run(SortStrategy::Bitonic, &mut keys, &mut index_converter);
        assert_eq!(index_converter, vec![1, 3, 0, 2]);
    }
}
