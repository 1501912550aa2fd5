use super::geom::Aabb;
use super::traits::Quantize;

use cgmath::Point3;

#[cfg(feature="parallel")]
use rayon::prelude::*;

use std::fmt::{Debug, Formatter};

/// Which axes contribute to a Morton key
///
/// `Planar` interleaves X and Z (a ground plane, 16 bits per axis); `Spatial` interleaves X, Y and Z
/// (10 bits per axis).  For both, an X-bit is lower significance than the corresponding Y/Z-bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature="serde", derive(serde_crate::Serialize, serde_crate::Deserialize))]
#[cfg_attr(feature="serde", serde(crate="serde_crate"))]
pub enum KeyEncoding {
    Planar,
    Spatial
}

impl KeyEncoding {
    /// The widest quantization representable in a 32-bit key
    pub fn max_axis_bits(self) -> u32 {
        match self {
            KeyEncoding::Planar => 16,
            KeyEncoding::Spatial => 10
        }
    }

    /// clamps a per-axis bit width to the representable range
    pub fn clamp_axis_bits(self, bits: u32) -> u32 {
        std::cmp::max(1, std::cmp::min(bits, self.max_axis_bits()))
    }
}

impl Default for KeyEncoding {
    fn default() -> Self {
        KeyEncoding::Planar
    }
}

/// A 32-bit Z-order key
///
/// Quantized cells narrower than [`KeyEncoding::max_axis_bits`] are left-aligned, so keys of different
/// precision still share the same high-bit ordering.
///
/// [`KeyEncoding::max_axis_bits`]: enum.KeyEncoding.html#method.max_axis_bits
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MortonKey(pub u32);

impl MortonKey {
    /// Key assigned to padding slots; sorts after every real key
    pub const SENTINEL: MortonKey = MortonKey(std::u32::MAX);

    #[inline]
    fn expand_bits_2(v: u32) -> u32 {
        let v =  v             & 0x0000_ffff;
        let v = (v | (v << 8)) & 0x00ff_00ff;
        let v = (v | (v << 4)) & 0x0f0f_0f0f;
        let v = (v | (v << 2)) & 0x3333_3333;
        (v | (v << 1)) & 0x5555_5555
    }

    #[inline]
    fn compact_bits_2(v: u32) -> u32 {
        let v =  v             & 0x5555_5555;
        let v = (v | (v >> 1)) & 0x3333_3333;
        let v = (v | (v >> 2)) & 0x0f0f_0f0f;
        let v = (v | (v >> 4)) & 0x00ff_00ff;
        (v | (v >> 8)) & 0x0000_ffff
    }

    #[inline]
    fn expand_bits_3(v: u32) -> u32 {
        let v =  v              & 0o0_000_001_777;
        let v = (v | (v << 16)) & 0o0_300_000_377;
        let v = (v | (v <<  8)) & 0o0_300_170_017;
        let v = (v | (v <<  4)) & 0o0_303_030_303;
        (v | (v << 2)) & 0o1_111_111_111
    }

    #[inline]
    fn compact_bits_3(v: u32) -> u32 {
        let v =  v              & 0o1_111_111_111;
        let v = (v | (v >>  2)) & 0o0_303_030_303;
        let v = (v | (v >>  4)) & 0o0_300_170_017;
        let v = (v | (v >>  8)) & 0o0_300_000_377;
        (v | (v >> 16)) & 0o0_000_001_777
    }

    /// Encodes a point already normalized into the unit cube
    pub fn encode(encoding: KeyEncoding, axis_bits: u32, normalized: Point3<f32>) -> Self {
        let bits = encoding.clamp_axis_bits(axis_bits);
        let shift = encoding.max_axis_bits() - bits;
        let x = normalized.x.quantize(bits) << shift;
        let y = normalized.y.quantize(bits) << shift;
        let z = normalized.z.quantize(bits) << shift;
        match encoding {
            KeyEncoding::Planar => MortonKey(
                  Self::expand_bits_2(x)
                | Self::expand_bits_2(z) << 1),
            KeyEncoding::Spatial => MortonKey(
                  Self::expand_bits_3(x)
                | Self::expand_bits_3(y) << 1
                | Self::expand_bits_3(z) << 2)
        }
    }

    /// The quantized cell this key was generated from, at full precision; `y` is zero for planar keys
    pub fn cell(self, encoding: KeyEncoding) -> Point3<u32> {
        let MortonKey(key) = self;
        match encoding {
            KeyEncoding::Planar => Point3::new(
                Self::compact_bits_2(key),
                0,
                Self::compact_bits_2(key >> 1)),
            KeyEncoding::Spatial => Point3::new(
                Self::compact_bits_3(key),
                Self::compact_bits_3(key >> 1),
                Self::compact_bits_3(key >> 2))
        }
    }

    /// Length of the common prefix of two keys, in bits
    #[inline]
    pub fn common_prefix(self, other: MortonKey) -> u32 {
        let (MortonKey(lhs), MortonKey(rhs)) = (self, other);
        (lhs ^ rhs).leading_zeros()
    }
}

impl Debug for MortonKey {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let MortonKey(key) = self;
        write!(f, "MortonKey(0o{:011o})", key)
    }
}

/// Writes one key per leaf slot and resets `index_converter` to the identity permutation
///
/// Slots at or beyond `aabbs.len()` are padding and receive [`MortonKey::SENTINEL`].
pub(crate) fn encode_keys(
    aabbs: &[Aabb],
    system_bounds: Aabb,
    encoding: KeyEncoding,
    axis_bits: u32,
    keys: &mut [MortonKey],
    index_converter: &mut [u32])
{
    debug_assert_eq!(keys.len(), index_converter.len());
    trace!("encoding {} keys ({} padding)", aabbs.len(), keys.len() - aabbs.len());

    par_iter!(keys, par_iter_mut, iter_mut)
        .zip(par_iter!(index_converter, par_iter_mut, iter_mut))
        .enumerate()
        .for_each(|(i, (key, index))| {
            *index = i as u32;
            *key = match aabbs.get(i) {
                Some(aabb) => MortonKey::encode(
                    encoding,
                    axis_bits,
                    system_bounds.normalize_point(aabb.center())),
                None => MortonKey::SENTINEL
            };
        });
}
