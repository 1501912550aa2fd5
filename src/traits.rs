/// Conservative containment: `self` encloses `other` on every axis (touching faces count)
pub trait Containment<RHS = Self> {
    fn contains(&self, other: &RHS) -> bool;
}

/// Overlap test for closed intervals on every axis
pub trait Overlap<RHS = Self> {
    fn overlaps(&self, other: &RHS) -> bool;
}

/// Maps a value normalized into `[0, 1)` onto an unsigned integer grid of `bits` bits
pub trait Quantize {
    type Quantized;
    fn quantize(self, bits: u32) -> Self::Quantized;
}

impl Quantize for f32 {
    type Quantized = u32;

    fn quantize(self, bits: u32) -> u32 {
        debug_assert!(bits > 0 && bits <= 16);
        let cells = (1u32 << bits) as f32;
        let max_cell = (1u32 << bits) - 1;
        // NaN and negatives saturate to zero
        let cell = (self * cells).max(0f32);
        num_traits::clamp(cell as u32, 0, max_cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_saturates() {
        assert_eq!(0.0f32.quantize(10), 0);
        assert_eq!(0.5f32.quantize(10), 512);
        assert_eq!(0.99999f32.quantize(10), 1023);
        assert_eq!(1.0f32.quantize(10), 1023);
        assert_eq!((-3.0f32).quantize(10), 0);
        assert_eq!(std::f32::NAN.quantize(16), 0);
    }
}
