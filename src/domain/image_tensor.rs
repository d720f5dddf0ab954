// ============================================================
// Layer 3 — ImageTensor
// ============================================================
// A preprocessed image: 3 × size × size f32 values in [0, 1],
// stored channel-major (all red, then all green, then blue).
//
// This is the only image representation that crosses from the
// data layer into the model. It is plain Rust so the domain
// stays free of any numeric framework.

/// Number of colour channels every tensor carries.
pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    size: usize,
}

impl ImageTensor {
    /// Wrap CHW data. Returns `None` if the length does not match `3 * size * size`.
    pub fn from_chw(data: Vec<f32>, size: usize) -> Option<Self> {
        (data.len() == CHANNELS * size * size).then_some(Self { data, size })
    }

    /// Wrap CHW data the caller built to exactly `3 * size * size` values.
    pub(crate) fn from_chw_exact(data: Vec<f32>, size: usize) -> Self {
        debug_assert_eq!(data.len(), CHANNELS * size * size);
        Self { data, size }
    }

    /// `[channels, height, width]`
    pub fn shape(&self) -> [usize; 3] {
        [CHANNELS, self.size, self.size]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_length() {
        assert!(ImageTensor::from_chw(vec![0.0; 10], 2).is_none());
        let t = ImageTensor::from_chw(vec![0.0; 12], 2).unwrap();
        assert_eq!(t.shape(), [3, 2, 2]);
    }
}
