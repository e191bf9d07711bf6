//! Broadcast wire format.
//!
//! Each published frame is a flat array of little-endian f64 values:
//!
//! ```text
//! [c_0, c_1, ..., c_{k-1}, frame_number]     8 * (k + 1) bytes
//! ```
//!
//! No header and no length prefix. Subscribers know `k` out-of-band (3 for a
//! Lorenz point). The frame number travels as an f64 so every element has
//! the same type.

use crate::error::FrameError;
use lorenz_env::StateVector;

/// Size of one wire element in bytes.
pub const ELEMENT_SIZE: usize = 8;

/// One published unit of output.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub payload: StateVector,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(payload: StateVector, frame_number: u64) -> Self {
        Self { payload, frame_number }
    }

    /// Serializes to the wire format.
    pub fn encode(&self) -> Vec<u8> {
        let components = self.payload.components();
        let mut out = Vec::with_capacity(FrameLayout::new(components.len()).byte_len());

        for value in components.iter() {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&(self.frame_number as f64).to_le_bytes());

        out
    }
}

/// Subscriber-side view of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub components: Vec<f64>,
    pub frame_number: u64,
}

/// Out-of-band knowledge a subscriber needs to parse frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// State components per frame (excluding the frame number)
    pub dimension: usize,
}

impl FrameLayout {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Exact byte length of every frame with this layout.
    pub fn byte_len(&self) -> usize {
        ELEMENT_SIZE * (self.dimension + 1)
    }

    /// Parses a frame received from the broadcast channel.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedFrame, FrameError> {
        if data.len() != self.byte_len() {
            return Err(FrameError::Length {
                expected: self.byte_len(),
                actual: data.len(),
            });
        }

        let mut values = data.chunks_exact(ELEMENT_SIZE).map(|chunk| {
            let mut bytes = [0u8; ELEMENT_SIZE];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        });

        let components: Vec<f64> = values.by_ref().take(self.dimension).collect();
        let raw_number = values.next().unwrap_or(f64::NAN);

        if !(raw_number.is_finite() && raw_number >= 0.0 && raw_number.fract() == 0.0) {
            return Err(FrameError::FrameNumber(raw_number.to_string()));
        }

        Ok(DecodedFrame {
            components,
            frame_number: raw_number as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_frame_layout() {
        let frame = Frame::new(StateVector::point(1.0, 1.26, 0.98333), 1);
        let bytes = frame.encode();

        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes.len(), FrameLayout::new(3).byte_len());

        // Little-endian f64s in order, frame number last
        assert_eq!(&bytes[0..8], &1.0f64.to_le_bytes());
        assert_eq!(&bytes[8..16], &1.26f64.to_le_bytes());
        assert_eq!(&bytes[16..24], &0.98333f64.to_le_bytes());
        assert_eq!(&bytes[24..32], &1.0f64.to_le_bytes());
    }

    #[test]
    fn test_table_frame_is_row_major() {
        let table = StateVector::table(2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let bytes = Frame::new(table, 7).encode();
        assert_eq!(bytes.len(), 8 * 5);

        let decoded = FrameLayout::new(4).decode(&bytes).unwrap();
        assert_eq!(decoded.components, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(decoded.frame_number, 7);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let bytes = Frame::new(StateVector::point(0.0, 0.0, 0.0), 1).encode();
        let err = FrameLayout::new(4).decode(&bytes).unwrap_err();
        assert_eq!(err, FrameError::Length { expected: 40, actual: 32 });
    }

    #[test]
    fn test_decode_rejects_fractional_frame_number() {
        let mut bytes = Vec::new();
        for v in [1.0f64, 2.0, 3.0, 4.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert!(matches!(
            FrameLayout::new(3).decode(&bytes),
            Err(FrameError::FrameNumber(_))
        ));
    }
}
