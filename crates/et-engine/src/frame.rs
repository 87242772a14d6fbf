//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: i16) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Convert a float stereo pair (full scale = ±1.0) with clipping.
    pub fn from_f32(left: f32, right: f32) -> Self {
        let to_i16 = |v: f32| (v * 32767.0).clamp(-32768.0, 32767.0) as i16;
        Self {
            left: to_i16(left),
            right: to_i16(right),
        }
    }

    /// Mix another frame into this one.
    pub fn mix(&mut self, other: Frame) {
        // Use i32 to avoid overflow, then clamp
        let left = (self.left as i32 + other.left as i32).clamp(-32768, 32767);
        let right = (self.right as i32 + other.right as i32).clamp(-32768, 32767);
        self.left = left as i16;
        self.right = right as i16;
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_conversion_clips() {
        assert_eq!(Frame::from_f32(2.0, -2.0), Frame { left: 32767, right: -32768 });
        assert_eq!(Frame::from_f32(0.0, 0.0), Frame::silence());
    }

    #[test]
    fn mix_saturates() {
        let mut a = Frame::mono(30000);
        a.mix(Frame::mono(10000));
        assert_eq!(a, Frame::mono(32767));
    }
}
