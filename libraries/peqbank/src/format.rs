//! Sample format conversion and (de)interleaving
//!
//! 16-bit samples map to floats by dividing by 32767; floats map back by
//! scaling, rounding to nearest and saturating at the `i16` range.

/// Scale between `i16` and unit-range floats
pub const I16_SCALE: f32 = 32767.0;

#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / I16_SCALE
}

/// Round to nearest; out-of-range values saturate, NaN maps to 0
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * I16_SCALE).round() as i16
}

/// Split interleaved frames into per-channel buffers
pub fn deinterleave<T: Copy>(
    interleaved: &[T],
    planar: &mut [Vec<f32>],
    frames: usize,
    convert: impl Fn(T) -> f32,
) {
    let channels = planar.len();
    if channels == 0 {
        return;
    }
    for (frame, samples) in interleaved.chunks_exact(channels).take(frames).enumerate() {
        for (channel, sample) in samples.iter().enumerate() {
            planar[channel][frame] = convert(*sample);
        }
    }
}

/// Merge per-channel buffers into interleaved frames
pub fn interleave<T>(
    planar: &[Vec<f32>],
    interleaved: &mut [T],
    frames: usize,
    convert: impl Fn(f32) -> T,
) {
    let channels = planar.len();
    if channels == 0 {
        return;
    }
    for (frame, samples) in interleaved
        .chunks_exact_mut(channels)
        .take(frames)
        .enumerate()
    {
        for (channel, sample) in samples.iter_mut().enumerate() {
            *sample = convert(planar[channel][frame]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_round_trip_full_range() {
        for sample in i16::MIN..=i16::MAX {
            assert_eq!(f32_to_i16(i16_to_f32(sample)), sample);
        }
    }

    #[test]
    fn f32_to_i16_rounds_and_saturates() {
        assert_eq!(f32_to_i16(0.6 / I16_SCALE), 1);
        assert_eq!(f32_to_i16(0.4 / I16_SCALE), 0);
        assert_eq!(f32_to_i16(-0.6 / I16_SCALE), -1);
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
        assert_eq!(f32_to_i16(f32::NAN), 0);
    }

    #[test]
    fn interleave_round_trip() {
        let interleaved = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut planar = vec![vec![0.0; 3]; 2];
        deinterleave(&interleaved, &mut planar, 3, |s| s);
        assert_eq!(planar, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);

        let mut out = [0.0f32; 6];
        interleave(&planar, &mut out, 3, |s| s);
        assert_eq!(out, interleaved);
    }

    #[test]
    fn partial_frames() {
        let interleaved = [1i16, 2, 3, 4];
        let mut planar = vec![vec![0.0; 4]; 2];
        deinterleave(&interleaved, &mut planar, 1, i16_to_f32);
        assert_eq!(planar[0][0], i16_to_f32(1));
        assert_eq!(planar[1][0], i16_to_f32(2));
        assert_eq!(planar[0][1], 0.0);
    }
}
