//! Second-difference decoder for XLI lead data.
//!
//! The LZW expansion of a lead holds `count` high bytes followed by
//! `count` low bytes. Joined, they form 16-bit raw values: the first two
//! are samples, every later one is a biased difference term that feeds
//! the recurrence one step late.

/// Bias subtracted from every raw value used as a difference term.
pub const DELTA_BIAS: i16 = 64;

/// Joins the planar high/low byte halves into `count` raw values.
///
/// Missing bytes (short expansion) read as 0.
pub fn unpack(expanded: &[u8], count: usize) -> Vec<i16> {
    let byte = |i: usize| expanded.get(i).copied().unwrap_or(0);
    (0..count)
        .map(|j| ((u16::from(byte(j)) << 8) | u16::from(byte(count + j))) as i16)
        .collect()
}

/// Decodes `count` samples from an expanded lead.
///
/// `seed` is the chunk header's starting difference term. Arithmetic runs
/// in i32; every stored value wraps to i16.
pub fn decode_deltas(expanded: &[u8], count: usize, seed: i16) -> Vec<i16> {
    let mut samples = unpack(expanded, count);
    if count < 3 {
        return samples;
    }

    let mut last = seed;
    let mut x = samples[0];
    let mut y = samples[1];
    for sample in &mut samples[2..] {
        let z = 2 * i32::from(y) - i32::from(x) - i32::from(last);
        // Der Rohwert an Position j wirkt erst auf Sample j+1.
        last = sample.wrapping_sub(DELTA_BIAS);
        *sample = z as i16;
        x = y;
        y = z as i16;
    }
    samples
}
