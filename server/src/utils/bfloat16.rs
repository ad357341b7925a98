//! bfloat16 encoding for compressed summary histograms
//!
//! Histogram bucket means are stored as bfloat16: the high 16 bits of the
//! IEEE-754 single-precision representation (1 sign bit, 8 exponent bits,
//! 7 mantissa bits). The ~2 significant decimal digits of precision are
//! plenty for bucket means while collapsing near-identical means onto the
//! same key.

/// Encode an f64 as bfloat16 (truncating rounding)
pub fn from_f64(v: f64) -> u16 {
    ((v as f32).to_bits() >> 16) as u16
}

/// Decode a bfloat16 back to f64
pub fn to_f64(v: u16) -> f64 {
    f32::from_bits((v as u32) << 16) as f64
}
