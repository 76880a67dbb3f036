//! Block kernels for the per-buffer hot path.
//!
//! These are the handful of whole-buffer operations the pipeline and chain
//! perform outside the effects themselves: copies, gain staging, dry/wet
//! mixing, and peak scanning. With the default-on `simd` feature the main
//! loops run eight lanes wide via [`wide::f32x8`]; without it they compile
//! to the scalar tails alone. The operations are linear, so both paths
//! produce identical output and correctness never depends on which one ran.

#[cfg(feature = "simd")]
const LANES: usize = 8;

/// Copy `src` into `dst`. Panics in debug builds on length mismatch.
#[inline]
pub fn copy(src: &[f32], dst: &mut [f32]) {
    debug_assert_eq!(src.len(), dst.len());
    dst.copy_from_slice(src);
}

/// Multiply every sample of `buf` by `gain`, in place.
pub fn apply_gain(buf: &mut [f32], gain: f32) {
    #[cfg(feature = "simd")]
    {
        let vgain = wide::f32x8::splat(gain);
        let mut chunks = buf.chunks_exact_mut(LANES);
        for chunk in &mut chunks {
            let mut lane = [0.0f32; LANES];
            lane.copy_from_slice(chunk);
            let v = wide::f32x8::from(lane) * vgain;
            chunk.copy_from_slice(&v.to_array());
        }
        for sample in chunks.into_remainder() {
            *sample *= gain;
        }
    }
    #[cfg(not(feature = "simd"))]
    {
        for sample in buf.iter_mut() {
            *sample *= gain;
        }
    }
}

/// Write `src * gain` into `dst`.
pub fn scale(src: &[f32], gain: f32, dst: &mut [f32]) {
    debug_assert_eq!(src.len(), dst.len());
    #[cfg(feature = "simd")]
    {
        let vgain = wide::f32x8::splat(gain);
        let mut src_chunks = src.chunks_exact(LANES);
        let mut dst_chunks = dst.chunks_exact_mut(LANES);
        for (s, d) in (&mut src_chunks).zip(&mut dst_chunks) {
            let mut lane = [0.0f32; LANES];
            lane.copy_from_slice(s);
            let v = wide::f32x8::from(lane) * vgain;
            d.copy_from_slice(&v.to_array());
        }
        for (s, d) in src_chunks
            .remainder()
            .iter()
            .zip(dst_chunks.into_remainder())
        {
            *d = *s * gain;
        }
    }
    #[cfg(not(feature = "simd"))]
    {
        for (s, d) in src.iter().zip(dst.iter_mut()) {
            *d = *s * gain;
        }
    }
}

/// Blend `dry` and `wet` into `dst`: `dst = dry * (1 - mix) + wet * mix`.
pub fn mix(dry: &[f32], wet: &[f32], mix: f32, dst: &mut [f32]) {
    debug_assert_eq!(dry.len(), wet.len());
    debug_assert_eq!(dry.len(), dst.len());
    let dry_gain = 1.0 - mix;
    for ((d, w), out) in dry.iter().zip(wet.iter()).zip(dst.iter_mut()) {
        *out = *d * dry_gain + *w * mix;
    }
}

/// Largest absolute sample value in `buf` (0.0 for an empty buffer).
pub fn peak(buf: &[f32]) -> f32 {
    #[cfg(feature = "simd")]
    {
        let mut vmax = wide::f32x8::splat(0.0);
        let mut chunks = buf.chunks_exact(LANES);
        for chunk in &mut chunks {
            let mut lane = [0.0f32; LANES];
            lane.copy_from_slice(chunk);
            vmax = vmax.max(wide::f32x8::from(lane).abs());
        }
        let mut max = vmax.to_array().into_iter().fold(0.0f32, f32::max);
        for &sample in chunks.remainder() {
            max = max.max(sample.abs());
        }
        max
    }
    #[cfg(not(feature = "simd"))]
    {
        buf.iter().fold(0.0f32, |max, &x| max.max(x.abs()))
    }
}
