//! Fractional-sample interpolation kernels
//!
//! Pure functions used by every ring-buffer reader in the crate. Positions
//! handed to the `read_*` helpers may be negative or past the end; they are
//! wrapped into the ring first.

/// Number of samples the Hermite kernel touches around the read position
pub const HERMITE_SUPPORT: usize = 4;

/// Linear interpolation between two samples
#[inline]
pub fn linear(y0: f32, y1: f32, frac: f32) -> f32 {
    y0 + frac * (y1 - y0)
}

/// 4-point, 3rd-order Hermite interpolation
///
/// `frac` is the position between `y1` and `y2`.
#[inline]
pub fn hermite(y0: f32, y1: f32, y2: f32, y3: f32, frac: f32) -> f32 {
    let c0 = y1;
    let c1 = 0.5 * (y2 - y0);
    let c2 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let c3 = 0.5 * (y3 - y0) + 1.5 * (y1 - y2);
    ((c3 * frac + c2) * frac + c1) * frac + c0
}

/// Wrap a fractional position into `[0, len)`
#[inline]
pub fn wrap_position(position: f64, len: usize) -> f64 {
    let len = len as f64;
    let wrapped = position % len;
    if wrapped < 0.0 {
        wrapped + len
    } else {
        wrapped
    }
}

/// Linearly interpolated read from a ring buffer
#[inline]
pub fn read_linear(ring: &[f32], position: f64) -> f32 {
    let len = ring.len();
    if len == 0 {
        return 0.0;
    }
    let position = wrap_position(position, len);
    let index = position as usize % len;
    let next = (index + 1) % len;
    let frac = (position - position.floor()) as f32;
    linear(ring[index], ring[next], frac)
}

/// Hermite-interpolated read from a ring buffer
#[inline]
pub fn read_hermite(ring: &[f32], position: f64) -> f32 {
    let len = ring.len();
    if len < HERMITE_SUPPORT {
        return read_linear(ring, position);
    }
    let position = wrap_position(position, len);
    let index = position as usize % len;
    let frac = (position - position.floor()) as f32;

    let i0 = (index + len - 1) % len;
    let i2 = (index + 1) % len;
    let i3 = (index + 2) % len;
    hermite(ring[i0], ring[index], ring[i2], ring[i3], frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_linear_endpoints() {
        assert_eq!(linear(1.0, 3.0, 0.0), 1.0);
        assert_eq!(linear(1.0, 3.0, 1.0), 3.0);
        assert_eq!(linear(1.0, 3.0, 0.5), 2.0);
    }

    #[test]
    fn test_hermite_passes_through_samples() {
        assert_abs_diff_eq!(hermite(0.0, 1.0, 2.0, 3.0, 0.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hermite(0.0, 1.0, 2.0, 3.0, 1.0), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_hermite_is_exact_on_lines() {
        // A cubic kernel reproduces straight lines exactly
        for step in 0..10 {
            let frac = step as f32 / 10.0;
            assert_abs_diff_eq!(hermite(-1.0, 0.0, 1.0, 2.0, frac), frac, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_wrap_position() {
        assert_abs_diff_eq!(wrap_position(-1.5, 10), 8.5, epsilon = 1e-9);
        assert_abs_diff_eq!(wrap_position(12.25, 10), 2.25, epsilon = 1e-9);
        assert_abs_diff_eq!(wrap_position(3.0, 10), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_read_linear_wraps_between_end_and_start() {
        let ring = [0.0, 0.0, 0.0, 1.0];
        // Halfway between index 3 (1.0) and index 0 (0.0)
        assert_abs_diff_eq!(read_linear(&ring, 3.5), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(read_linear(&ring, -0.5), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_read_hermite_integer_positions() {
        let ring = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        for (i, &expected) in ring.iter().enumerate() {
            assert_abs_diff_eq!(read_hermite(&ring, i as f64), expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_empty_ring_reads_silence() {
        assert_eq!(read_linear(&[], 3.0), 0.0);
        assert_eq!(read_hermite(&[], 3.0), 0.0);
    }
}
