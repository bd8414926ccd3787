//! Seedable, namespaceable pseudorandom source.
//!
//! Nothing in the simulator may call a platform RNG. All randomness flows
//! through [`Xorshift32`] generators derived from the run seed, so a fixed
//! `(seed, patient, namespace)` always replays the same stream.

use std::f64::consts::PI;

const U32_RANGE: f64 = 4_294_967_296.0;

/// 32-bit xorshift generator. Zero seeds are remapped to one, since zero is
/// a fixed point of the shift sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform draw in the open interval (0, 1).
    ///
    /// The raw word is never zero for a non-zero state, and dividing by 2^32
    /// keeps the result strictly below one.
    pub fn uniform(&mut self) -> f64 {
        f64::from(self.next_u32()) / U32_RANGE
    }

    /// Normal draw via a Box–Muller pair, inputs clamped away from zero.
    pub fn normal(&mut self, mu: f64, sigma: f64) -> f64 {
        let u1 = self.uniform().max(1e-12);
        let u2 = self.uniform();
        let radius = (-2.0 * u1.ln()).sqrt();
        mu + sigma * radius * (2.0 * PI * u2).cos()
    }

    /// Exponential delay with rate `lambda`; infinite when the rate is not
    /// strictly positive.
    pub fn expo(&mut self, lambda: f64) -> f64 {
        if lambda > 0.0 {
            -(1.0 - self.uniform()).ln() / lambda
        } else {
            f64::INFINITY
        }
    }

    /// Derive a child generator by mixing the current state with a stable
    /// hash of `namespace`. The parent state is not advanced, so equally
    /// named children of identically seeded parents produce identical
    /// streams.
    pub fn child(&self, namespace: &str) -> Xorshift32 {
        Xorshift32::new(self.state ^ stable_hash(namespace))
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}

fn stable_hash(input: &str) -> u32 {
    let mut hash = 2_166_136_261_u32;
    for byte in input.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_seeds_produce_identical_streams() {
        let mut a = Xorshift32::new(1337);
        let mut b = Xorshift32::new(1337);
        for _ in 0..64 {
            assert_eq!(a.uniform(), b.uniform());
        }
    }

    #[test]
    fn zero_seed_is_remapped() {
        let mut zero = Xorshift32::new(0);
        let mut one = Xorshift32::new(1);
        assert_eq!(zero.uniform(), one.uniform());
    }

    #[test]
    fn uniform_stays_in_the_open_interval() {
        let mut rng = Xorshift32::new(99);
        for _ in 0..10_000 {
            let draw = rng.uniform();
            assert!(draw > 0.0 && draw < 1.0, "draw out of range: {draw}");
        }
    }

    #[test]
    fn expo_with_non_positive_rate_is_infinite() {
        let mut rng = Xorshift32::new(7);
        assert!(rng.expo(0.0).is_infinite());
        assert!(rng.expo(-3.0).is_infinite());
        assert!(rng.expo(0.5).is_finite());
    }

    #[test]
    fn children_with_equal_names_are_identical() {
        let parent = Xorshift32::new(42);
        let mut a = parent.child("t2dm:v3:t0");
        let mut b = parent.child("t2dm:v3:t0");
        for _ in 0..16 {
            assert_eq!(a.uniform(), b.uniform());
        }
    }

    #[test]
    fn drawing_from_one_child_does_not_disturb_another() {
        let parent = Xorshift32::new(42);
        let mut noisy = parent.child("A");
        for _ in 0..100 {
            noisy.uniform();
        }
        let mut fresh_a = parent.child("A");
        let mut b = parent.child("B");
        let mut b_again = parent.child("B");
        assert_eq!(b.uniform(), b_again.uniform());
        // the parent itself was never advanced by derivation
        assert_eq!(parent.child("A").state(), fresh_a.state());
        fresh_a.uniform();
    }

    #[test]
    fn normal_is_centered_near_mu() {
        let mut rng = Xorshift32::new(2024);
        let mean: f64 = (0..4_000).map(|_| rng.normal(10.0, 2.0)).sum::<f64>() / 4_000.0;
        assert!((mean - 10.0).abs() < 0.2, "sample mean drifted: {mean}");
    }
}
