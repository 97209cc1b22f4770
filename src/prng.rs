//! A deterministic 32-bit PRNG (spec §4.6, component C2), used only to derive cipher key
//! material from a 32-bit seed. Not cryptographically secure; that's fine, since the seed itself
//! (the "encryption key") is the actual secret, not this stream.
//!
//! This is a xorshift32 generator (Marsaglia's variant), grounded the way `blte`'s sibling crate
//! `ngdp-crypto` derives per-file keys from small integer seeds: a cheap, dependency-free,
//! fully reproducible expansion step ahead of the real cipher.
#[derive(Clone, Debug)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Seed the generator. A seed of zero is remapped to a fixed non-zero constant, since
    /// xorshift is fixed at zero forever otherwise.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9e3779b9 } else { seed },
        }
    }

    /// Draw the next 32-bit word and advance the state.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Discard `n` draws without using their output; this is the "spin" step of spec §4.6.
    pub fn spin(&mut self, n: u32) {
        for _ in 0..n {
            self.next_u32();
        }
    }

    /// Draw `n` words as little-endian bytes, concatenated.
    pub fn next_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n * 4);
        for _ in 0..n {
            out.extend_from_slice(&self.next_u32().to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_stream() {
        let mut a = Xorshift32::new(12345);
        let mut b = Xorshift32::new(12345);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn zero_seed_is_remapped() {
        let mut gen = Xorshift32::new(0);
        assert_ne!(gen.next_u32(), 0);
    }

    #[test]
    fn spin_advances_state_without_emitting() {
        let mut a = Xorshift32::new(7);
        let mut b = Xorshift32::new(7);
        a.spin(3);
        for _ in 0..3 {
            b.next_u32();
        }
        assert_eq!(a.next_u32(), b.next_u32());
    }
}
