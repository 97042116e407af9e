#[derive(Clone, Copy, Debug)]
pub(crate) struct Fnv1a64(u64);

impl Fnv1a64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;

    pub(crate) fn new_default() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= u64::from(b);
            h = h.wrapping_mul(Self::PRIME);
        }
        self.0 = h;
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}

/// Stable FNV-1a hash of a byte string.
pub(crate) fn stable_hash64(bytes: &[u8]) -> u64 {
    let mut h = Fnv1a64::new_default();
    h.write_bytes(bytes);
    h.finish()
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Rng64 {
    state: u64,
}

impl Rng64 {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        // SplitMix64
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div255_bounds() {
        assert_eq!(mul_div255_u8(0, 0), 0);
        assert_eq!(mul_div255_u8(255, 255), 255);
        assert_eq!(mul_div255_u8(255, 0), 0);
        assert_eq!(mul_div255_u8(128, 255), 128);
    }

    #[test]
    fn stable_hash_is_stable_and_distinguishes() {
        assert_eq!(stable_hash64(b"hello"), stable_hash64(b"hello"));
        assert_ne!(stable_hash64(b"hello"), stable_hash64(b"hellp"));
    }

    #[test]
    fn rng_streams_are_deterministic() {
        let mut a = Rng64::new(7);
        let mut b = Rng64::new(7);
        for _ in 0..8 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let mut c = Rng64::new(8);
        assert_ne!(Rng64::new(7).next_u64(), c.next_u64());
    }
}
