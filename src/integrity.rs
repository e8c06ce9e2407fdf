//! HRDL additive integrity checksum.
//!
//! The wire format specifies a trivial additive sum: every byte of the
//! covered span added into a 32-bit accumulator with wraparound. Weak by
//! cryptographic standards, but exactly what the format declares in its
//! trailer word.
//!
//! There is deliberately no shared or global accumulator; construct an
//! [HrdlSum] per call or per decoder so that concurrent decoders never
//! contend on checksum state.

/// Streaming accumulator for the HRDL additive checksum.
#[derive(Debug, Default, Clone, Copy)]
pub struct HrdlSum {
    sum: u32,
}

impl HrdlSum {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every byte of `buf` into the accumulator.
    pub fn write(&mut self, buf: &[u8]) {
        for &b in buf {
            self.sum = self.sum.wrapping_add(u32::from(b));
        }
    }

    /// Current sum. Does not reset the accumulator.
    #[must_use]
    pub fn sum32(&self) -> u32 {
        self.sum
    }

    pub fn reset(&mut self) {
        self.sum = 0;
    }
}

/// One-shot sum over `buf`.
#[must_use]
pub fn sum32(buf: &[u8]) -> u32 {
    let mut h = HrdlSum::new();
    h.write(buf);
    h.sum32()
}
