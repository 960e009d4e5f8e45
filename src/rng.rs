//! Random number generation
//!
//! Two generators share one drawing interface ([`RandomSource`]):
//!
//! - [`PredictableRandom`] produces the same byte stream on every device for
//!   the same seed material. Seeds are mixed with FNV-1a and bytes are drawn
//!   from a 64-bit xorshift* state, both cheap on 8/32-bit cores.
//! - [`UnpredictableRandom`] reads a true entropy source. It is only used for
//!   decisions that must differ between devices (pattern picks), never for
//!   anything rendered.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const XORSHIFT_MULTIPLIER: u64 = 0x2545_f491_4f6c_dd1d;

/// Shared drawing interface for both generators.
pub trait RandomSource {
    /// Fill `buf` with random bytes
    fn fill_bytes(&mut self, buf: &mut [u8]);

    fn random_u8(&mut self) -> u8 {
        let mut buf = [0u8; 1];
        self.fill_bytes(&mut buf);
        buf[0]
    }

    fn random_u16(&mut self) -> u16 {
        let mut buf = [0u8; 2];
        self.fill_bytes(&mut buf);
        u16::from_be_bytes(buf)
    }

    fn random_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_be_bytes(buf)
    }

    fn random_bool(&mut self) -> bool {
        self.random_u8() & 1 != 0
    }

    /// Uniform value in `[0.0, 1.0)`
    #[allow(clippy::cast_precision_loss)]
    fn random_unit_f32(&mut self) -> f32 {
        (self.random_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform value in `[min, max]` without modulo bias.
    ///
    /// Draws landing in the remainder region above the last full bin are
    /// rejected and redrawn.
    fn random_between(&mut self, min: u32, max: u32) -> u32 {
        assert!(min <= max, "random_between: min {min} > max {max}");
        let span = max - min;
        if span == u32::MAX {
            return self.random_u32();
        }
        let num_bins = span + 1;
        let bin_size = u32::MAX / num_bins;
        let limit = u32::MAX - (u32::MAX % num_bins);
        loop {
            let draw = self.random_u32();
            if draw > limit {
                continue;
            }
            // `limit / bin_size` can equal `num_bins` for the single draw
            // sitting exactly on `limit`.
            let bin = draw / bin_size;
            if bin < num_bins {
                return min + bin;
            }
        }
    }
}

/// Deterministic generator.
///
/// Every frame reseeds it with [`PredictableRandom::reset_with_frame`], so the
/// output never depends on call history from earlier frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictableRandom {
    state: u64,
    consumed: u8,
}

impl Default for PredictableRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictableRandom {
    pub const fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
            consumed: 0,
        }
    }

    /// Reset to the FNV-1a offset basis
    pub fn reset(&mut self) {
        self.state = FNV_OFFSET_BASIS;
        self.consumed = 0;
    }

    /// Fold one byte into the state (FNV-1a step)
    pub fn ingest_byte(&mut self, byte: u8) {
        self.state = (self.state ^ u64::from(byte)).wrapping_mul(FNV_PRIME);
        self.consumed = 0;
    }

    pub fn ingest_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.ingest_byte(byte);
        }
    }

    /// Ingest a label followed by a NUL terminator.
    ///
    /// The terminator keeps `"a"` + `"bc"` distinct from `"ab"` + `"c"`.
    pub fn ingest_label(&mut self, label: &str) {
        self.ingest_bytes(label.as_bytes());
        self.ingest_byte(0);
    }

    /// Ingest a 32-bit value in big-endian order
    pub fn ingest_u32(&mut self, value: u32) {
        self.ingest_bytes(&value.to_be_bytes());
    }

    /// Canonical per-frame reseed.
    ///
    /// Two devices agreeing on `(pattern, elapsed)` get identical streams.
    pub fn reset_with_frame(&mut self, pattern: u32, elapsed: u32, label: &str) {
        self.reset();
        self.ingest_label(label);
        self.ingest_u32(pattern);
        self.ingest_label(label);
        self.ingest_u32(elapsed);
        self.ingest_label(label);
    }

    /// Derive an independent sub-stream from the current state.
    ///
    /// Used to give every grid cell its own reproducible values without
    /// depending on the order in which pixels are visited.
    #[must_use]
    pub fn fork(&self, tag: u32) -> Self {
        let mut forked = self.clone();
        forked.ingest_u32(tag);
        forked
    }

    /// Advance the state with one xorshift* step
    fn advance(&mut self) {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x.wrapping_mul(XORSHIFT_MULTIPLIER);
        self.consumed = 0;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn next_byte(&mut self) -> u8 {
        if usize::from(self.consumed) >= core::mem::size_of::<u64>() {
            self.advance();
        }
        let byte = (self.state >> (8 * u32::from(self.consumed))) as u8;
        self.consumed += 1;
        byte
    }
}

impl RandomSource for PredictableRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        for byte in buf {
            *byte = self.next_byte();
        }
    }
}

/// Source of true randomness (hardware RNG, OS random device).
pub trait EntropySource {
    fn fill_entropy(&mut self, buf: &mut [u8]);
}

/// Generator backed by an [`EntropySource`].
#[derive(Debug, Clone)]
pub struct UnpredictableRandom<E: EntropySource> {
    source: E,
}

impl<E: EntropySource> UnpredictableRandom<E> {
    pub const fn new(source: E) -> Self {
        Self { source }
    }

    pub fn source_mut(&mut self) -> &mut E {
        &mut self.source
    }
}

impl<E: EntropySource> RandomSource for UnpredictableRandom<E> {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        self.source.fill_entropy(buf);
    }
}

/// Operating system entropy via `getrandom`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

#[cfg(feature = "std")]
impl EntropySource for OsEntropy {
    fn fill_entropy(&mut self, buf: &mut [u8]) {
        // Only fails on platforms without any entropy device.
        if let Err(err) = getrandom::fill(buf) {
            panic!("OS entropy unavailable: {err}");
        }
    }
}

/// Reproducible stand-in for a hardware entropy source.
///
/// Emits a scrambled counter so simulations and tests are repeatable.
#[derive(Debug, Clone, Default)]
pub struct CountingEntropy {
    rng: PredictableRandom,
}

impl CountingEntropy {
    pub fn new(seed: u32) -> Self {
        let mut rng = PredictableRandom::new();
        rng.ingest_label("entropy");
        rng.ingest_u32(seed);
        Self { rng }
    }
}

impl EntropySource for CountingEntropy {
    fn fill_entropy(&mut self, buf: &mut [u8]) {
        self.rng.fill_bytes(buf);
    }
}
