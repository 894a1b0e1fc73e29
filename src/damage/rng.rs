//! SplitMix64 generator for discrete damage sampling.
//! Deterministic: the same seed yields the same sequence. Not cryptographically secure.

const SPLITMIX64_GOLDEN: u64 = 0x9e3779b97f4a7c15;
const SPLITMIX64_M1: u64 = 0xbf58476d1ce4e5b9;
const SPLITMIX64_M2: u64 = 0x94d049bb133111eb;

#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generator for one (asset, event) pair so results do not depend on
    /// evaluation order or thread count.
    pub fn for_asset_event(master_seed: u64, asset_ordinal: usize, event_ordinal: usize) -> Self {
        let mut mixer = Self::new(master_seed ^ (asset_ordinal as u64).rotate_left(32));
        let asset_seed = mixer.next_u64();
        Self::new(asset_seed.wrapping_add(event_ordinal as u64))
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(SPLITMIX64_GOLDEN);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(SPLITMIX64_M1);
        z = (z ^ (z >> 27)).wrapping_mul(SPLITMIX64_M2);
        z ^ (z >> 31)
    }

    /// Uniform value in `[0, 1)` from the top 53 bits.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw `count` items into buckets with the given probabilities, as a
    /// chain of conditional binomials. Cost grows with the number of buckets,
    /// not with `count`.
    pub fn multinomial(&mut self, count: u64, probabilities: &[f64]) -> Vec<f64> {
        let mut counts = vec![0.0; probabilities.len()];
        let Some((_, leading)) = probabilities.split_last() else {
            return counts;
        };
        let mut remaining = count;
        let mut remaining_p = 1.0;
        for (index, p) in leading.iter().enumerate() {
            if remaining == 0 {
                break;
            }
            let conditional = if remaining_p > 0.0 {
                (p / remaining_p).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let drawn = self.binomial(remaining, conditional);
            counts[index] = drawn as f64;
            remaining -= drawn;
            remaining_p -= p;
        }
        counts[leading.len()] = remaining as f64;
        counts
    }

    /// Binomial draw: inversion for small means, Hormann's BTRS otherwise.
    pub fn binomial(&mut self, n: u64, p: f64) -> u64 {
        if n == 0 || p <= 0.0 {
            return 0;
        }
        if p >= 1.0 {
            return n;
        }
        if p > 0.5 {
            return n - self.binomial(n, 1.0 - p);
        }
        if n as f64 * p < 10.0 {
            self.binomial_inversion(n, p)
        } else {
            self.binomial_btrs(n, p)
        }
    }

    /// Count geometric waiting times that fit in `n` trials; about `n * p` draws.
    fn binomial_inversion(&mut self, n: u64, p: f64) -> u64 {
        let log_q = (-p).ln_1p();
        let mut trials = 0.0;
        let mut successes = 0;
        loop {
            // 1 - u lies in (0, 1], so the log is finite
            let u = 1.0 - self.next_f64();
            trials += (u.ln() / log_q).ceil().max(1.0);
            if trials > n as f64 {
                return successes;
            }
            successes += 1;
        }
    }

    /// Transformed rejection with squeeze, valid for `n * p >= 10` and `p <= 0.5`.
    fn binomial_btrs(&mut self, n: u64, p: f64) -> u64 {
        let n_f = n as f64;
        let stddev = (n_f * p * (1.0 - p)).sqrt();
        let b = 1.15 + 2.53 * stddev;
        let a = -0.0873 + 0.0248 * b + 0.01 * p;
        let c = n_f * p + 0.5;
        let v_r = 0.92 - 4.2 / b;
        let r = p / (1.0 - p);
        let alpha = (2.83 + 5.1 / b) * stddev;
        let m = ((n_f + 1.0) * p).floor();

        loop {
            let u = self.next_f64() - 0.5;
            let mut v = self.next_f64();
            let us = 0.5 - u.abs();
            let k = ((2.0 * a / us + b) * u + c).floor();
            if k < 0.0 || k > n_f {
                continue;
            }
            if us >= 0.07 && v <= v_r {
                return k as u64;
            }
            v = (v * alpha / (a / (us * us) + b)).ln();
            let upper = (m + 0.5) * ((m + 1.0) / (r * (n_f - m + 1.0))).ln()
                + (n_f + 1.0) * ((n_f - m + 1.0) / (n_f - k + 1.0)).ln()
                + (k + 0.5) * (r * (n_f - k + 1.0) / (k + 1.0)).ln()
                + stirling_tail(m)
                + stirling_tail(n_f - m)
                - stirling_tail(k)
                - stirling_tail(n_f - k);
            if v <= upper {
                return k as u64;
            }
        }
    }
}

/// `ln(k!) - [(k + 0.5) ln(k + 1) - (k + 1) + 0.5 ln(2 pi)]`.
fn stirling_tail(k: f64) -> f64 {
    const TABLE: [f64; 10] = [
        0.081_061_466_795_327_2,
        0.041_340_695_955_409_2,
        0.027_677_925_684_998_3,
        0.020_790_672_103_765_09,
        0.016_644_691_189_821_1,
        0.013_876_128_823_070_7,
        0.011_896_709_945_891_7,
        0.010_411_265_261_972_0,
        0.009_255_462_182_712_73,
        0.008_330_563_433_362_87,
    ];
    if k <= 9.0 {
        return TABLE[k as usize];
    }
    let kp1_sq = (k + 1.0) * (k + 1.0);
    (1.0 / 12.0 - (1.0 / 360.0 - 1.0 / 1260.0 / kp1_sq) / kp1_sq) / (k + 1.0)
}
