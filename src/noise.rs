//! Seeded simplex noise
//!
//! A self-contained 3D simplex implementation. The permutation table is
//! shuffled by a PCG32 stream seeded from the round seed, so two processes
//! given the same seed produce bit-identical samples regardless of any
//! noise crate version.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;

use crate::consts::NOISE_CACHE_CAPACITY;

const F3: f64 = 1.0 / 3.0;
const G3: f64 = 1.0 / 6.0;

/// Scales the raw simplex sum into roughly [-1, 1]
const OUTPUT_SCALE: f64 = 32.0;

const GRAD3: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

/// 3D simplex noise with a seed-derived permutation
#[derive(Debug, Clone)]
pub struct SimplexNoise {
    seed: u32,
    perm: [u8; 512],
}

impl SimplexNoise {
    pub fn new(seed: u32) -> Self {
        let mut table: [u8; 256] = std::array::from_fn(|i| i as u8);

        // Fisher-Yates driven directly by next_u32 so the shuffle only depends
        // on the PCG32 algorithm, not on rand's distribution helpers.
        let mut rng = Pcg32::seed_from_u64(seed as u64);
        for i in (1..table.len()).rev() {
            let j = (rng.next_u32() % (i as u32 + 1)) as usize;
            table.swap(i, j);
        }

        let perm = std::array::from_fn(|i| table[i & 255]);
        Self { seed, perm }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Sample the noise field. Output is in [-1, 1]; non-finite input gives 0.
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return 0.0;
        }

        // Skew input space to find the containing simplex cell
        let s = (x + y + z) * F3;
        let i = (x + s).floor();
        let j = (y + s).floor();
        let k = (z + s).floor();
        let t = (i + j + k) * G3;
        let x0 = x - (i - t);
        let y0 = y - (j - t);
        let z0 = z - (k - t);

        let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
            if y0 >= z0 {
                (1, 0, 0, 1, 1, 0)
            } else if x0 >= z0 {
                (1, 0, 0, 1, 0, 1)
            } else {
                (0, 0, 1, 1, 0, 1)
            }
        } else if y0 < z0 {
            (0, 0, 1, 0, 1, 1)
        } else if x0 < z0 {
            (0, 1, 0, 0, 1, 1)
        } else {
            (0, 1, 0, 1, 1, 0)
        };

        let x1 = x0 - i1 as f64 + G3;
        let y1 = y0 - j1 as f64 + G3;
        let z1 = z0 - k1 as f64 + G3;
        let x2 = x0 - i2 as f64 + 2.0 * G3;
        let y2 = y0 - j2 as f64 + 2.0 * G3;
        let z2 = z0 - k2 as f64 + 2.0 * G3;
        let x3 = x0 - 1.0 + 3.0 * G3;
        let y3 = y0 - 1.0 + 3.0 * G3;
        let z3 = z0 - 1.0 + 3.0 * G3;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;
        let kk = (k as i64 & 255) as usize;

        let gi0 = self.hash(ii, jj, kk);
        let gi1 = self.hash(ii + i1, jj + j1, kk + k1);
        let gi2 = self.hash(ii + i2, jj + j2, kk + k2);
        let gi3 = self.hash(ii + 1, jj + 1, kk + 1);

        let n = corner(gi0, x0, y0, z0)
            + corner(gi1, x1, y1, z1)
            + corner(gi2, x2, y2, z2)
            + corner(gi3, x3, y3, z3);

        (OUTPUT_SCALE * n).clamp(-1.0, 1.0)
    }

    /// Fractal (multi-octave) noise, normalized back into [-1, 1]
    pub fn fbm(&self, x: f64, y: f64, z: f64, octaves: u32, lacunarity: f64, gain: f64) -> f64 {
        let mut sum = 0.0;
        let mut total_amplitude = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;

        for _ in 0..octaves {
            sum += amplitude * self.sample(x * frequency, y * frequency, z * frequency);
            total_amplitude += amplitude;
            amplitude *= gain;
            frequency *= lacunarity;
        }

        if total_amplitude > 0.0 {
            (sum / total_amplitude).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    #[inline]
    fn hash(&self, i: usize, j: usize, k: usize) -> usize {
        let p = &self.perm;
        p[i + p[j + p[k] as usize] as usize] as usize % 12
    }
}

#[inline]
fn corner(gi: usize, x: f64, y: f64, z: f64) -> f64 {
    let t = 0.6 - x * x - y * y - z * z;
    if t < 0.0 {
        0.0
    } else {
        let g = GRAD3[gi];
        let t2 = t * t;
        t2 * t2 * (g[0] * x + g[1] * y + g[2] * z)
    }
}

/// Deterministic sampler closure for a seed
pub fn noise_sampler(seed: u32) -> impl Fn(f64, f64, f64) -> f64 {
    let noise = SimplexNoise::new(seed);
    move |x, y, z| noise.sample(x, y, z)
}

/// Noise instances cached by seed, evicting the oldest insertion when full
#[derive(Debug)]
pub struct NoiseCache {
    capacity: usize,
    order: VecDeque<u32>,
    entries: HashMap<u32, Arc<SimplexNoise>>,
}

impl Default for NoiseCache {
    fn default() -> Self {
        Self::new(NOISE_CACHE_CAPACITY)
    }
}

impl NoiseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Get (or build) the noise instance for a seed
    pub fn get(&mut self, seed: u32) -> Arc<SimplexNoise> {
        if let Some(noise) = self.entries.get(&seed) {
            return Arc::clone(noise);
        }

        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                log::debug!("Evicted noise instance for seed {:#010x}", oldest);
            }
        }

        let noise = Arc::new(SimplexNoise::new(seed));
        self.order.push_back(seed);
        self.entries.insert(seed, Arc::clone(&noise));
        noise
    }

    pub fn contains(&self, seed: u32) -> bool {
        self.entries.contains_key(&seed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_bit_identical() {
        let a = SimplexNoise::new(1234);
        let b = SimplexNoise::new(1234);
        for i in 0..100 {
            let x = i as f64 * 0.37;
            let y = i as f64 * -0.11;
            let z = i as f64 * 0.05 + 3.0;
            assert_eq!(a.sample(x, y, z).to_bits(), b.sample(x, y, z).to_bits());
        }
    }

    #[test]
    fn test_sample_range() {
        let noise = SimplexNoise::new(42);
        for i in 0..2000 {
            let v = noise.sample(i as f64 * 0.173, i as f64 * 0.291, i as f64 * -0.057);
            assert!((-1.0..=1.0).contains(&v), "sample {} out of range", v);
        }
    }

    #[test]
    fn test_sample_varies() {
        let noise = SimplexNoise::new(7);
        let samples: Vec<f64> = (0..50).map(|i| noise.sample(i as f64 * 0.31, 0.5, 0.25)).collect();
        assert!(samples.iter().any(|v| *v > 0.05));
        assert!(samples.iter().any(|v| *v < -0.05));
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = SimplexNoise::new(1);
        let b = SimplexNoise::new(2);
        let differs = (0..50).any(|i| {
            let x = i as f64 * 0.41 + 0.2;
            a.sample(x, 0.3, 0.7) != b.sample(x, 0.3, 0.7)
        });
        assert!(differs);
    }

    #[test]
    fn test_non_finite_input_is_zero() {
        let noise = SimplexNoise::new(9);
        assert_eq!(noise.sample(f64::NAN, 0.0, 0.0), 0.0);
        assert_eq!(noise.sample(0.0, f64::INFINITY, 0.0), 0.0);
    }

    #[test]
    fn test_fbm_range_and_determinism() {
        let noise = SimplexNoise::new(99);
        for i in 0..200 {
            let x = i as f64 * 0.13;
            let v = noise.fbm(x, 1.0, -x, 4, 2.0, 0.5);
            assert!((-1.0..=1.0).contains(&v));
            assert_eq!(v.to_bits(), noise.fbm(x, 1.0, -x, 4, 2.0, 0.5).to_bits());
        }
        assert_eq!(noise.fbm(1.0, 2.0, 3.0, 0, 2.0, 0.5), 0.0);
    }

    #[test]
    fn test_noise_sampler_matches_instance() {
        let sampler = noise_sampler(555);
        let noise = SimplexNoise::new(555);
        assert_eq!(sampler(0.3, 0.6, 0.9).to_bits(), noise.sample(0.3, 0.6, 0.9).to_bits());
    }

    #[test]
    fn test_cache_reuses_instances() {
        let mut cache = NoiseCache::new(4);
        let a = cache.get(10);
        let b = cache.get(10);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_evicts_oldest_first() {
        let mut cache = NoiseCache::new(3);
        cache.get(1);
        cache.get(2);
        cache.get(3);
        // Re-reading seed 1 does not refresh its position
        cache.get(1);
        cache.get(4);

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
        assert!(cache.contains(3));
        assert!(cache.contains(4));
    }
}
