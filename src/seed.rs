//! Deterministic per-round seeds
//!
//! Every observer of a round must derive the same seed from the same
//! `(game_type, round_id)` pair, on any platform. Only integer arithmetic with
//! explicit wrapping is used here, so the result never depends on the host.

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Golden-ratio multiplier (odd, so multiplication is a bijection on u32)
const ROUND_MUL: u32 = 0x9E37_79B9;
const HIGH_MUL: u32 = 0x85EB_CA77;

/// FNV-1a over the UTF-8 bytes of a string
#[inline]
pub fn fnv1a(text: &str) -> u32 {
    text.bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ b as u32).wrapping_mul(FNV_PRIME))
}

/// murmur3 32-bit finalizer (bijective avalanche)
#[inline]
pub fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    h
}

/// Seed for one round of one game type
///
/// For a fixed game type the mapping is a bijection over the low 32 bits of
/// `round_id`, so sequential rounds never share a seed.
pub fn round_seed(game_type: &str, round_id: u64) -> u32 {
    let low = round_id as u32;
    let high = (round_id >> 32) as u32;
    let mixed = low.wrapping_mul(ROUND_MUL)
        ^ fnv1a(game_type)
        ^ high.wrapping_mul(HIGH_MUL).rotate_left(16);
    fmix32(mixed)
}

/// Per-round offset along the noise time axis, so rounds don't visually sync
#[inline]
pub fn noise_offset(seed: u32) -> f64 {
    (seed as f64 / u32::MAX as f64) * 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_round_seed_is_pure() {
        assert_eq!(round_seed("craps", 7), round_seed("craps", 7));
        assert_eq!(round_seed("roulette", 3), round_seed("roulette", 3));
    }

    #[test]
    fn test_round_seed_known_value_is_stable() {
        // Pin one value so a change to the mixing shows up as a test failure.
        let expected = fmix32(7u32.wrapping_mul(ROUND_MUL) ^ fnv1a("craps"));
        assert_eq!(round_seed("craps", 7), expected);
    }

    #[test]
    fn test_sequential_rounds_never_collide() {
        let seeds: HashSet<u32> = (0..1000u64).map(|id| round_seed("roulette", id)).collect();
        assert_eq!(seeds.len(), 1000);
    }

    #[test]
    fn test_adjacent_rounds_differ() {
        assert_ne!(round_seed("craps", 1), round_seed("craps", 2));
    }

    #[test]
    fn test_game_type_changes_seed() {
        assert_ne!(round_seed("craps", 42), round_seed("roulette", 42));
    }

    #[test]
    fn test_fnv1a_reference() {
        // Published FNV-1a 32-bit test vectors
        assert_eq!(fnv1a(""), 0x811C_9DC5);
        assert_eq!(fnv1a("a"), 0xE40C_292C);
    }

    #[test]
    fn test_noise_offset_range() {
        assert_eq!(noise_offset(0), 0.0);
        assert!((noise_offset(u32::MAX) - 1024.0).abs() < 1e-9);
    }

    mod proptests {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: identical inputs always give the identical seed
            #[test]
            fn prop_round_seed_deterministic(game in "[a-z]{1,12}", id in any::<u64>()) {
                prop_assert_eq!(round_seed(&game, id), round_seed(&game, id));
            }
        }
    }
}
