//! Partition hash compatible with Postgres `hash_bytes_uint32`.
//!
//! The mix is the lookup3 `final` step applied to a single 32-bit word, seeded
//! the way Postgres seeds a four byte key. Reproducing it bit for bit is what
//! makes the simulated bucketing match a real hash-partitioned table.

/// Lookup3 golden ratio constant.
const GOLDEN_RATIO: u32 = 0x9e37_79b9;
/// Key length in bytes, folded into the seed.
const KEY_LENGTH: u32 = 4;
/// Fixed salt Postgres adds to every `hash_bytes_uint32` seed.
const SEED_SALT: u32 = 3_923_095;

const SEED: u32 = GOLDEN_RATIO
    .wrapping_add(KEY_LENGTH)
    .wrapping_add(SEED_SALT);

/// Mix a 32-bit key into a 32-bit hash value.
#[must_use]
pub const fn hash(key: u32) -> u32 {
    let mut a = SEED;
    let mut b = SEED;
    let mut c = SEED;

    a = a.wrapping_add(key);

    c ^= b;
    c = c.wrapping_sub(b.rotate_left(14));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(11));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(25));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(16));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(4));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(14));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(24));

    c
}

/// Signed view of [`hash`], as Postgres reports it from `hashint4`.
#[must_use]
pub const fn hash_signed(key: u32) -> i32 {
    hash(key).cast_signed()
}

/// Partition slot for `key` among `partition_count` partitions.
///
/// Callers guarantee `partition_count >= 1`; a validated
/// [`SimulationConfig`](crate::config::SimulationConfig) always does.
#[must_use]
pub const fn partition_index(key: u32, partition_count: u32) -> u32 {
    hash(key) % partition_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_matches_lookup3_constant() {
        assert_eq!(SEED, 0x9e73_5654);
    }

    #[test]
    fn matches_postgres_hashint4() {
        let cases: [(u32, i32); 9] = [
            (123_456_789, 524_883_300),
            (987_654_321, -522_295_545),
            (1, -1_905_060_026),
            (2_147_483_647, -96_758_253),
            (42, 1_509_752_520),
            (314_159_265, -489_000_246),
            (271_828_182, -562_529_542),
            (1_618_033_988, -1_731_020_505),
            (272_321, 235_424_784),
        ];
        for (key, expected) in cases {
            assert_eq!(hash_signed(key), expected, "key {key}");
        }
    }

    #[test]
    fn unsigned_output_is_raw_bits() {
        assert_eq!(hash(1), 2_389_907_270);
        assert_eq!(hash(0), 4_022_255_791);
    }

    #[test]
    fn hash_is_deterministic() {
        for key in [0, 1, 7, 100, u32::MAX] {
            assert_eq!(hash(key), hash(key));
        }
    }

    #[test]
    fn index_stays_in_range() {
        for partitions in [1_u32, 2, 3, 10, 97, u32::MAX] {
            for key in [0, 1, 2, 3, 1_000_000, u32::MAX - 1, u32::MAX] {
                assert!(partition_index(key, partitions) < partitions);
            }
        }
    }

    #[test]
    fn single_partition_takes_every_key() {
        for key in 0..100 {
            assert_eq!(partition_index(key, 1), 0);
        }
    }

    #[test]
    fn small_keys_spread_over_three_partitions() {
        let slots: Vec<u32> = (1..=3).map(|key| partition_index(key, 3)).collect();
        assert_eq!(slots, vec![2, 1, 0]);
    }
}
