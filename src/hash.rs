//! Dispatch-key hashing, shared between generation time and run time.
//!
//! Specialization tables are keyed at generation time (in Rust) and probed
//! at run time (in the generated C++). Keys only match if both sides fold
//! values identically, so the Rust combine below and the C++ source in
//! [`CXX_SUPPORT`] are the same function: an order-sensitive accumulator
//! mixing each value with an odd multiplicative constant and rotations of
//! the running state. Keep them in lockstep when touching either.

/// Seed every key computation starts from.
pub const SEED: u64 = 0xcbf2_9ce4_8422_2325;

const MULT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Fold one value into the running hash. Order-sensitive: permuted tuples
/// produce different keys.
pub fn combine(h: u64, v: u64) -> u64 {
    h ^ (v
        .wrapping_mul(MULT)
        .wrapping_add(h.rotate_left(6))
        .wrapping_add(h.rotate_right(2)))
}

/// Key for an ordered tuple of dispatch values.
pub fn of_values<I>(values: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    values.into_iter().fold(SEED, combine)
}

/// Key bits for a floating dispatch value: the raw IEEE-754 pattern. `-0.0`
/// and `+0.0` are distinct keys, as are distinct NaN payloads.
pub fn f64_key(v: f64) -> u64 {
    v.to_bits()
}

/// C++ mirror of the Rust combine, plus the checked float/bits casts,
/// emitted once into the host translation unit. The rotations are spelled
/// as shift-or pairs so the text stays dependency-free.
pub const CXX_SUPPORT: &str = r#"static const uint64_t JIT_HASH_SEED = 0xcbf29ce484222325ull;
static inline uint64_t jit_hash_combine(const uint64_t h, const uint64_t v)
{
   return h ^ (v * 0x9e3779b97f4a7c15ull
               + ((h << 6) | (h >> 58))
               + ((h >> 2) | (h << 62)));
}
template <typename T>
static inline uint64_t jit_hash_args(const uint64_t h, const T last)
{ return jit_hash_combine(h, (uint64_t)last); }
template <typename T, typename... Rest>
static inline uint64_t jit_hash_args(const uint64_t h, const T first, Rest... rest)
{ return jit_hash_args(jit_hash_combine(h, (uint64_t)first), rest...); }
static inline uint64_t jit_f64_bits(const double v)
{ uint64_t u; std::memcpy(&u, &v, sizeof(u)); return u; }
static inline double jit_bits_f64(const uint64_t u)
{ double v; std::memcpy(&v, &u, sizeof(v)); return v; }
static inline uint64_t jit_f32_bits(const float v)
{ uint32_t u; std::memcpy(&u, &v, sizeof(u)); return (uint64_t)u; }
static inline float jit_bits_f32(const uint64_t u)
{ float v; const uint32_t w = (uint32_t)u; std::memcpy(&v, &w, sizeof(v)); return v; }
"#;

/// Same-width bit casts, emitted into each captured kernel source so the
/// specialization can recover floating values from their key bits.
pub const CXX_BITS: &str = r#"static inline double jit_bits_f64(const uint64_t u)
{ double v; std::memcpy(&v, &u, sizeof(v)); return v; }
static inline float jit_bits_f32(const uint64_t u)
{ float v; const uint32_t w = (uint32_t)u; std::memcpy(&v, &w, sizeof(v)); return v; }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_tuple_same_key() {
        let a = of_values([1u64, 2, 3]);
        let b = of_values([1u64, 2, 3]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_order_sensitive() {
        assert_ne!(of_values([1u64, 2]), of_values([2u64, 1]));
    }

    #[test]
    fn test_distinct_tuples_distinct_keys() {
        let keys: Vec<u64> = [
            vec![0u64],
            vec![1],
            vec![2],
            vec![0, 0],
            vec![1, 1],
            vec![1, 2, 3],
            vec![3, 2, 1],
        ]
        .into_iter()
        .map(of_values)
        .collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_prefix_is_not_key() {
        // a tuple and its extension never share a key
        assert_ne!(of_values([7u64]), of_values([7u64, 0]));
    }

    #[test]
    fn test_float_bits_distinguish_signed_zero() {
        assert_ne!(f64_key(0.0), f64_key(-0.0));
        assert_eq!(f64_key(1.5), 1.5f64.to_bits());
    }

    #[test]
    fn test_cxx_support_names_the_same_constants() {
        assert!(CXX_SUPPORT.contains("0xcbf29ce484222325ull"));
        assert!(CXX_SUPPORT.contains("0x9e3779b97f4a7c15ull"));
        assert_eq!(SEED, 0xcbf29ce484222325);
    }
}
