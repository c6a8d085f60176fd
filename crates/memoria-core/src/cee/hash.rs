//! 32-bit rolling hash for context prefixes. Stability is the
//! whole point: the same prefix string must hash identically across
//! implementations and versions, so this sticks to a fixed formula and
//! nothing fancier (no `ahash`/`seahash` — those aren't guaranteed
//! stable across versions).

/// `h = (h<<5) - h + c`, wrapping, absolute value, hex-padded to 8 chars.
pub fn stable_hash(s: &str) -> String {
    let mut h: i32 = 0;
    for c in s.chars() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32);
    }
    format!("{:08x}", h.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(stable_hash("hello"), stable_hash("hello"));
    }

    #[test]
    fn hash_differs_for_different_input() {
        assert_ne!(stable_hash("hello"), stable_hash("world"));
    }

    #[test]
    fn hash_is_always_eight_hex_chars() {
        for s in ["", "a", &"x".repeat(1000)] {
            assert_eq!(stable_hash(s).len(), 8);
        }
    }

    #[test]
    fn empty_string_hashes_to_zero() {
        assert_eq!(stable_hash(""), "00000000");
    }
}
