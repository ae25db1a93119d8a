//! Stable name hashing
//!
//! Render passes and render targets are identified by the FNV-1a hash of
//! their name so they can be named in data files and compared cheaply.

/// Hashed identifier of a name
pub type HashValue = u32;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash a name with 32-bit FNV-1a. Usable in constant expressions.
pub const fn hash(name: &str) -> HashValue {
    let bytes = name.as_bytes();
    let mut value = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        value ^= bytes[i] as u32;
        value = value.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(hash(""), 0x811c_9dc5);
        assert_eq!(hash("a"), 0xe40c_292c);
        assert_eq!(hash("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_const_evaluation() {
        const MAIN: HashValue = hash("Main");
        assert_eq!(MAIN, hash("Main"));
        assert_ne!(MAIN, hash("Opaque"));
    }
}
