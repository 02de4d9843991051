//! Random password generation.

use rand::seq::SliceRandom;
use rand::Rng;
use zeroize::Zeroizing;

/// Default length used by `lockbox generate` and `add --generate`.
pub const DEFAULT_LENGTH: usize = 20;

pub const MIN_LENGTH: usize = 12;
pub const MAX_LENGTH: usize = 128;

// Look-alike characters (0/O, 1/l/I) are left out.
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{};:,.?";

/// Generate a password of `length` characters (clamped to 12..=128).
///
/// The result always contains at least one upper-case letter, one
/// lower-case letter, one digit and one symbol.
pub fn generate_password(length: usize) -> Zeroizing<String> {
    let length = length.clamp(MIN_LENGTH, MAX_LENGTH);
    let mut rng = rand::rng();
    let pick = |rng: &mut rand::rngs::ThreadRng, set: &[u8]| set[rng.random_range(0..set.len())];

    let mut chars = Zeroizing::new(Vec::with_capacity(length));
    for set in [UPPER, LOWER, DIGITS, SYMBOLS] {
        chars.push(pick(&mut rng, set));
    }

    let all: Vec<u8> = [UPPER, LOWER, DIGITS, SYMBOLS].concat();
    while chars.len() < length {
        chars.push(pick(&mut rng, &all));
    }
    chars.shuffle(&mut rng);

    Zeroizing::new(chars.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_every_character_class() {
        for _ in 0..50 {
            let pw = generate_password(DEFAULT_LENGTH);
            assert_eq!(pw.len(), DEFAULT_LENGTH);
            assert!(pw.bytes().any(|b| UPPER.contains(&b)));
            assert!(pw.bytes().any(|b| LOWER.contains(&b)));
            assert!(pw.bytes().any(|b| DIGITS.contains(&b)));
            assert!(pw.bytes().any(|b| SYMBOLS.contains(&b)));
        }
    }

    #[test]
    fn length_is_clamped() {
        assert_eq!(generate_password(4).len(), MIN_LENGTH);
        assert_eq!(generate_password(10_000).len(), MAX_LENGTH);
        assert_eq!(generate_password(32).len(), 32);
    }

    #[test]
    fn passwords_differ() {
        assert_ne!(*generate_password(24), *generate_password(24));
    }
}
