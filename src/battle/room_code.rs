//! Join codes handed out to players.

use rand::Rng;

/// Characters used in room codes. Ambiguous glyphs (I, O, 0, 1) are left out.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Draw a random code of `len` characters from [`ALPHABET`].
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// Canonical form of a code typed by a user.
pub fn normalize_room_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Whether `code` only uses characters a generated code can contain.
pub fn is_well_formed(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|byte| ALPHABET.contains(&byte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn generated_codes_use_the_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = generate_room_code(&mut rng, 6);
            assert_eq!(code.len(), 6);
            assert!(is_well_formed(&code));
        }
    }

    #[test]
    fn normalization_uppercases_and_trims() {
        assert_eq!(normalize_room_code("  ab3kq9 "), "AB3KQ9");
        assert!(is_well_formed(&normalize_room_code("ab3kq9")));
        assert!(!is_well_formed("AB1KQ9"));
        assert!(!is_well_formed(""));
    }
}
