//! Base-53 identifier codec.
//!
//! The alphabet is the 62 alphanumeric ASCII characters with nine removed
//! for visual disambiguation (`O 9 1 I l W w m d`), leaving exactly 53
//! characters. 53 is prime, which is what makes the checksum distribution
//! uniform and the enumeration/increment walk below terminate cleanly.
//!
//! Four two-character substrings are additionally forbidden anywhere in a
//! combined (prefix + checksum) string: `VV`, `vv`, `rn`, `nn`. These read
//! as other legal strings when rendered in some fonts.

use crate::error::Base53Error;
use rand::{rngs::OsRng, Rng};
use std::fmt;
use std::sync::OnceLock;

pub const ALPHABET_SIZE: usize = 53;
const ILLEGAL_PAIRS: [&str; 4] = ["VV", "vv", "rn", "nn"];
const MAX_PREFIX_LEN: usize = 50;

struct Tables {
    alphabet: [u8; ALPHABET_SIZE],
    without_v: Vec<u8>,
    without_big_v: Vec<u8>,
    without_n: Vec<u8>,
    char_to_num: [i16; 256],
    num_to_char: [u8; ALPHABET_SIZE],
    next_char: [u8; 256],
    remap: [u8; 256],
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(build_tables)
}

fn build_tables() -> Tables {
    const ILLEGAL_CHARS: &[u8] = b"O91Ilwmd"; // 'W' handled below since it's uppercase, see note
    // The original alphabet-construction walks 0-9, A-Z, a-z in order and
    // drops 'O','9','1','I','l','W','w','m','d'. Build it the same way so
    // the resulting order (and therefore char_to_num/next_char) matches.
    let illegal: [u8; 9] = *b"O91IlWwmd";
    let mut alphabet = Vec::with_capacity(ALPHABET_SIZE);
    for c in b'0'..=b'9' {
        if !illegal.contains(&c) {
            alphabet.push(c);
        }
    }
    for c in b'A'..=b'Z' {
        if !illegal.contains(&c) {
            alphabet.push(c);
        }
    }
    for c in b'a'..=b'z' {
        if !illegal.contains(&c) {
            alphabet.push(c);
        }
    }
    assert_eq!(alphabet.len(), ALPHABET_SIZE, "base-53 alphabet must have 53 characters");
    let _ = ILLEGAL_CHARS; // silence unused const in non-debug builds

    let without_v: Vec<u8> = alphabet.iter().copied().filter(|&c| c != b'v').collect();
    let without_big_v: Vec<u8> = alphabet.iter().copied().filter(|&c| c != b'V').collect();
    let without_n: Vec<u8> = alphabet.iter().copied().filter(|&c| c != b'n').collect();

    let mut char_to_num = [-1i16; 256];
    let mut num_to_char = [0u8; ALPHABET_SIZE];
    let mut next_char = [0u8; 256];
    for (i, &c) in alphabet.iter().enumerate() {
        char_to_num[c as usize] = i as i16;
        num_to_char[i] = c;
        if i + 1 < alphabet.len() {
            next_char[c as usize] = alphabet[i + 1];
        } else {
            assert_eq!(c, b'z', "last alphabet character must be 'z'");
            next_char[c as usize] = b'0';
        }
    }

    let mut remap = [0u8; 256];
    for (i, slot) in remap.iter_mut().enumerate() {
        *slot = i as u8;
    }
    remap[b'O' as usize] = b'0';
    remap[b'9' as usize] = b'g';

    let mut fixed_alphabet = [0u8; ALPHABET_SIZE];
    fixed_alphabet.copy_from_slice(&alphabet);

    Tables {
        alphabet: fixed_alphabet,
        without_v,
        without_big_v,
        without_n,
        char_to_num,
        num_to_char,
        next_char,
        remap,
    }
}

/// A validated Base-53 identifier: a prefix plus one checksum character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Base53Id {
    prefix: String,
    checksum: u8,
}

impl Base53Id {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Combined string: prefix followed by the checksum character.
    pub fn as_combined_string(&self) -> String {
        let mut s = self.prefix.clone();
        s.push(self.checksum as char);
        s
    }

    /// Total length, including the checksum character.
    pub fn len(&self) -> usize {
        self.prefix.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for Base53Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_combined_string())
    }
}

fn is_illegal_pair(pair: &[u8]) -> bool {
    ILLEGAL_PAIRS.iter().any(|p| p.as_bytes() == pair)
}

fn check_legal(prefix: &str, checksum: u8) -> Result<(), Base53Error> {
    let t = tables();
    for &b in prefix.as_bytes() {
        if t.char_to_num[b as usize] < 0 {
            return Err(Base53Error::IllegalCharacter);
        }
    }
    if t.char_to_num[checksum as usize] < 0 {
        return Err(Base53Error::IllegalCharacter);
    }
    let mut combined = Vec::with_capacity(prefix.len() + 1);
    combined.extend_from_slice(prefix.as_bytes());
    combined.push(checksum);
    for window in combined.windows(2) {
        if is_illegal_pair(window) {
            return Err(Base53Error::IllegalPair);
        }
    }
    Ok(())
}

fn calculate_checksum(prefix: &str) -> u8 {
    let t = tables();
    let p = ALPHABET_SIZE as i64;
    let mut total: i64 = 0;
    for (i, &b) in prefix.as_bytes().iter().enumerate() {
        let multiplier = p - i as i64 - 2;
        let num = t.char_to_num[b as usize] as i64;
        total += multiplier * num;
    }
    t.num_to_char[total.rem_euclid(p) as usize]
}

fn remap_bytes(s: &str) -> String {
    let t = tables();
    s.bytes().map(|b| t.remap[b as usize] as char).collect()
}

/// Validates a prefix + checksum pair, optionally remapping visually
/// ambiguous input characters (`O`->`0`, `9`->`g`) first.
pub fn validate(prefix: &str, checksum: u8, remap: bool) -> Result<Base53Id, Base53Error> {
    if prefix.is_empty() {
        return Err(Base53Error::TooShort);
    }
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(Base53Error::TooLong);
    }

    let (prefix, checksum) = if remap {
        let remapped_prefix = remap_bytes(prefix);
        let remapped_checksum = tables().remap[checksum as usize];
        (remapped_prefix, remapped_checksum)
    } else {
        (prefix.to_string(), checksum)
    };

    check_legal(&prefix, checksum)?;

    let recomputed = calculate_checksum(&prefix);
    if recomputed != checksum {
        return Err(Base53Error::ChecksumMismatch);
    }

    Ok(Base53Id { prefix, checksum })
}

fn generate_random_unchecksummed(n: usize) -> String {
    let t = tables();
    let mut rng = OsRng;
    let mut prev: u8 = 0;
    let mut s = String::with_capacity(n);
    for _ in 0..n {
        let choices: &[u8] = match prev {
            b'v' => &t.without_v,
            b'V' => &t.without_big_v,
            b'n' | b'r' => &t.without_n,
            _ => &t.alphabet,
        };
        let idx = rng.gen_range(0..choices.len());
        prev = choices[idx];
        s.push(prev as char);
    }
    s
}

/// Generates a fresh random identifier of the requested total length
/// (including the checksum character). `n` must be at least 2.
pub fn random(n: usize) -> Result<Base53Id, Base53Error> {
    if n < 2 {
        return Err(Base53Error::TooShort);
    }
    for _attempt in 0..100 {
        let prefix = generate_random_unchecksummed(n - 1);
        let checksum = calculate_checksum(&prefix);
        if check_legal(&prefix, checksum).is_ok() {
            return validate(&prefix, checksum, false);
        }
        // Probability of failing decreases exponentially with attempt count;
        // failing 100 times in a row indicates the RNG itself is broken.
    }
    tracing::error!("base53: failed to generate a valid random id after 100 attempts");
    panic!("base53: RNG failure - could not generate a legal random id in 100 attempts");
}

fn increment_numeral(s: &str) -> String {
    let t = tables();
    let mut digits: Vec<i64> = s.bytes().map(|b| t.char_to_num[b as usize] as i64).collect();
    let mut carry = 1i64;
    for d in digits.iter_mut().rev() {
        *d += carry;
        if *d >= ALPHABET_SIZE as i64 {
            *d -= ALPHABET_SIZE as i64;
            carry = 1;
        } else {
            carry = 0;
            break;
        }
    }
    digits.iter().map(|&d| t.num_to_char[d as usize] as char).collect()
}

/// Produces the canonical successor of `id`. Defines a total order over
/// legal identifiers of a given length; rolls over to length+1 all-`0`s
/// once the prefix is all `z`s.
pub fn increment(id: &Base53Id) -> Base53Id {
    let prefix = id.prefix();

    if prefix.bytes().all(|b| b == b'z') {
        let new_prefix = "0".repeat(prefix.len() + 1);
        let checksum = calculate_checksum(&new_prefix);
        return validate(&new_prefix, checksum, false).expect("freshly built id must validate");
    }

    // Each retry advances from the *previous* attempt's prefix, not the
    // original one - otherwise a checksum collision with a forbidden
    // digraph would reproduce the identical candidate every time.
    let mut working = prefix.to_string();
    for _attempt in 0..5 {
        working = increment_numeral(&working);
        let bytes_len = working.len();
        for i in 0..bytes_len.saturating_sub(1) {
            if is_illegal_pair(&working.as_bytes()[i..i + 2]) {
                let fixed = increment_numeral(&working[i..i + 2]);
                working.replace_range(i..i + 2, &fixed);
                break;
            }
        }
        let checksum = calculate_checksum(&working);
        let last_byte = working.as_bytes()[working.len() - 1];
        if is_illegal_pair(&[last_byte, checksum]) {
            continue;
        }
        if let Ok(new_id) = validate(&working, checksum, false) {
            return new_id;
        }
    }
    tracing::error!("base53: failed to compute successor id after 5 attempts");
    panic!("base53: failed to compute the next id; this should never happen");
}

/// Packs a combined id string into a big-endian `u64`, for storage in a
/// [`crate::random_bag::RandomBag64`].
pub fn pack_be_u64(id_str: &str) -> u64 {
    let mut buf = [0u8; 8];
    let bytes = id_str.as_bytes();
    let len = bytes.len().min(8);
    buf[..len].copy_from_slice(&bytes[..len]);
    u64::from_be_bytes(buf)
}

/// Inverse of the packing done by [`enumerate_all`]: recovers the id string
/// of the given length from its packed big-endian representation.
pub fn unpack_be_u64(value: u64, length: usize) -> String {
    let buf = value.to_be_bytes();
    String::from_utf8(buf[..length].to_vec()).expect("packed id bytes must be ASCII")
}

fn advance_buf(buf: &mut [u8]) {
    let t = tables();
    for _attempt in 0..10 {
        let mut j = buf.len() as isize - 1;
        while j >= 0 {
            let c = buf[j as usize];
            let nc = t.next_char[c as usize];
            buf[j as usize] = nc;
            if nc != b'0' {
                break;
            }
            j -= 1;
        }

        let mut i = 0;
        while i + 1 < buf.len() {
            if is_illegal_pair(&buf[i..i + 2]) {
                let pair_str = std::str::from_utf8(&buf[i..i + 2]).unwrap();
                let fixed = increment_numeral(pair_str);
                buf[i] = fixed.as_bytes()[0];
                buf[i + 1] = fixed.as_bytes()[1];
                break;
            }
            i += 1;
        }

        let prefix_str = std::str::from_utf8(buf).unwrap();
        let checksum = calculate_checksum(prefix_str);
        let last_two = [buf[buf.len() - 1], checksum];
        if !is_illegal_pair(&last_two) {
            return;
        }
    }
    panic!("base53: failed to advance enumeration cursor after 10 attempts");
}

/// Enumerates every legal identifier of length `n`, in canonical increment
/// order, as packed big-endian `u64`s (only valid for `n <= 8`). `filter`
/// is called with the combined id string for every candidate; returning
/// `false` skips that id (used by recovery to omit ids already live in the
/// reconstructed map).
pub fn enumerate_all(n: usize, mut filter: impl FnMut(&str) -> bool) -> Result<Vec<u64>, Base53Error> {
    if n < 2 {
        return Err(Base53Error::TooShort);
    }
    let prefix_len = n - 1;
    let mut buf = vec![b'0'; prefix_len];
    let mut result = Vec::new();

    loop {
        let prefix_str = std::str::from_utf8(&buf).unwrap().to_string();
        let checksum = calculate_checksum(&prefix_str);
        let mut id_str = prefix_str;
        id_str.push(checksum as char);

        if filter(&id_str) {
            result.push(pack_be_u64(&id_str));
        }

        if buf.iter().all(|&b| b == b'z') {
            break;
        }
        advance_buf(&mut buf);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_excludes_ambiguous_characters() {
        let t = tables();
        for &c in b"O91IlWwmd" {
            assert!(t.char_to_num[c as usize] < 0, "{} should be illegal", c as char);
        }
        assert_eq!(t.alphabet.len(), ALPHABET_SIZE);
    }

    #[test]
    fn validate_round_trips_generated_id() {
        let id = random(3).unwrap();
        let combined = id.as_combined_string();
        let prefix = &combined[..combined.len() - 1];
        let checksum = combined.as_bytes()[combined.len() - 1];
        let revalidated = validate(prefix, checksum, false).unwrap();
        assert_eq!(revalidated, id);
    }

    #[test]
    fn validate_rejects_bad_checksum() {
        let id = random(4).unwrap();
        let bad_checksum = if id.checksum() == b'0' { b'2' } else { b'0' };
        assert_eq!(
            validate(id.prefix(), bad_checksum, false),
            Err(Base53Error::ChecksumMismatch)
        );
    }

    #[test]
    fn validate_rejects_illegal_character() {
        assert_eq!(validate("O0", b'0', false), Err(Base53Error::IllegalCharacter));
    }

    #[test]
    fn validate_remaps_ambiguous_characters() {
        // 'O' remaps to '0' and '9' remaps to 'g'; after remapping this
        // should validate as the combined string "0g" + recomputed checksum.
        let checksum = calculate_checksum("0g");
        let remapped_csum_input = tables().remap.iter().position(|&c| c == checksum);
        let _ = remapped_csum_input; // checksum char is already legal; just confirm remap path works
        let id = validate("O9", checksum, true).unwrap();
        assert_eq!(id.prefix(), "0g");
    }

    #[test]
    fn increment_is_monotonic_and_valid() {
        let mut id = validate("00", calculate_checksum("00"), false).unwrap();
        for _ in 0..200 {
            let next = increment(&id);
            assert_ne!(next, id);
            assert!(validate(next.prefix(), next.checksum(), false).is_ok());
            id = next;
        }
    }

    #[test]
    fn increment_rolls_over_all_z() {
        let prefix = "z".repeat(5);
        let id = validate(&prefix, calculate_checksum(&prefix), false).unwrap();
        let next = increment(&id);
        assert_eq!(next.prefix(), "0".repeat(6));
    }

    #[test]
    fn enumerate_all_length_two_matches_expected_count() {
        let ids = enumerate_all(2, |_| true).unwrap();
        // 53^1 total prefixes, minus however many produce an illegal
        // combined pair with their checksum character.
        assert!(ids.len() <= 53);
        assert!(ids.len() > 53 - 10);
        let mut seen = std::collections::HashSet::new();
        for packed in &ids {
            let s = unpack_be_u64(*packed, 2);
            assert!(seen.insert(s.clone()), "duplicate id {s}");
            assert!(validate(&s[..1], s.as_bytes()[1], false).is_ok());
        }
    }

    #[test]
    fn enumerate_all_filter_skips_entries() {
        let mut count = 0;
        let ids = enumerate_all(2, |_| {
            count += 1;
            count % 2 == 0
        })
        .unwrap();
        assert!(!ids.is_empty());
    }

    #[test]
    fn pack_unpack_round_trip() {
        let id = random(5).unwrap();
        let packed = pack_be_u64(&id.as_combined_string());
        let unpacked = unpack_be_u64(packed, id.len());
        assert_eq!(unpacked, id.as_combined_string());
    }
}
