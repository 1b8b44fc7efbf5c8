//! Checksummed tax identifiers
//!
//! A tax identifier is 10 decimal digits. The last digit is a control digit:
//! the weighted sum of the first nine digits modulo 11. Bases whose sum
//! reduces to 10 have no valid control digit and are never issued.

use rand::Rng;

/// Total length of a tax identifier
pub const TAX_ID_LEN: usize = 10;

const WEIGHTS: [u32; TAX_ID_LEN - 1] = [6, 5, 7, 2, 3, 4, 5, 6, 7];
const MODULUS: u32 = 11;
const INVALID_CONTROL: u32 = 10;
const ALL_ZEROS: &str = "0000000000";

/// Compute the control digit for a 9-digit base.
///
/// Returns `None` when `base` is not exactly nine ASCII digits, or when the
/// checksum lands on the reserved value 10.
pub fn control_digit(base: &str) -> Option<u8> {
    if base.len() != TAX_ID_LEN - 1 || !base.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let sum: u32 = base
        .bytes()
        .zip(WEIGHTS)
        .map(|(digit, weight)| u32::from(digit - b'0') * weight)
        .sum();

    match sum % MODULUS {
        INVALID_CONTROL => None,
        control => u8::try_from(control).ok(),
    }
}

/// Check whether `value` is a well-formed tax identifier with a matching
/// control digit. The all-zero string is rejected even though its checksum
/// matches.
pub fn is_valid(value: &str) -> bool {
    if value.len() != TAX_ID_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if value == ALL_ZEROS {
        return false;
    }

    let (base, control) = value.split_at(TAX_ID_LEN - 1);
    match control_digit(base) {
        Some(expected) => control.as_bytes()[0] - b'0' == expected,
        None => false,
    }
}

/// Generate a random valid tax identifier
pub fn generate() -> String {
    generate_with(&mut rand::rng())
}

/// Generate a valid tax identifier from the given random source
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    loop {
        let base = format!("{:09}", rng.random_range(0..=999_999_999u32));
        let Some(control) = control_digit(&base) else {
            continue;
        };

        let candidate = format!("{base}{control}");
        if candidate != ALL_ZEROS {
            return candidate;
        }
    }
}
