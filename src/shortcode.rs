//! Short code generation and custom-code validation.

use rand::RngExt;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated codes. 62^8 possible codes makes collisions
/// negligible but not impossible; the store's uniqueness constraint is
/// authoritative and callers retry on conflict.
pub const GENERATED_CODE_LEN: usize = 8;

pub const CUSTOM_CODE_MIN_LEN: usize = 3;
pub const CUSTOM_CODE_MAX_LEN: usize = 20;

/// Generate a random 8-character alphanumeric short code.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Validate a caller-supplied custom code: length 3-20, charset `[A-Za-z0-9_-]`.
pub fn validate_custom_code(code: &str) -> Result<(), String> {
    if code.len() < CUSTOM_CODE_MIN_LEN || code.len() > CUSTOM_CODE_MAX_LEN {
        return Err(format!(
            "custom code must be {CUSTOM_CODE_MIN_LEN}-{CUSTOM_CODE_MAX_LEN} characters"
        ));
    }

    if !code
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err("custom code may only contain letters, digits, '-' and '_'".to_string());
    }

    Ok(())
}
