//! Room identifiers and join passwords.

use rand::Rng;

/// Characters used in room ids (exposed in the room URL)
const ROOM_ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Safe character set for passwords (excludes O and 0 to avoid confusion)
pub const PASSWORD_CHARS: &[u8] = b"ABCDEFGHIJKLMNPQRSTUVWXYZ123456789";
pub const PASSWORD_LENGTH: usize = 4;

fn random_code(charset: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

/// Generate a random uppercase alphanumeric room id
pub fn generate_room_id(len: usize) -> String {
    random_code(ROOM_ID_CHARS, len)
}

/// Generate a random 4-character join password
pub fn generate_password() -> String {
    random_code(PASSWORD_CHARS, PASSWORD_LENGTH)
}

/// Normalize a password typed by a player.
///
/// Returns `None` unless the result is exactly four characters of the
/// password alphabet.
pub fn normalize_password(raw: &str) -> Option<String> {
    let password = raw.trim().to_ascii_uppercase();
    let valid = password.len() == PASSWORD_LENGTH
        && password.bytes().all(|b| PASSWORD_CHARS.contains(&b));
    valid.then_some(password)
}
