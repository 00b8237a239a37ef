//! Helpers for handling secrets.

use subtle::ConstantTimeEq;

const VISIBLE_HEAD: usize = 6;
const VISIBLE_TAIL: usize = 4;
const MAX_REDACTED_LEN: usize = 8;

/// Shows the head and tail of `token` around `...`.
///
/// Tokens too short to keep both ends are replaced by asterisks.
pub fn mask_token(token: &str) -> String {
    let token = token.trim();
    let count = token.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= VISIBLE_HEAD + VISIBLE_TAIL {
        return "*".repeat(count.min(MAX_REDACTED_LEN));
    }

    let head: String = token.chars().take(VISIBLE_HEAD).collect();
    let tail: String = token.chars().skip(count - VISIBLE_TAIL).collect();
    format!("{head}...{tail}")
}

/// Byte comparison whose timing does not depend on where inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}
