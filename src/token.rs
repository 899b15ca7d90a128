//! HMAC-SHA256 signing for channel auth and the admin HTTP API (§4.4, §4.8).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Token {
    key: String,
    secret: String,
}

impl Token {
    pub fn new(key: String, secret: String) -> Self {
        Self { key, secret }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `hex(HMAC_SHA256(secret, message))`.
    pub fn sign(&self, message: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verifies a signature against a freshly computed one using a
    /// constant-time comparison (§9: "a naive string `==` is a defect").
    pub fn verify(&self, message: &str, signature: &str) -> bool {
        let expected = self.sign(message);
        secure_compare(&expected, signature)
    }
}

/// Constant-time byte comparison. Runtime is independent of *where* the
/// first mismatching byte occurs; only the length check short-circuits,
/// which leaks no information a timing attack could use (lengths of hex
/// digests are public and fixed).
pub fn secure_compare(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let token = Token::new("key123".to_string(), "secret456".to_string());
        let message = "123.456:private-chat";
        let sig = token.sign(message);
        assert!(token.verify(message, &sig));
        assert!(!token.verify(message, "deadbeef"));
    }

    #[test]
    fn secure_compare_rejects_length_mismatch() {
        assert!(!secure_compare("abc", "abcd"));
        assert!(secure_compare("abc", "abc"));
        assert!(!secure_compare("abc", "abd"));
    }
}
