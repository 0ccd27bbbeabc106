// ABOUTME: crypto namespace: SHA-256 and HMAC-SHA-256 with lowercase hex output

use crate::error::EvalError;
use crate::stdlib::{arity_exact, native, want_str};
use crate::value::Value;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "sha256".to_string(),
        native("crypto.sha256", |_, pos, args| {
            arity_exact("crypto.sha256(text)", args, 1, pos)?;
            let text = want_str("crypto.sha256(text)", args, 0, pos)?;
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            Ok(Value::Str(hex::encode(hasher.finalize())))
        }),
    );

    ns.insert(
        "hmacSha256".to_string(),
        native("crypto.hmacSha256", |_, pos, args| {
            arity_exact("crypto.hmacSha256(key, text)", args, 2, pos)?;
            let key = want_str("crypto.hmacSha256(key, text)", args, 0, pos)?;
            let text = want_str("crypto.hmacSha256(key, text)", args, 1, pos)?;
            let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
                .map_err(|e| EvalError::runtime(pos, format!("crypto.hmacSha256: {}", e)))?;
            mac.update(text.as_bytes());
            Ok(Value::Str(hex::encode(mac.finalize().into_bytes())))
        }),
    );

    Value::Dict(ns)
}

#[cfg(test)]
mod tests {
    use crate::stdlib::testutil::s;

    #[test]
    fn test_sha256_known_answer() {
        assert_eq!(
            s("crypto.sha256('abc')"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            s("crypto.sha256('')"),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hmac_sha256_known_answer() {
        // RFC 4231-style vector with an ASCII key
        assert_eq!(
            s("crypto.hmacSha256('key', 'The quick brown fox jumps over the lazy dog')"),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_output_is_lowercase_hex() {
        let digest = s("crypto.sha256('x')");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
