// ABOUTME: encoding namespace: hex and URL-safe base64 sub-namespaces

use crate::error::EvalError;
use crate::stdlib::{arity_exact, native, want_str};
use crate::value::Value;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use std::collections::HashMap;

/// URL-safe decoding accepts both raw and padded input.
const URL_SAFE_INDIFFERENT: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn namespace() -> Value {
    let mut hex_ns = HashMap::new();

    hex_ns.insert(
        "encode".to_string(),
        native("encoding.hex.encode", |vm, pos, args| {
            arity_exact("encoding.hex.encode(text)", args, 1, pos)?;
            let text = want_str("encoding.hex.encode(text)", args, 0, pos)?;
            let out = hex::encode(text.as_bytes());
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    hex_ns.insert(
        "decode".to_string(),
        native("encoding.hex.decode", |vm, pos, args| {
            arity_exact("encoding.hex.decode(text)", args, 1, pos)?;
            let text = want_str("encoding.hex.decode(text)", args, 0, pos)?;
            let bytes = hex::decode(text.trim())
                .map_err(|e| EvalError::runtime(pos, format!("encoding.hex.decode: {}", e)))?;
            let out = String::from_utf8(bytes).map_err(|_| {
                EvalError::runtime(pos, "encoding.hex.decode: result is not valid UTF-8")
            })?;
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    let mut b64url_ns = HashMap::new();

    b64url_ns.insert(
        "encode".to_string(),
        native("encoding.base64url.encode", |vm, pos, args| {
            arity_exact("encoding.base64url.encode(text)", args, 1, pos)?;
            let text = want_str("encoding.base64url.encode(text)", args, 0, pos)?;
            let out = URL_SAFE_NO_PAD.encode(text.as_bytes());
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    b64url_ns.insert(
        "decode".to_string(),
        native("encoding.base64url.decode", |vm, pos, args| {
            arity_exact("encoding.base64url.decode(text)", args, 1, pos)?;
            let text = want_str("encoding.base64url.decode(text)", args, 0, pos)?;
            let bytes = URL_SAFE_INDIFFERENT.decode(text.trim()).map_err(|e| {
                EvalError::runtime(pos, format!("encoding.base64url.decode: {}", e))
            })?;
            let out = String::from_utf8(bytes).map_err(|_| {
                EvalError::runtime(pos, "encoding.base64url.decode: result is not valid UTF-8")
            })?;
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    let mut ns = HashMap::new();
    ns.insert("hex".to_string(), Value::Dict(hex_ns));
    ns.insert("base64url".to_string(), Value::Dict(b64url_ns));
    Value::Dict(ns)
}

#[cfg(test)]
mod tests {
    use crate::stdlib::testutil::{eval, s};

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(s("encoding.hex.encode('hi')"), "6869");
        assert_eq!(s("encoding.hex.decode('6869')"), "hi");
        assert!(eval("encoding.hex.decode('zz')").is_err());
    }

    #[test]
    fn test_base64url_unpadded_output() {
        // '>>>?' exercises the URL-safe alphabet (- and _)
        assert_eq!(s("encoding.base64url.encode('>>>?')"), "Pj4-Pw");
    }

    #[test]
    fn test_base64url_decode_accepts_padded_and_raw() {
        assert_eq!(s("encoding.base64url.decode('Pj4-Pw')"), ">>>?");
        assert_eq!(s("encoding.base64url.decode('Pj4-Pw==')"), ">>>?");
    }
}
