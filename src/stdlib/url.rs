// ABOUTME: url namespace: query-component percent-encoding and decoding

use crate::error::EvalError;
use crate::stdlib::{arity_exact, native, want_str};
use crate::value::Value;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;

/// Everything except RFC 3986 unreserved characters is escaped.
pub(crate) const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, QUERY_COMPONENT).to_string()
}

/// Query-component decode: folds `+` into space before percent-decoding.
pub(crate) fn decode_component(s: &str) -> Result<String, String> {
    let plus_folded = s.replace('+', " ");
    percent_decode_str(&plus_folded)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|e| format!("invalid percent-encoding: {}", e))
}

pub fn namespace() -> Value {
    let mut ns = HashMap::new();

    ns.insert(
        "encode".to_string(),
        native("url.encode", |vm, pos, args| {
            arity_exact("url.encode(text)", args, 1, pos)?;
            let text = want_str("url.encode(text)", args, 0, pos)?;
            let out = encode_component(text);
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    ns.insert(
        "decode".to_string(),
        native("url.decode", |vm, pos, args| {
            arity_exact("url.decode(text)", args, 1, pos)?;
            let text = want_str("url.decode(text)", args, 0, pos)?;
            let out = decode_component(text)
                .map_err(|e| EvalError::runtime(pos, format!("url.decode: {}", e)))?;
            vm.ctx().check_str_len(out.len(), pos)?;
            Ok(Value::Str(out))
        }),
    );

    Value::Dict(ns)
}

#[cfg(test)]
mod tests {
    use crate::stdlib::testutil::s;

    #[test]
    fn test_encode_escapes_reserved() {
        assert_eq!(s("url.encode('a b&c=d')"), "a%20b%26c%3Dd");
        assert_eq!(s("url.encode('safe-_.~chars')"), "safe-_.~chars");
    }

    #[test]
    fn test_decode_folds_plus_and_percent() {
        assert_eq!(s("url.decode('a%20b%26c')"), "a b&c");
        assert_eq!(s("url.decode('a+b')"), "a b");
    }

    #[test]
    fn test_round_trip() {
        assert_eq!(s("url.decode(url.encode('héllo wörld/?'))"), "héllo wörld/?");
    }
}
