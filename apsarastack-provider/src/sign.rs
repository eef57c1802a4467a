//! RPC-style request signing (HMAC-SHA1, signature version 1.0)

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;

pub(crate) const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub(crate) const SIGNATURE_VERSION: &str = "1.0";

/// Everything but RFC 3986 unreserved characters is encoded
const RPC_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, RPC_ENCODE_SET).to_string()
}

/// Sorted, encoded `key=value` pairs joined by `&`
pub(crate) fn canonicalized_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Base64 HMAC-SHA1 signature of the request, keyed by `secret&`
pub(crate) fn sign(method: &str, canonicalized: &str, secret: &str) -> Result<String, String> {
    let string_to_sign = format!(
        "{}&{}&{}",
        method,
        percent_encode("/"),
        percent_encode(canonicalized)
    );

    let mut mac = Hmac::<Sha1>::new_from_slice(format!("{}&", secret).as_bytes())
        .map_err(|e| e.to_string())?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
