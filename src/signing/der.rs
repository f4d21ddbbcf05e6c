//! DER Signature Encoding
//!
//! Converts the raw `(r, s)` pair returned by the custodian into the
//! DER-encoded ECDSA signature that transaction scripts expect:
//!
//! ```text
//! 0x30 <len> 0x02 <r-len> <r> 0x02 <s-len> <s>
//! ```
//!
//! A `0x00` byte is prepended to `r` or `s` when its high bit is set so the
//! ASN.1 INTEGER stays positive. Leading zero bytes already present in the
//! input are kept as-is.

use crate::error::{SignerError, SignerResult};
use crate::types::RawSignature;

/// ASN.1 SEQUENCE tag
const SEQUENCE_TAG: u8 = 0x30;
/// ASN.1 INTEGER tag
const INTEGER_TAG: u8 = 0x02;
/// Largest length representable in DER short form
const MAX_SHORT_LENGTH: usize = 0x7f;

/// Encode a custodian signature as DER
pub fn encode_der(signature: &RawSignature) -> SignerResult<Vec<u8>> {
    let r = hex::decode(&signature.r)
        .map_err(|e| SignerError::invalid_signature(format!("Invalid r hex: {}", e)))?;
    let s = hex::decode(&signature.s)
        .map_err(|e| SignerError::invalid_signature(format!("Invalid s hex: {}", e)))?;

    der_from_components(&r, &s)
}

/// Encode big-endian `r` and `s` scalars as DER
pub fn der_from_components(r: &[u8], s: &[u8]) -> SignerResult<Vec<u8>> {
    if r.is_empty() || s.is_empty() {
        return Err(SignerError::invalid_signature(
            "Signature components must not be empty",
        ));
    }

    let r_len = r.len() + usize::from(needs_sign_padding(r));
    let s_len = s.len() + usize::from(needs_sign_padding(s));
    let total = 2 + r_len + 2 + s_len;

    if total > MAX_SHORT_LENGTH {
        return Err(SignerError::invalid_signature(format!(
            "Signature too long for DER encoding: {} bytes",
            total
        )));
    }

    let mut der = Vec::with_capacity(2 + total);
    der.push(SEQUENCE_TAG);
    der.push(total as u8);
    push_integer(&mut der, r);
    push_integer(&mut der, s);

    Ok(der)
}

/// High bit set means a two's-complement reader would see a negative number
fn needs_sign_padding(component: &[u8]) -> bool {
    component[0] & 0x80 != 0
}

fn push_integer(out: &mut Vec<u8>, component: &[u8]) {
    let padded = needs_sign_padding(component);
    out.push(INTEGER_TAG);
    out.push((component.len() + usize::from(padded)) as u8);
    if padded {
        out.push(0x00);
    }
    out.extend_from_slice(component);
}
