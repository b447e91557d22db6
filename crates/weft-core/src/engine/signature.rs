//! Content-addressed node signatures.
//!
//! A signature fingerprints one node's planned execution: the method chain,
//! the implementations the default strategy would pick right now, the
//! literal parameters, and the signatures of every upstream step. Two nodes
//! produce equal signatures iff all four components match
//! element-for-element.
use std::collections::BTreeMap;

use serde_json::Value;

use crate::registry::ImplementationInfo;

/// Hex length of a signature: 128 bits of blake3
const SIGNATURE_HEX_LEN: usize = 32;

/// Compute the signature for one planned node execution.
///
/// Implementation predictions come from `predict_signature`, not `resolve`,
/// so the result is stable whether or not a prior resolve has cached.
/// `literals` and `upstream` iterate in key order (BTreeMap), matching the
/// sorted joins of the signature definition.
pub fn node_signature(
    methods: &[String],
    impls: &[ImplementationInfo],
    literals: &BTreeMap<String, Value>,
    upstream: &BTreeMap<String, String>,
) -> String {
    let methods_part = methods.join("|");
    let impls_part = impls
        .iter()
        .map(|info| info.signature_token())
        .collect::<Vec<_>>()
        .join(";");
    let literals_part = literals
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";");
    let upstream_part = upstream
        .iter()
        .map(|(step, sig)| format!("{}:{}", step, sig))
        .collect::<Vec<_>>()
        .join(";");

    let mut hasher = blake3::Hasher::new();
    hasher.update(methods_part.as_bytes());
    hasher.update(b"\n");
    hasher.update(impls_part.as_bytes());
    hasher.update(b"\n");
    hasher.update(literals_part.as_bytes());
    hasher.update(b"\n");
    hasher.update(upstream_part.as_bytes());

    let hash = hasher.finalize();
    hash.to_hex().as_str()[..SIGNATURE_HEX_LEN].to_string()
}
