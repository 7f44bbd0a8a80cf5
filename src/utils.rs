//! Utility functions for identifier generation and document digests

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique addressable id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Opaque reference for an uploaded Letter of Intention: the digest of
/// its bytes. The document itself lives in external storage.
pub fn doc_ref_from_bytes(bytes: &[u8]) -> String {
    sha256::digest(bytes)
}
