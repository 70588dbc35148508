//! Identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

pub const REQUEST_HRP: &str = "req_";
pub const TRANSACTION_HRP: &str = "tx_";

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Deterministic id for the debit a fulfilled request line produces.
/// Re-running a fulfilment yields the same id, so the log can tell it was already applied.
pub fn request_debit_id(request_id: &str, material_id: &str) -> String {
    format!("req-out-{request_id}-{material_id}")
}
