//! Event signature topics.
//!
//! The signature topic of an EVM event is the keccak256 hash of its canonical
//! signature string, e.g.:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
//!
//! For a raw log, topics[0] is the signature topic unless the event is
//! anonymous.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// keccak256 of arbitrary bytes.
pub fn keccak256(bytes: &[u8]) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(bytes);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// Compute the signature topic of `"EventName(type1,type2,...)"`.
pub fn keccak256_signature(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}
