//! Counter-indexed authentication code derivation.
//!
//! A provisioned tag emits one authentication code per read, keyed to its
//! monotonically increasing read counter. The verification service holds the
//! same codes, so both sides derive them from the same inputs: the tag UID,
//! the master key, and the counter value. Derivation follows the tag
//! family's file-read MAC scheme: a per-counter session key is derived by
//! MACing a session vector binding the UID and counter, and the emitted code
//! is the truncated MAC of the empty message under that session key.

use aes::Aes128;
use cmac::{Cmac, Mac};

use crate::error::Error;
use crate::types::{MasterKey, TagUid, TokenCode, TokenRecord, TokenSequence, CODE_LEN};

/// Highest value representable in the tag's 3-byte read counter.
const MAX_COUNTER: u32 = 0x00FF_FFFF;

/// Session-vector prefix for file-read MAC derivation.
const SV2_PREFIX: [u8; 6] = [0x3c, 0xc3, 0x00, 0x01, 0x00, 0x80];

/// Derives the ordered token sequence for counter indices `[start, end)`.
///
/// Pure and deterministic: identical inputs always produce bit-identical
/// sequences, which is what lets the tag, this tool and the verification
/// service agree on the code for any counter value without coordination.
///
/// # Errors
///
/// Returns [`Error::InvalidRange`] when `start` is 0, `end <= start`, or the
/// range reaches past the tag's 3-byte counter. No partial sequence is ever
/// produced.
pub fn generate(
    start: u32,
    end: u32,
    uid: &TagUid,
    key: &MasterKey,
) -> Result<TokenSequence, Error> {
    if start == 0 || end <= start || end - 1 > MAX_COUNTER {
        return Err(Error::InvalidRange { start, end });
    }

    let records = (start..end)
        .map(|index| TokenRecord {
            index,
            code: derive_code(key, uid, index),
        })
        .collect();
    TokenSequence::new(records)
}

/// Derives the code one tag read with counter value `counter` emits.
fn derive_code(key: &MasterKey, uid: &TagUid, counter: u32) -> TokenCode {
    let mut sv2 = [0u8; 16];
    sv2[..6].copy_from_slice(&SV2_PREFIX);
    sv2[6..13].copy_from_slice(uid.as_bytes());
    sv2[13..16].copy_from_slice(&counter.to_le_bytes()[..3]);

    let session_key = cmac_block(key.as_bytes(), &sv2);
    let full = cmac_block(&session_key, &[]);

    // Truncation keeps the odd-indexed bytes of the full MAC.
    let mut code = [0u8; CODE_LEN];
    for (i, byte) in code.iter_mut().enumerate() {
        *byte = full[2 * i + 1];
    }
    TokenCode::new(code)
}

/// One AES-CMAC block: MAC of `message` under `key`.
fn cmac_block(key: &[u8; 16], message: &[u8]) -> [u8; 16] {
    let mut mac = <Cmac<Aes128> as Mac>::new(key.into());
    mac.update(message);
    mac.finalize().into_bytes().into()
}
