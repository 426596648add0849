//! Record identifiers.
//!
//! Format: `err_<unix-millis>_<suffix>` where the suffix is nine base-36
//! digits. The suffix comes from a process-wide counter passed through
//! splitmix64, a bijection on `u64`, so every record starts from a distinct
//! mixed value; the suffix keeps the low 46 bits of it. The millisecond
//! prefix keeps identifiers roughly sortable and distinct across restarts.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Counter mixed into every suffix.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Per-process offset so separate runs do not start from the same suffix.
static PROCESS_SEED: OnceLock<u64> = OnceLock::new();

const SUFFIX_LEN: usize = 9;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

fn process_seed() -> u64 {
    *PROCESS_SEED.get_or_init(|| {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        splitmix64(nanos ^ u64::from(std::process::id()))
    })
}

/// Opaque identifier of an [`ErrorRecord`](crate::ErrorRecord).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        // Same clock as the record timestamp.
        let millis = Utc::now().timestamp_millis();
        let n = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        // Adding the seed keeps distinct counters distinct before mixing.
        let mixed = splitmix64(n.wrapping_add(process_seed()));
        Self(format!("err_{millis}_{}", encode_base36(mixed)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Low `SUFFIX_LEN` base-36 digits of `value`, zero padded.
///
/// 36^9 exceeds 2^46, so the suffix keeps enough of the mixed value for
/// collisions to need ~2^23 records created in the same millisecond.
fn encode_base36(mut value: u64) -> String {
    let mut digits = [b'0'; SUFFIX_LEN];
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    digits.iter().map(|&b| b as char).collect()
}
