// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};

pub mod canonical;
pub mod clock;
mod error;
mod ids;
pub mod money;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, ExitCode, MachineError, Result};
pub use ids::{OrganizationId, RecordId, UserId};

pub const CRATE_NAME: &str = "tourcrm-core";

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
