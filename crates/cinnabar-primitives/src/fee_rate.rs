//! Fee rate in satoshis per virtual kilobyte.

use std::fmt;

/// Lowest feerate increment at which the extra bytes of a replacement must be
/// paid for, in sat/kvB.
pub const DEFAULT_INCREMENTAL_RELAY_FEERATE: FeeRate = FeeRate(1_000);

/// Fee rate in satoshis per virtual kilobyte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeeRate(u64);

impl FeeRate {
    /// Create a fee rate from satoshis per kilovirtual byte.
    pub const fn from_sat_per_kvb(sat_kvb: u64) -> Self {
        Self(sat_kvb)
    }

    /// Create a fee rate from satoshis per virtual byte.
    pub fn from_sat_per_vb(sat_vb: u64) -> Self {
        Self(sat_vb.checked_mul(1000).expect("fee rate overflow"))
    }

    /// Get the fee rate in satoshis per kilovirtual byte.
    pub const fn as_sat_per_kvb(&self) -> u64 {
        self.0
    }

    /// Fee in satoshis this rate charges for `vsize` virtual bytes, rounded
    /// down.
    pub fn fee_for(&self, vsize: i64) -> i64 {
        debug_assert!(vsize >= 0);
        ((self.0 as i128 * vsize as i128) / 1000) as i64
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/kvB", self.0)
    }
}
