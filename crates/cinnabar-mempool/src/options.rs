use cinnabar_primitives::{FeeRate, DEFAULT_INCREMENTAL_RELAY_FEERATE};

/// Policy knobs for replacement admission.
#[derive(Clone, Debug)]
pub struct MemPoolOptions {
    /// Feerate the additional fees of a replacement must cover for the bytes
    /// it adds to the network.
    pub incremental_relay_feerate: FeeRate,

    /// Accept replacements of transactions that do not signal BIP125
    /// replaceability.
    pub full_rbf: bool,
}

impl Default for MemPoolOptions {
    fn default() -> Self {
        Self {
            incremental_relay_feerate: DEFAULT_INCREMENTAL_RELAY_FEERATE,
            full_rbf: false,
        }
    }
}
