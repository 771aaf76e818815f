//! Fee arithmetic primitives shared across the node.
//!
//! Everything in here is plain integer math: exact fee-per-size fractions,
//! feerate diagram comparison and the sat/kvB fee rate used by relay policy.
//! No floating point anywhere; feerates are compared by cross-multiplication
//! on 128-bit intermediates.

mod fee_rate;
mod feefrac;

pub use self::fee_rate::{FeeRate, DEFAULT_INCREMENTAL_RELAY_FEERATE};
pub use self::feefrac::{build_diagram_from_chunks, compare_feerate_diagram, FeeFrac};
