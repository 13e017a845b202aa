// Work queues downstream of detection: minting and tier re-evaluation.

pub mod mint;
pub mod retier;

pub use mint::{MintQueue, MintResult, MintTask};
pub use retier::{SweepReport, TierSweep, TierSweepParts, TierUpgrade};
