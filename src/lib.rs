// viralmint: viral post detection, tiering and minting
//
// This is the library root. Each module corresponds to one stage or
// collaborator of the pipeline: detectors find posts, scoring tiers them,
// the mint queue turns them into assets, the sweep re-tiers them and the
// notifier tells their authors.

pub mod budget;
pub mod chain;
pub mod clock;
pub mod config;
pub mod db;
pub mod detector;
pub mod engine;
pub mod error;
pub mod notify;
pub mod output;
pub mod profile;
pub mod queue;
pub mod scheduler;
pub mod scoring;
pub mod social;
pub mod status;
