//! Correction pipeline.
//!
//! Each run flows through:
//! 1. `RuleCatalog::pick_random()`: choose what to search for
//! 2. `StatusTransport::search()`: channel-specific I/O
//! 3. `CandidateFilter::matches()`: whole-token, self-mention and language checks
//! 4. `EngagementPolicy::decide()`: reply, filler or silence
//! 5. `DedupGuard::already_engaged()`: no repeat corrections inside the window
//! 6. `ReplyComposer`: outbound text
//!
//! `RunController` drives the steps and replies to at most one user per run.

pub mod composer;
pub mod controller;
pub mod dedup;
pub mod filter;
pub mod policy;
pub mod rules;
pub mod types;
