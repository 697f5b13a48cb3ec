//! Execution engine for glrecon
//!
//! The engine orchestrates:
//! 1. Refreshing - Read every recorded object back from GitLab
//! 2. Planning - Compare the manifest with the refreshed state
//! 3. Executing - Apply changes in parallel and fold the results into state

pub mod differ;
pub mod executor;
pub mod planner;
