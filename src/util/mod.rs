//! Utility modules: retry, secret masking.

pub mod retry;
pub mod security;
