//! Usage & Feedback Stores (§4.9): append-only newline-delimited JSON under
//! a per-user directory, read-mostly during Selector scoring.

pub mod feedback;
pub mod usage;
