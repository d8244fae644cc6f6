//! Chat layer for MediFind.
//!
//! MedAssist answers health questions through the Gemini `generateContent`
//! API. Replies mark medicine names in bold; those names become quick-search
//! actions in the UI.

pub mod chat;
pub mod client;
pub mod extraction;
pub mod prompts;

pub use chat::*;
pub use client::*;
pub use extraction::*;
pub use prompts::*;
