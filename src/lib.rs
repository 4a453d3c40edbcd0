//! FELICIA, a local, retrieval-augmented personal assistant.
//!
//! A scripted onboarding conversation collects profile facts; afterwards
//! each chat turn retrieves keyword-matched snippets from the user's
//! knowledge folder and sends them, with recent history, to a local
//! completion backend.

pub mod channels;
pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod onboarding;
pub mod store;
