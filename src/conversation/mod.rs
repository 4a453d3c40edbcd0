//! Conversation state and orchestration.

pub mod controller;
pub mod message;
pub mod submission;

pub use controller::{Assistant, ConnectReport, Mode, StatusReport, TurnReply};
pub use message::{Message, MessageRole, Transcript};
pub use submission::{Submission, SubmissionParser};
