//! Onboarding: a scripted first-launch conversation.
//!
//! The engine walks the user through an [`OnboardingScript`], saving answers
//! as [`ProfileFacts`]. Once the terminal step is reached the facts feed every
//! chat prompt and the controller switches to chat mode for good.

pub mod engine;
pub mod model;
pub mod script;
pub mod state;

pub use engine::{OnboardingEngine, StepOutcome};
pub use model::{FactKey, FactValue, ProfileFacts};
pub use script::{
    Condition, InputMode, OnboardingScript, OnboardingStep, PromptTemplate, StepPrompt, Transition,
};
pub use state::OnboardingState;
