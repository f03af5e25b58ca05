pub mod machine;
pub mod quiz;
pub mod registry;
pub mod scheduler;

pub use machine::{FlowEffect, FlowError, FlowEvent, FlowState, Phase, Step};
pub use quiz::{QuizAttempt, QuizError, QuizPhase, QuizState};
pub use registry::{ClosedSessions, SessionRegistry};
pub use scheduler::ScheduledTransition;
