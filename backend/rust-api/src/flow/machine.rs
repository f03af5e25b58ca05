//! Adaptive assessment flow.
//!
//! All transition rules live in [`FlowState::reduce`]: it maps the current
//! state and one event to the next state plus the side effects the caller must
//! run (arm the feedback timer, write the completion record, leave the screen).

use std::sync::Arc;

use thiserror::Error;

use crate::models::{
    question::QuestionPrompt, ActiveSet, AssessmentPlan, Confidence, FeedbackView, FlowPhaseName,
    FlowView, InterventionItem, InterventionKind, Question, QuestionSet,
};

const LAST_INTERVENTION: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Presenting,
    Feedback { correct: bool, message: String },
    Intervention { item: InterventionItem },
    Completed,
}

impl Phase {
    pub fn name(&self) -> FlowPhaseName {
        match self {
            Phase::Presenting => FlowPhaseName::Presenting,
            Phase::Feedback { .. } => FlowPhaseName::Feedback,
            Phase::Intervention { .. } => FlowPhaseName::Intervention,
            Phase::Completed => FlowPhaseName::Completed,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Phase::Presenting => "presenting",
            Phase::Feedback { .. } => "feedback",
            Phase::Intervention { .. } => "intervention",
            Phase::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    SelectAnswer(String),
    SetConfidence(Confidence),
    Submit,
    FeedbackElapsed,
    Continue,
}

impl FlowEvent {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            FlowEvent::SelectAnswer(_) => "select_answer",
            FlowEvent::SetConfidence(_) => "set_confidence",
            FlowEvent::Submit => "submit",
            FlowEvent::FeedbackElapsed => "feedback_elapsed",
            FlowEvent::Continue => "continue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEffect {
    /// Arm the fixed-delay timer that delivers [`FlowEvent::FeedbackElapsed`]
    ScheduleFeedbackTimer,
    /// Persist the assignment as completed
    WriteCompletion,
    /// Tell the client to leave the assessment
    Exit,
    /// Remedial set became active
    SwappedToAlternate,
    /// Every alternate question was answered correctly
    SwappedToDefault,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("{event} is not accepted while the flow is {phase}")]
    InvalidEvent {
        event: &'static str,
        phase: &'static str,
    },
    #[error("'{0}' is not an option of the current question")]
    UnknownOption(String),
    #[error("the assignment has no questions")]
    EmptyDefaultSet,
}

#[derive(Debug)]
pub struct Step {
    pub state: FlowState,
    pub effects: Vec<FlowEffect>,
}

impl Step {
    fn unchanged(state: &FlowState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

/// Session-scoped state of one assessment attempt
#[derive(Debug, Clone)]
pub struct FlowState {
    plan: Arc<AssessmentPlan>,
    active: ActiveSet,
    position: usize,
    wrong_streak: u32,
    intervention_step: usize,
    alternate_correct: Vec<bool>,
    selected_answer: Option<String>,
    confidence: Option<Confidence>,
    phase: Phase,
}

impl FlowState {
    pub fn new(plan: AssessmentPlan) -> Result<Self, FlowError> {
        if plan.default_set.is_empty() {
            return Err(FlowError::EmptyDefaultSet);
        }

        Ok(Self {
            plan: Arc::new(plan),
            active: ActiveSet::Default,
            position: 0,
            wrong_streak: 0,
            intervention_step: 0,
            alternate_correct: Vec::new(),
            selected_answer: None,
            confidence: None,
            phase: Phase::Presenting,
        })
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn active_set(&self) -> ActiveSet {
        self.active
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn wrong_streak(&self) -> u32 {
        self.wrong_streak
    }

    pub fn intervention_step(&self) -> usize {
        self.intervention_step
    }

    pub fn alternate_correct(&self) -> &[bool] {
        &self.alternate_correct
    }

    pub fn plan(&self) -> &AssessmentPlan {
        &self.plan
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.phase, Phase::Completed)
    }

    fn set(&self) -> &QuestionSet {
        match self.active {
            ActiveSet::Default => &self.plan.default_set,
            ActiveSet::Alternate => &self.plan.alternate_set,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Completed => None,
            _ => self.set().questions.get(self.position),
        }
    }

    /// Submit is enabled only when both an answer and a confidence are chosen
    pub fn can_submit(&self) -> bool {
        matches!(self.phase, Phase::Presenting)
            && self.selected_answer.is_some()
            && self.confidence.is_some()
    }

    /// Pure transition function
    pub fn reduce(&self, event: FlowEvent) -> Result<Step, FlowError> {
        let mut next = self.clone();
        let mut effects = Vec::new();

        match (&self.phase, event) {
            (Phase::Presenting, FlowEvent::SelectAnswer(answer)) => {
                let known = self
                    .current_question()
                    .is_some_and(|q| q.options.iter().any(|opt| opt.text == answer));
                if !known {
                    return Err(FlowError::UnknownOption(answer));
                }
                next.selected_answer = Some(answer);
            }
            (Phase::Presenting, FlowEvent::SetConfidence(level)) => {
                next.confidence = Some(level);
            }
            (Phase::Presenting, FlowEvent::Submit) => {
                if !self.can_submit() {
                    return Ok(Step::unchanged(self));
                }
                let (Some(question), Some(answer)) =
                    (self.current_question(), self.selected_answer.as_deref())
                else {
                    return Ok(Step::unchanged(self));
                };

                let correct = question.is_correct_answer(answer);
                let message = if correct {
                    "Correct!".to_string()
                } else {
                    format!(
                        "Wrong, the correct answer is \"{}\"",
                        question
                            .correct_option()
                            .map(|opt| opt.text.as_str())
                            .unwrap_or_default()
                    )
                };

                if correct {
                    next.wrong_streak = 0;
                } else {
                    next.wrong_streak += 1;
                }
                next.phase = Phase::Feedback { correct, message };
                effects.push(FlowEffect::ScheduleFeedbackTimer);
            }
            (Phase::Feedback { correct: false, .. }, FlowEvent::FeedbackElapsed) => {
                let kind = InterventionKind::SEQUENCE
                    [next.intervention_step.min(LAST_INTERVENTION)];
                let item = self
                    .plan
                    .interventions
                    .iter()
                    .find(|item| item.kind == kind)
                    .cloned()
                    .unwrap_or(InterventionItem { kind, url: None });
                next.phase = Phase::Intervention { item };
            }
            (Phase::Feedback { correct: true, .. }, FlowEvent::FeedbackElapsed) => {
                if next.active == ActiveSet::Alternate {
                    if let Some(slot) = next.alternate_correct.get_mut(next.position) {
                        *slot = true;
                    }
                    let last = next.position + 1 == next.set().len();
                    if last && next.all_alternate_correct() {
                        next.return_to_default();
                        effects.push(FlowEffect::SwappedToDefault);
                        return Ok(Step {
                            state: next,
                            effects,
                        });
                    }
                }
                next.advance(&mut effects);
            }
            (Phase::Intervention { .. }, FlowEvent::Continue) => {
                if next.intervention_step < LAST_INTERVENTION {
                    next.intervention_step += 1;
                    next.present_again();
                } else {
                    next.intervention_step = 0;
                    match next.active {
                        ActiveSet::Default if !next.plan.alternate_set.is_empty() => {
                            next.active = ActiveSet::Alternate;
                            next.position = 0;
                            next.wrong_streak = 0;
                            next.alternate_correct = vec![false; next.plan.alternate_set.len()];
                            next.present_again();
                            effects.push(FlowEffect::SwappedToAlternate);
                        }
                        // Already remedial, or nothing to swap into: keep going forward
                        _ => next.advance(&mut effects),
                    }
                }
            }
            (phase, event) => {
                return Err(FlowError::InvalidEvent {
                    event: event.label(),
                    phase: phase.label(),
                })
            }
        }

        Ok(Step {
            state: next,
            effects,
        })
    }

    fn all_alternate_correct(&self) -> bool {
        self.alternate_correct.len() == self.plan.alternate_set.len()
            && self.alternate_correct.iter().all(|ok| *ok)
    }

    fn present_again(&mut self) {
        self.selected_answer = None;
        self.confidence = None;
        self.phase = Phase::Presenting;
    }

    fn return_to_default(&mut self) {
        self.active = ActiveSet::Default;
        self.position = 0;
        self.alternate_correct.clear();
        self.intervention_step = 0;
        self.present_again();
    }

    fn advance(&mut self, effects: &mut Vec<FlowEffect>) {
        let len = self.set().len();

        if self.active == ActiveSet::Alternate
            && self.position + 1 == len
            && self.all_alternate_correct()
        {
            self.return_to_default();
            effects.push(FlowEffect::SwappedToDefault);
            return;
        }

        if self.position + 1 < len {
            self.position += 1;
            self.present_again();
        } else {
            self.selected_answer = None;
            self.confidence = None;
            self.phase = Phase::Completed;
            effects.push(FlowEffect::WriteCompletion);
            effects.push(FlowEffect::Exit);
        }
    }

    pub fn view(&self, flow_id: &str) -> FlowView {
        let (feedback, intervention) = match &self.phase {
            Phase::Feedback { correct, message } => (
                Some(FeedbackView {
                    correct: *correct,
                    message: message.clone(),
                }),
                None,
            ),
            Phase::Intervention { item } => (None, Some(item.clone())),
            Phase::Presenting | Phase::Completed => (None, None),
        };

        FlowView {
            flow_id: flow_id.to_string(),
            assignment_id: self.plan.assignment_id.clone(),
            phase: self.phase.name(),
            active_set: self.active,
            set_name: self.set().name.clone(),
            position: self.position,
            total: self.set().len(),
            question: self.current_question().map(QuestionPrompt::from),
            selected_answer: self.selected_answer.clone(),
            confidence: self.confidence,
            can_submit: self.can_submit(),
            wrong_streak: self.wrong_streak,
            intervention_step: self.intervention_step,
            alternate_correct: self.alternate_correct.clone(),
            feedback,
            intervention,
            exit: self.is_completed(),
            notice: None,
        }
    }
}
