//! Difficulty-adaptive quiz: tier steps up on a correct answer, down on a
//! wrong one, and the next question is drawn at random from the new tier.

use std::sync::Arc;

use rand::{seq::IndexedRandom, Rng};
use thiserror::Error;

use crate::models::{
    question::QuestionPrompt, Confidence, DifficultyTier, FeedbackView, Question, QuizPhaseName,
    QuizView,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("no questions at difficulty '{}'", .0.as_str())]
    EmptyTier(DifficultyTier),
    #[error("{event} is not accepted while the quiz is {phase}")]
    InvalidEvent {
        event: &'static str,
        phase: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuizPhase {
    Presenting,
    Feedback {
        correct: bool,
        message: String,
        next: Option<usize>,
    },
    Finished,
}

impl QuizPhase {
    fn label(&self) -> &'static str {
        match self {
            QuizPhase::Presenting => "presenting",
            QuizPhase::Feedback { .. } => "feedback",
            QuizPhase::Finished => "finished",
        }
    }
}

/// One graded answer, in the shape the analytics sink and the
/// knowledge-tracing model expect
#[derive(Debug, Clone, PartialEq)]
pub struct QuizAttempt {
    pub question_id: String,
    /// Index of the question in the quiz pool
    pub pool_index: usize,
    pub difficulty: DifficultyTier,
    pub confidence: Confidence,
    pub correct: bool,
}

#[derive(Debug)]
pub struct Graded {
    pub state: QuizState,
    pub attempt: QuizAttempt,
}

#[derive(Debug, Clone)]
pub struct QuizState {
    assignment_id: String,
    pool: Arc<Vec<Question>>,
    current: usize,
    number: u32,
    total: u32,
    score: u32,
    tier: DifficultyTier,
    phase: QuizPhase,
}

fn pick<R: Rng + ?Sized>(pool: &[Question], tier: DifficultyTier, rng: &mut R) -> Option<usize> {
    let candidates: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, q)| q.difficulty == tier)
        .map(|(index, _)| index)
        .collect();
    candidates.choose(rng).copied()
}

impl QuizState {
    /// Starts at the first question of the lowest tier
    pub fn start(
        assignment_id: impl Into<String>,
        pool: Vec<Question>,
        total: u32,
    ) -> Result<Self, QuizError> {
        let tier = DifficultyTier::LOWEST;
        let current = pool
            .iter()
            .position(|q| q.difficulty == tier)
            .ok_or(QuizError::EmptyTier(tier))?;

        Ok(Self {
            assignment_id: assignment_id.into(),
            pool: Arc::new(pool),
            current,
            number: 1,
            total: total.max(1),
            score: 0,
            tier,
            phase: QuizPhase::Presenting,
        })
    }

    pub fn phase(&self) -> &QuizPhase {
        &self.phase
    }

    pub fn tier(&self) -> DifficultyTier {
        self.tier
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, QuizPhase::Finished)
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            QuizPhase::Finished => None,
            _ => self.pool.get(self.current),
        }
    }

    /// Grades the answer and picks the next question at the adjusted tier.
    /// `Ok(None)` means there was nothing to submit.
    pub fn submit<R: Rng + ?Sized>(
        &self,
        answer: Option<&str>,
        confidence: Option<Confidence>,
        rng: &mut R,
    ) -> Result<Option<Graded>, QuizError> {
        if !matches!(self.phase, QuizPhase::Presenting) {
            return Err(QuizError::InvalidEvent {
                event: "submit",
                phase: self.phase.label(),
            });
        }

        let Some(answer) = answer.filter(|a| !a.is_empty()) else {
            return Ok(None);
        };
        let Some(question) = self.pool.get(self.current) else {
            return Ok(None);
        };

        let correct = question.is_correct_answer(answer);
        let tier = if correct {
            self.tier.harder()
        } else {
            self.tier.easier()
        };

        let next = if self.number < self.total {
            Some(pick(&self.pool, tier, rng).ok_or(QuizError::EmptyTier(tier))?)
        } else {
            None
        };

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

        let attempt = QuizAttempt {
            question_id: question.id.clone(),
            pool_index: self.current,
            difficulty: question.difficulty,
            confidence: confidence.unwrap_or_default(),
            correct,
        };

        let mut state = self.clone();
        if correct {
            state.score += 1;
        }
        state.tier = tier;
        state.phase = QuizPhase::Feedback {
            correct,
            message,
            next,
        };

        Ok(Some(Graded { state, attempt }))
    }

    /// Moves past the feedback screen
    pub fn feedback_elapsed(&self) -> Result<QuizState, QuizError> {
        let QuizPhase::Feedback { next, .. } = &self.phase else {
            return Err(QuizError::InvalidEvent {
                event: "feedback_elapsed",
                phase: self.phase.label(),
            });
        };

        let mut state = self.clone();
        match next {
            Some(index) => {
                state.current = *index;
                state.number += 1;
                state.phase = QuizPhase::Presenting;
            }
            None => state.phase = QuizPhase::Finished,
        }
        Ok(state)
    }

    pub fn view(&self, quiz_id: &str) -> QuizView {
        let (phase, feedback) = match &self.phase {
            QuizPhase::Presenting => (QuizPhaseName::Presenting, None),
            QuizPhase::Feedback {
                correct, message, ..
            } => (
                QuizPhaseName::Feedback,
                Some(FeedbackView {
                    correct: *correct,
                    message: message.clone(),
                }),
            ),
            QuizPhase::Finished => (QuizPhaseName::Finished, None),
        };

        QuizView {
            quiz_id: quiz_id.to_string(),
            assignment_id: self.assignment_id.clone(),
            phase,
            number: self.number,
            total: self.total,
            score: self.score,
            tier: self.tier,
            question: self.current_question().map(QuestionPrompt::from),
            feedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerOption;
    use chrono::Utc;
    use rand::{rngs::StdRng, SeedableRng};

    fn question(id: &str, difficulty: DifficultyTier) -> Question {
        Question {
            id: id.to_string(),
            teacher_id: "teacher".into(),
            title: String::new(),
            text: id.to_string(),
            options: vec![
                AnswerOption {
                    text: "A".into(),
                    is_correct: true,
                },
                AnswerOption {
                    text: "B".into(),
                    is_correct: false,
                },
            ],
            difficulty,
            subject: String::new(),
            topic: String::new(),
            tags: Vec::new(),
            image_url: None,
            created_at: Utc::now(),
        }
    }

    fn pool() -> Vec<Question> {
        vec![
            question("m1", DifficultyTier::Medium),
            question("l1", DifficultyTier::Low),
            question("l2", DifficultyTier::Low),
            question("h1", DifficultyTier::High),
            question("m2", DifficultyTier::Medium),
        ]
    }

    fn step(state: QuizState, answer: &str, rng: &mut StdRng) -> (QuizState, QuizAttempt) {
        let graded = state
            .submit(Some(answer), Some(Confidence::High), rng)
            .unwrap()
            .unwrap();
        (graded.state.feedback_elapsed().unwrap(), graded.attempt)
    }

    #[test]
    fn test_starts_with_first_lowest_tier_question() {
        let quiz = QuizState::start("a1", pool(), 5).unwrap();
        assert_eq!(quiz.current_question().unwrap().id, "l1");
        assert_eq!(quiz.tier(), DifficultyTier::Low);
        assert_eq!(quiz.number(), 1);
    }

    #[test]
    fn test_start_without_lowest_tier_fails() {
        let only_high = vec![question("h1", DifficultyTier::High)];
        assert_eq!(
            QuizState::start("a1", only_high, 5).unwrap_err(),
            QuizError::EmptyTier(DifficultyTier::Low)
        );
    }

    #[test]
    fn test_tier_steps_up_and_down_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let quiz = QuizState::start("a1", pool(), 5).unwrap();

        let (quiz, _) = step(quiz, "A", &mut rng);
        assert_eq!(quiz.tier(), DifficultyTier::Medium);
        assert_eq!(
            quiz.current_question().unwrap().difficulty,
            DifficultyTier::Medium
        );

        let (quiz, _) = step(quiz, "A", &mut rng);
        assert_eq!(quiz.tier(), DifficultyTier::High);
        assert_eq!(quiz.current_question().unwrap().id, "h1");

        let (quiz, _) = step(quiz, "A", &mut rng);
        assert_eq!(quiz.tier(), DifficultyTier::High);

        let (quiz, _) = step(quiz, "B", &mut rng);
        assert_eq!(quiz.tier(), DifficultyTier::Medium);
        assert_eq!(quiz.score(), 3);
    }

    #[test]
    fn test_wrong_answer_at_lowest_tier_stays_low() {
        let mut rng = StdRng::seed_from_u64(1);
        let quiz = QuizState::start("a1", pool(), 5).unwrap();
        let (quiz, attempt) = step(quiz, "B", &mut rng);
        assert_eq!(quiz.tier(), DifficultyTier::Low);
        assert!(!attempt.correct);
        assert_eq!(attempt.question_id, "l1");
        assert_eq!(attempt.difficulty, DifficultyTier::Low);
    }

    #[test]
    fn test_finishes_after_exactly_five_questions() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut quiz = QuizState::start("a1", pool(), 5).unwrap();
        let mut attempts = Vec::new();
        for _ in 0..5 {
            assert!(!quiz.is_finished());
            let (next, attempt) = step(quiz, "A", &mut rng);
            attempts.push(attempt);
            quiz = next;
        }
        assert!(quiz.is_finished());
        assert_eq!(attempts.len(), 5);
        let view = quiz.view("q1");
        assert_eq!(view.phase, QuizPhaseName::Finished);
        assert_eq!(view.score, 5);
        assert_eq!(view.total, 5);
        assert!(view.question.is_none());
        assert!(quiz
            .submit(Some("A"), None, &mut rng)
            .is_err());
    }

    #[test]
    fn test_empty_target_tier_is_an_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let pool = vec![
            question("l1", DifficultyTier::Low),
            question("h1", DifficultyTier::High),
        ];
        let quiz = QuizState::start("a1", pool, 5).unwrap();
        let err = quiz
            .submit(Some("A"), Some(Confidence::Low), &mut rng)
            .unwrap_err();
        assert_eq!(err, QuizError::EmptyTier(DifficultyTier::Medium));
        assert_eq!(quiz.phase(), &QuizPhase::Presenting);
    }

    #[test]
    fn test_missing_answer_is_noop_and_confidence_defaults_to_medium() {
        let mut rng = StdRng::seed_from_u64(9);
        let quiz = QuizState::start("a1", pool(), 5).unwrap();
        assert!(quiz.submit(None, None, &mut rng).unwrap().is_none());
        assert!(quiz.submit(Some(""), None, &mut rng).unwrap().is_none());

        let graded = quiz.submit(Some("A"), None, &mut rng).unwrap().unwrap();
        assert_eq!(graded.attempt.confidence, Confidence::Medium);
        assert!(matches!(
            graded.state.phase(),
            QuizPhase::Feedback { correct: true, .. }
        ));
        assert!(graded.state.submit(Some("A"), None, &mut rng).is_err());
    }
}
