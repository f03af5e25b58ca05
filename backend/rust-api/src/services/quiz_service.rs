use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::errors::ServiceError;
use crate::flow::{
    ClosedSessions, QuizAttempt, QuizError, QuizState, ScheduledTransition, SessionRegistry,
};
use crate::metrics::{record_answer, QUIZZES_ACTIVE, QUIZ_ATTEMPTS_TOTAL};
use crate::models::{new_id, AttemptLog, MasteryForecast, QuizAnswerRequest, QuizView};
use crate::services::assessment_store::{AssessmentStore, AttemptSink};
use crate::services::knowledge_tracing::KnowledgeTracingClient;

pub struct QuizSession {
    student_id: String,
    state: QuizState,
    timer: Option<ScheduledTransition>,
    attempts: Vec<QuizAttempt>,
}

/// What stays of a quiz after its last question
#[derive(Debug, Clone)]
pub struct FinishedQuiz {
    view: QuizView,
    attempts: Vec<QuizAttempt>,
}

enum Lookup {
    Live(Arc<Mutex<QuizSession>>),
    Finished(FinishedQuiz),
}

pub struct QuizService {
    store: Arc<dyn AssessmentStore>,
    sink: Arc<dyn AttemptSink>,
    quizzes: Arc<SessionRegistry<QuizSession>>,
    finished: Arc<ClosedSessions<FinishedQuiz>>,
    feedback_delay: Duration,
    quiz_length: u32,
    tickets: AtomicU64,
}

impl QuizService {
    pub fn new(
        store: Arc<dyn AssessmentStore>,
        sink: Arc<dyn AttemptSink>,
        feedback_delay: Duration,
        quiz_length: u32,
    ) -> Self {
        Self {
            store,
            sink,
            quizzes: Arc::new(SessionRegistry::new()),
            finished: Arc::new(ClosedSessions::new()),
            feedback_delay,
            quiz_length,
            tickets: AtomicU64::new(0),
        }
    }

    /// Квиз по вопросам задания, начиная с первого лёгкого вопроса
    pub async fn start(&self, student_id: &str, assignment_id: &str) -> anyhow::Result<QuizView> {
        let plan = self.store.load_plan(assignment_id, student_id).await?;
        let state = QuizState::start(
            plan.assignment_id,
            plan.default_set.questions,
            self.quiz_length,
        )?;

        let quiz_id = new_id();
        let view = state.view(&quiz_id);
        self.quizzes
            .insert(
                quiz_id.clone(),
                QuizSession {
                    student_id: student_id.to_string(),
                    state,
                    timer: None,
                    attempts: Vec::new(),
                },
            )
            .await;
        QUIZZES_ACTIVE.inc();

        tracing::info!(quiz_id = %quiz_id, student_id, assignment_id, "Quiz started");
        Ok(view)
    }

    async fn lookup(&self, quiz_id: &str, student_id: &str) -> anyhow::Result<Lookup> {
        if let Some(entry) = self.quizzes.get(quiz_id).await {
            if entry.lock().await.student_id != student_id {
                return Err(ServiceError::not_found("Quiz not found"));
            }
            return Ok(Lookup::Live(entry));
        }

        self.finished
            .get(quiz_id, student_id)
            .await
            .map(Lookup::Finished)
            .ok_or_else(|| ServiceError::not_found("Quiz not found"))
    }

    pub async fn view(&self, quiz_id: &str, student_id: &str) -> anyhow::Result<QuizView> {
        match self.lookup(quiz_id, student_id).await? {
            Lookup::Live(entry) => Ok(entry.lock().await.state.view(quiz_id)),
            Lookup::Finished(finished) => Ok(finished.view),
        }
    }

    /// Grades the answer, logs the attempt and schedules the move to the next question
    pub async fn answer(
        &self,
        quiz_id: &str,
        student_id: &str,
        request: QuizAnswerRequest,
    ) -> anyhow::Result<QuizView> {
        let entry = match self.lookup(quiz_id, student_id).await? {
            Lookup::Live(entry) => entry,
            Lookup::Finished(_) => {
                return Err(QuizError::InvalidEvent {
                    event: "submit",
                    phase: "finished",
                }
                .into())
            }
        };
        let mut session = entry.lock().await;

        let graded = {
            let mut rng = rand::rng();
            session
                .state
                .submit(request.answer.as_deref(), request.confidence, &mut rng)?
        };
        let Some(graded) = graded else {
            return Ok(session.state.view(quiz_id));
        };

        let attempt = graded.attempt;
        record_answer("quiz", attempt.correct);
        QUIZ_ATTEMPTS_TOTAL
            .with_label_values(&[attempt.difficulty.as_str()])
            .inc();

        let log = AttemptLog {
            student_id: student_id.to_string(),
            quiz_id: quiz_id.to_string(),
            question_id: attempt.question_id.clone(),
            question_difficulty: attempt.difficulty.level(),
            student_confidence: attempt.confidence.level(),
            correctness: u8::from(attempt.correct),
            recorded_at: Utc::now(),
        };
        if let Err(err) = self.sink.record(&log).await {
            tracing::warn!(quiz_id, "Failed to log quiz attempt: {:#}", err);
        }

        session.state = graded.state;
        session.attempts.push(attempt);

        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;
        let advance = AdvanceAfterFeedback {
            quiz_id: quiz_id.to_string(),
            entry: Arc::downgrade(&entry),
            ticket,
            quizzes: self.quizzes.clone(),
            finished: self.finished.clone(),
        };
        session.timer = Some(ScheduledTransition::spawn(
            ticket,
            self.feedback_delay,
            advance.run(),
        ));

        Ok(session.state.view(quiz_id))
    }

    /// Knowledge-tracing forecast over the quiz's attempts so far
    pub async fn mastery(
        &self,
        quiz_id: &str,
        student_id: &str,
        kt: &KnowledgeTracingClient,
    ) -> anyhow::Result<MasteryForecast> {
        let attempts = match self.lookup(quiz_id, student_id).await? {
            Lookup::Live(entry) => entry.lock().await.attempts.clone(),
            Lookup::Finished(finished) => finished.attempts,
        };
        kt.predict(&attempts).await
    }

    pub async fn abandon(&self, quiz_id: &str, student_id: &str) -> anyhow::Result<()> {
        match self.lookup(quiz_id, student_id).await? {
            Lookup::Live(entry) => {
                if let Some(timer) = entry.lock().await.timer.take() {
                    timer.cancel();
                }
                drop(entry);

                if self.quizzes.remove(quiz_id).await.is_some() {
                    QUIZZES_ACTIVE.dec();
                    tracing::info!(quiz_id, student_id, "Quiz closed");
                }
                self.finished.remove(quiz_id, student_id).await;
            }
            Lookup::Finished(_) => {
                self.finished.remove(quiz_id, student_id).await;
                tracing::info!(quiz_id, student_id, "Finished quiz closed");
            }
        }
        Ok(())
    }

    /// Drops quizzes nobody touched for `max_idle` and finished ones older than that
    pub async fn sweep(&self, max_idle: Duration) -> usize {
        let idle = self.quizzes.take_idle(max_idle).await;
        for (quiz_id, entry) in &idle {
            if let Some(timer) = entry.lock().await.timer.take() {
                timer.cancel();
            }
            QUIZZES_ACTIVE.dec();
            tracing::info!(quiz_id = %quiz_id, "Idle quiz dropped");
        }

        let purged = self.finished.purge(max_idle).await;
        idle.len() + purged
    }

    pub async fn active_quizzes(&self) -> usize {
        self.quizzes.len().await
    }
}

/// Timer payload: move on after the feedback delay, retiring the quiz once
/// its last question is done
struct AdvanceAfterFeedback {
    quiz_id: String,
    entry: Weak<Mutex<QuizSession>>,
    ticket: u64,
    quizzes: Arc<SessionRegistry<QuizSession>>,
    finished: Arc<ClosedSessions<FinishedQuiz>>,
}

impl AdvanceAfterFeedback {
    async fn run(self) {
        let Some(entry) = self.entry.upgrade() else {
            return;
        };
        let mut session = entry.lock().await;
        let quiz_id = self.quiz_id.as_str();

        match session.timer.take() {
            Some(timer) if timer.ticket() == self.ticket => timer.disarm(),
            other => {
                session.timer = other;
                return;
            }
        }

        let next = match session.state.feedback_elapsed() {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(quiz_id, "Quiz timer rejected: {}", err);
                return;
            }
        };
        session.state = next;
        if !session.state.is_finished() {
            return;
        }

        tracing::info!(quiz_id, score = session.state.score(), "Quiz finished");
        let outcome = FinishedQuiz {
            view: session.state.view(quiz_id),
            attempts: session.attempts.clone(),
        };
        self.finished
            .insert(quiz_id.to_string(), &session.student_id, outcome)
            .await;

        if self.quizzes.remove(quiz_id).await.is_some() {
            QUIZZES_ACTIVE.dec();
        } else {
            self.finished.remove(quiz_id, &session.student_id).await;
        }
    }
}
