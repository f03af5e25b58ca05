use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::errors::ServiceError;
use crate::flow::{
    ClosedSessions, FlowEffect, FlowError, FlowEvent, FlowState, Phase, ScheduledTransition,
    SessionRegistry, Step,
};
use crate::metrics::{
    record_answer, COMPLETION_WRITE_FAILURES_TOTAL, FLOWS_ACTIVE, FLOWS_TOTAL,
    INTERVENTIONS_SHOWN_TOTAL, SET_SWAPS_TOTAL,
};
use crate::models::{new_id, CompletionRecord, FlowActionRequest, FlowView};
use crate::services::assessment_store::AssessmentStore;

const COMPLETION_NOT_SAVED: &str =
    "Assessment finished, but the result could not be saved. Please tell your teacher.";

/// Один проход ученика по заданию
pub struct FlowSession {
    student_id: String,
    state: FlowState,
    timer: Option<ScheduledTransition>,
    completion_written: bool,
    notice: Option<String>,
}

impl FlowSession {
    fn new(student_id: &str, state: FlowState) -> Self {
        Self {
            student_id: student_id.to_string(),
            state,
            timer: None,
            completion_written: false,
            notice: None,
        }
    }

    fn view(&self, flow_id: &str) -> FlowView {
        let mut view = self.state.view(flow_id);
        view.notice = self.notice.clone();
        view
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Committed {
    arm_timer: bool,
    exit: bool,
}

enum Lookup {
    Live(Arc<Mutex<FlowSession>>),
    Closed(FlowView),
}

/// Everything a timer firing needs, detached from the service
#[derive(Clone)]
struct FlowRuntime {
    store: Arc<dyn AssessmentStore>,
    feedback_delay: Duration,
    tickets: Arc<AtomicU64>,
    flows: Arc<SessionRegistry<FlowSession>>,
    finished: Arc<ClosedSessions<FlowView>>,
}

impl FlowRuntime {
    /// Arms the feedback timer; a previous timer of the session is aborted on replace
    fn arm(&self, flow_id: &str, entry: &Arc<Mutex<FlowSession>>, session: &mut FlowSession) {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;
        let runtime = self.clone();
        let weak = Arc::downgrade(entry);
        let flow_id = flow_id.to_string();

        session.timer = Some(ScheduledTransition::spawn(
            ticket,
            self.feedback_delay,
            async move { runtime.on_feedback_elapsed(flow_id, weak, ticket).await },
        ));
    }

    async fn on_feedback_elapsed(
        self,
        flow_id: String,
        entry: Weak<Mutex<FlowSession>>,
        ticket: u64,
    ) {
        let Some(entry) = entry.upgrade() else {
            return;
        };
        let mut session = entry.lock().await;

        match session.timer.take() {
            Some(timer) if timer.ticket() == ticket => timer.disarm(),
            other => {
                session.timer = other;
                tracing::debug!(flow_id = %flow_id, ticket, "Ignoring stale feedback timer");
                return;
            }
        }

        match session.state.reduce(FlowEvent::FeedbackElapsed) {
            Ok(step) => {
                let committed = self.commit(&flow_id, &mut session, step).await;
                if committed.arm_timer {
                    tracing::warn!(flow_id = %flow_id, "Feedback transition asked for another timer");
                }
                if committed.exit {
                    self.retire(&flow_id, &session).await;
                }
            }
            Err(err) => tracing::warn!(flow_id = %flow_id, "Feedback timer rejected: {}", err),
        }
    }

    /// Installs the new state and runs its effects
    async fn commit(&self, flow_id: &str, session: &mut FlowSession, step: Step) -> Committed {
        let Step { state, effects } = step;
        session.state = state;

        let mut committed = Committed::default();
        for effect in effects {
            match effect {
                FlowEffect::ScheduleFeedbackTimer => {
                    if let Phase::Feedback { correct, .. } = session.state.phase() {
                        record_answer("flow", *correct);
                    }
                    committed.arm_timer = true;
                }
                FlowEffect::WriteCompletion => self.write_completion(flow_id, session).await,
                FlowEffect::Exit => {
                    tracing::info!(flow_id, "Assessment flow completed");
                    committed.exit = true;
                }
                FlowEffect::SwappedToAlternate => {
                    SET_SWAPS_TOTAL.with_label_values(&["alternate"]).inc();
                    tracing::info!(flow_id, "Switched to the alternate question set");
                }
                FlowEffect::SwappedToDefault => {
                    SET_SWAPS_TOTAL.with_label_values(&["default"]).inc();
                    tracing::info!(flow_id, "Alternate set mastered, back to the default set");
                }
            }
        }

        if let Phase::Intervention { item } = session.state.phase() {
            INTERVENTIONS_SHOWN_TOTAL
                .with_label_values(&[item.kind.as_str()])
                .inc();
        }

        committed
    }

    /// Moves a finished flow out of the live table, keeping its last screen.
    /// The outcome is stored before the live entry goes away so readers never
    /// see a gap.
    async fn retire(&self, flow_id: &str, session: &FlowSession) {
        self.finished
            .insert(flow_id.to_string(), &session.student_id, session.view(flow_id))
            .await;

        if self.flows.remove(flow_id).await.is_some() {
            FLOWS_ACTIVE.dec();
        } else {
            // Closed by the student while the last transition was running
            self.finished.remove(flow_id, &session.student_id).await;
        }
    }

    async fn write_completion(&self, flow_id: &str, session: &mut FlowSession) {
        if session.completion_written {
            return;
        }
        session.completion_written = true;

        let plan = session.state.plan();
        let record = CompletionRecord {
            assignment_id: plan.assignment_id.clone(),
            class_id: plan.class_id.clone(),
            student_id: session.student_id.clone(),
            completed_at: Utc::now(),
        };

        match self.store.mark_completed(&record).await {
            Ok(()) => {
                FLOWS_TOTAL.with_label_values(&["completed"]).inc();
                tracing::info!(
                    flow_id,
                    assignment_id = %record.assignment_id,
                    student_id = %record.student_id,
                    "Assignment marked completed"
                );
            }
            Err(err) => {
                COMPLETION_WRITE_FAILURES_TOTAL.inc();
                tracing::error!(flow_id, "Failed to store completion: {:#}", err);
                session.notice = Some(COMPLETION_NOT_SAVED.to_string());
            }
        }
    }
}

pub struct AssessmentService {
    runtime: FlowRuntime,
}

impl AssessmentService {
    pub fn new(store: Arc<dyn AssessmentStore>, feedback_delay: Duration) -> Self {
        Self {
            runtime: FlowRuntime {
                store,
                feedback_delay,
                tickets: Arc::new(AtomicU64::new(0)),
                flows: Arc::new(SessionRegistry::new()),
                finished: Arc::new(ClosedSessions::new()),
            },
        }
    }

    /// Открыть задание: загрузить оба набора вопросов и создать flow
    pub async fn open(&self, student_id: &str, assignment_id: &str) -> anyhow::Result<FlowView> {
        let plan = self
            .runtime
            .store
            .load_plan(assignment_id, student_id)
            .await?;
        let state = FlowState::new(plan)?;

        let flow_id = new_id();
        let session = FlowSession::new(student_id, state);
        let view = session.view(&flow_id);
        self.runtime.flows.insert(flow_id.clone(), session).await;

        FLOWS_TOTAL.with_label_values(&["created"]).inc();
        FLOWS_ACTIVE.inc();
        tracing::info!(
            flow_id = %flow_id,
            student_id,
            assignment_id,
            "Assessment flow opened"
        );

        Ok(view)
    }

    async fn lookup(&self, flow_id: &str, student_id: &str) -> anyhow::Result<Lookup> {
        if let Some(entry) = self.runtime.flows.get(flow_id).await {
            if entry.lock().await.student_id != student_id {
                return Err(ServiceError::not_found("Assessment flow not found"));
            }
            return Ok(Lookup::Live(entry));
        }

        self.runtime
            .finished
            .get(flow_id, student_id)
            .await
            .map(Lookup::Closed)
            .ok_or_else(|| ServiceError::not_found("Assessment flow not found"))
    }

    pub async fn view(&self, flow_id: &str, student_id: &str) -> anyhow::Result<FlowView> {
        match self.lookup(flow_id, student_id).await? {
            Lookup::Live(entry) => Ok(entry.lock().await.view(flow_id)),
            Lookup::Closed(view) => Ok(view),
        }
    }

    pub async fn act(
        &self,
        flow_id: &str,
        student_id: &str,
        action: FlowActionRequest,
    ) -> anyhow::Result<FlowView> {
        let event = match action {
            FlowActionRequest::SelectAnswer { answer } => FlowEvent::SelectAnswer(answer),
            FlowActionRequest::SetConfidence { confidence } => FlowEvent::SetConfidence(confidence),
            FlowActionRequest::Submit => FlowEvent::Submit,
            FlowActionRequest::Continue => FlowEvent::Continue,
        };

        let entry = match self.lookup(flow_id, student_id).await? {
            Lookup::Live(entry) => entry,
            Lookup::Closed(_) => {
                return Err(FlowError::InvalidEvent {
                    event: event.label(),
                    phase: "completed",
                }
                .into())
            }
        };
        let mut session = entry.lock().await;

        let step = session.state.reduce(event)?;
        let committed = self.runtime.commit(flow_id, &mut session, step).await;
        if committed.arm_timer {
            self.runtime.arm(flow_id, &entry, &mut session);
        }
        if committed.exit {
            self.runtime.retire(flow_id, &session).await;
        }

        Ok(session.view(flow_id))
    }

    /// Drops the flow; a pending feedback timer is aborted with it
    pub async fn abandon(&self, flow_id: &str, student_id: &str) -> anyhow::Result<()> {
        match self.lookup(flow_id, student_id).await? {
            Lookup::Live(entry) => {
                if let Some(timer) = entry.lock().await.timer.take() {
                    timer.cancel();
                }
                drop(entry);

                if self.runtime.flows.remove(flow_id).await.is_some() {
                    FLOWS_ACTIVE.dec();
                    FLOWS_TOTAL.with_label_values(&["abandoned"]).inc();
                    tracing::info!(flow_id, student_id, "Assessment flow abandoned");
                }
                // The last transition may have retired it meanwhile
                self.runtime.finished.remove(flow_id, student_id).await;
            }
            Lookup::Closed(_) => {
                self.runtime.finished.remove(flow_id, student_id).await;
                tracing::info!(flow_id, student_id, "Finished assessment flow closed");
            }
        }
        Ok(())
    }

    /// Drops flows nobody touched for `max_idle` and finished outcomes older than that
    pub async fn sweep(&self, max_idle: Duration) -> usize {
        let idle = self.runtime.flows.take_idle(max_idle).await;
        for (flow_id, entry) in &idle {
            if let Some(timer) = entry.lock().await.timer.take() {
                timer.cancel();
            }
            FLOWS_ACTIVE.dec();
            FLOWS_TOTAL.with_label_values(&["abandoned"]).inc();
            tracing::info!(flow_id = %flow_id, "Idle assessment flow dropped");
        }

        let purged = self.runtime.finished.purge(max_idle).await;
        idle.len() + purged
    }

    pub async fn active_flows(&self) -> usize {
        self.runtime.flows.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnswerOption, AssessmentPlan, Confidence, DifficultyTier, FlowPhaseName, Question,
        QuestionSet,
    };
    use crate::services::assessment_store::{interventions_from, PlanError};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeStore {
        questions: usize,
        completions: StdMutex<Vec<CompletionRecord>>,
    }

    #[async_trait]
    impl AssessmentStore for FakeStore {
        async fn load_plan(
            &self,
            assignment_id: &str,
            _student_id: &str,
        ) -> Result<AssessmentPlan, PlanError> {
            let questions = (0..self.questions)
                .map(|i| Question {
                    id: format!("q{}", i),
                    teacher_id: "t1".into(),
                    title: String::new(),
                    text: format!("Question {}", i),
                    options: vec![
                        AnswerOption {
                            text: "yes".into(),
                            is_correct: true,
                        },
                        AnswerOption {
                            text: "no".into(),
                            is_correct: false,
                        },
                    ],
                    difficulty: DifficultyTier::Low,
                    subject: String::new(),
                    topic: String::new(),
                    tags: Vec::new(),
                    image_url: None,
                    created_at: Utc::now(),
                })
                .collect();

            Ok(AssessmentPlan {
                assignment_id: assignment_id.to_string(),
                class_id: "c1".into(),
                title: "Fractions".into(),
                default_set: QuestionSet::new("Fractions", questions),
                alternate_set: QuestionSet::default(),
                interventions: interventions_from(None),
            })
        }

        async fn mark_completed(&self, record: &CompletionRecord) -> anyhow::Result<()> {
            self.completions.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    async fn submit(service: &AssessmentService, flow_id: &str, answer: &str) -> FlowView {
        service
            .act(
                flow_id,
                "s1",
                FlowActionRequest::SelectAnswer {
                    answer: answer.into(),
                },
            )
            .await
            .unwrap();
        service
            .act(
                flow_id,
                "s1",
                FlowActionRequest::SetConfidence {
                    confidence: Confidence::Low,
                },
            )
            .await
            .unwrap();
        service
            .act(flow_id, "s1", FlowActionRequest::Submit)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_feedback_timer_advances_flow() {
        let store = Arc::new(FakeStore {
            questions: 2,
            ..Default::default()
        });
        let service = AssessmentService::new(store.clone(), Duration::from_millis(10));
        let opened = service.open("s1", "a1").await.unwrap();

        let view = submit(&service, &opened.flow_id, "yes").await;
        assert_eq!(view.phase, FlowPhaseName::Feedback);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let view = service.view(&opened.flow_id, "s1").await.unwrap();
        assert_eq!(view.phase, FlowPhaseName::Presenting);
        assert_eq!(view.position, 1);
    }

    #[tokio::test]
    async fn test_abandon_cancels_pending_completion() {
        let store = Arc::new(FakeStore {
            questions: 1,
            ..Default::default()
        });
        let service = AssessmentService::new(store.clone(), Duration::from_millis(50));
        let opened = service.open("s1", "a1").await.unwrap();

        submit(&service, &opened.flow_id, "yes").await;
        service.abandon(&opened.flow_id, "s1").await.unwrap();
        assert_eq!(service.active_flows().await, 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.completions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flow_is_private_to_its_student() {
        let store = Arc::new(FakeStore {
            questions: 1,
            ..Default::default()
        });
        let service = AssessmentService::new(store, Duration::from_millis(10));
        let opened = service.open("s1", "a1").await.unwrap();

        let err = service.view(&opened.flow_id, "s2").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_completed_flow_leaves_registry_but_stays_readable() {
        let store = Arc::new(FakeStore {
            questions: 1,
            ..Default::default()
        });
        let service = AssessmentService::new(store.clone(), Duration::from_millis(10));
        let opened = service.open("s1", "a1").await.unwrap();
        assert_eq!(service.active_flows().await, 1);

        submit(&service, &opened.flow_id, "yes").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(service.active_flows().await, 0);
        assert_eq!(store.completions.lock().unwrap().len(), 1);

        let view = service.view(&opened.flow_id, "s1").await.unwrap();
        assert_eq!(view.phase, FlowPhaseName::Completed);
        assert!(view.exit);
        assert!(service.view(&opened.flow_id, "s2").await.is_err());

        let err = service
            .act(&opened.flow_id, "s1", FlowActionRequest::Submit)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FlowError>(),
            Some(FlowError::InvalidEvent { .. })
        ));

        service.abandon(&opened.flow_id, "s1").await.unwrap();
        assert!(service.view(&opened.flow_id, "s1").await.is_err());
        assert_eq!(store.completions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_drops_idle_flows() {
        let store = Arc::new(FakeStore {
            questions: 2,
            ..Default::default()
        });
        let service = AssessmentService::new(store, Duration::from_millis(10));
        let idle = service.open("s1", "a1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let busy = service.open("s2", "a1").await.unwrap();

        assert_eq!(service.sweep(Duration::from_millis(40)).await, 1);
        assert_eq!(service.active_flows().await, 1);
        assert!(service.view(&idle.flow_id, "s1").await.is_err());
        assert!(service.view(&busy.flow_id, "s2").await.is_ok());
    }
}
