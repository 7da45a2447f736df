use ragstream_core::{
    update, AppState, Effect, IngestMode, IngestPhase, IngestRequest, JobSnapshot, JobStatus,
    Msg, NotificationLevel,
};

fn start_job(state: AppState) -> AppState {
    let (state, effects) = update(
        state,
        Msg::IngestSubmitted {
            request: IngestRequest::url("https://example.com/guide"),
            mode: IngestMode::Job,
        },
    );
    assert_eq!(effects.len(), 1);
    let (state, _) = update(
        state,
        Msg::JobAccepted {
            generation: 1,
            job_id: "job-1".into(),
        },
    );
    state
}

fn poll(state: AppState, snapshot: JobSnapshot) -> AppState {
    update(
        state,
        Msg::JobPolled {
            generation: 1,
            snapshot,
        },
    )
    .0
}

#[test]
fn accepted_job_moves_to_polling() {
    let mut state = start_job(AppState::new());
    let view = state.view();
    assert_eq!(view.ingest.phase, IngestPhase::Polling);
    assert_eq!(view.ingest.job_id.as_deref(), Some("job-1"));
    assert_eq!(view.ingest.status_line, "Queued");
    assert_eq!(state.take_notifications()[0].level, NotificationLevel::Info);
}

#[test]
fn running_snapshot_uses_step_or_placeholder() {
    let state = start_job(AppState::new());
    let state = poll(state, JobSnapshot::new(JobStatus::Running, 35));
    assert_eq!(state.view().ingest.status_line, "Processing...");
    assert_eq!(state.view().ingest.percent, 35);

    let mut snapshot = JobSnapshot::new(JobStatus::Running, 60);
    snapshot.step = Some("Embedding".into());
    let state = poll(state, snapshot);
    assert_eq!(state.view().ingest.status_line, "Embedding");
}

#[test]
fn completed_snapshot_forces_full_progress_and_notifies_once() {
    let mut state = start_job(AppState::new());
    state.take_notifications();

    let state = poll(state, JobSnapshot::new(JobStatus::Pending, 0));
    let state = poll(state, JobSnapshot::new(JobStatus::Running, 40));
    let state = poll(state, JobSnapshot::new(JobStatus::Running, 70));
    let mut state = poll(state, JobSnapshot::new(JobStatus::Completed, 90));

    assert_eq!(state.ingest_phase(), IngestPhase::Completed);
    assert_eq!(state.view().ingest.percent, 100);
    let notes = state.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Success);

    // A stray snapshot after the terminal one changes nothing.
    let mut state = poll(state, JobSnapshot::new(JobStatus::Running, 10));
    assert_eq!(state.view().ingest.percent, 100);
    assert!(state.take_notifications().is_empty());
}

#[test]
fn failed_snapshot_without_reason_reports_unknown() {
    let mut state = start_job(AppState::new());
    state.take_notifications();
    let mut state = poll(state, JobSnapshot::new(JobStatus::Failed, 20));

    assert_eq!(state.ingest_phase(), IngestPhase::Failed);
    let notes = state.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].text, "Ingestion failed: unknown");
}

#[test]
fn poll_transport_failure_is_terminal() {
    let state = start_job(AppState::new());
    let (state, _) = update(
        state,
        Msg::JobPollFailed {
            generation: 1,
            error: "network error".into(),
        },
    );
    assert_eq!(state.ingest_phase(), IngestPhase::Failed);
}

#[test]
fn watching_existing_job_emits_watch_effect() {
    let (state, effects) = update(AppState::new(), Msg::JobWatchRequested("abc".into()));
    assert_eq!(
        effects,
        vec![Effect::WatchJob {
            generation: 1,
            job_id: "abc".into(),
        }]
    );
    assert_eq!(state.ingest_phase(), IngestPhase::Polling);

    let (state, effects) = update(state, Msg::JobWatchRequested("def".into()));
    assert_eq!(
        effects,
        vec![
            Effect::CancelIngest { generation: 1 },
            Effect::WatchJob {
                generation: 2,
                job_id: "def".into(),
            },
        ]
    );

    // Snapshot from the superseded poller is ignored.
    let (state, _) = update(
        state,
        Msg::JobPolled {
            generation: 1,
            snapshot: JobSnapshot::new(JobStatus::Completed, 100),
        },
    );
    assert_eq!(state.ingest_phase(), IngestPhase::Polling);
}

#[test]
fn blank_job_id_is_rejected() {
    let (mut state, effects) = update(AppState::new(), Msg::JobWatchRequested(" ".into()));
    assert!(effects.is_empty());
    assert_eq!(state.take_notifications().len(), 1);
}
