//! Batch TTS synthesis - drive the speech client across a whole script
//!
//! This module provides:
//! - Sequential, paced synthesis of every segment (partial-failure tolerant)
//! - Single segment regeneration
//! - Progress tracking
//! - A session worker that serialises batches and regenerations and publishes
//!   state snapshots and events for a UI to poll

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::SessionError;
use crate::playback::HandleRegistry;
use crate::segment::{GeneratedAudio, ScriptSegmenter, Segment};
use crate::speech_client::Synthesizer;
use crate::voices::{HostStyle, VoiceConfiguration};

/// Delay between two synthesis calls
pub const DEFAULT_PACING: Duration = Duration::from_millis(2000);

// ============================================================================
// DATA MODELS
// ============================================================================

/// Aggregate progress over a segment list
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    /// Segments holding audio
    pub generated: usize,
    pub total: usize,
    /// Percentage complete (0-100)
    pub percentage: f64,
}

impl Progress {
    pub fn of(segments: &[Segment]) -> Self {
        let total = segments.len();
        let generated = segments.iter().filter(|s| s.has_audio()).count();
        let percentage = if total == 0 {
            0.0
        } else {
            generated as f64 / total as f64 * 100.0
        };
        Self {
            generated,
            total,
            percentage,
        }
    }
}

/// Outcome of one batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Events published while a session works
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A script was segmented
    SegmentsLoaded { count: usize },
    BatchStarted { total: usize },
    SegmentStarted { id: String, index: usize },
    SegmentReady { id: String, duration_seconds: f64 },
    SegmentFailed { id: String, message: String },
    BatchFinished(BatchReport),
    /// One-shot batch-level message
    Notice { message: String },
}

// ============================================================================
// BATCH SYNTHESIZER
// ============================================================================

/// Sequential synthesizer over a segment list
#[derive(Clone)]
pub struct BatchSynthesizer {
    synthesizer: Arc<dyn Synthesizer>,
    registry: HandleRegistry,
    pacing: Duration,
}

impl BatchSynthesizer {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, registry: HandleRegistry) -> Self {
        Self {
            synthesizer,
            registry,
            pacing: DEFAULT_PACING,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Synthesize every segment in order, one call at a time
    ///
    /// `observer` sees the whole list after every state change. A failed
    /// segment keeps its error message and the batch moves on.
    pub async fn generate_all<F>(
        &self,
        segments: &mut [Segment],
        speed: f32,
        mut observer: F,
    ) -> BatchReport
    where
        F: FnMut(&[Segment], &SessionEvent) + Send,
    {
        let start_time = Instant::now();
        let total = segments.len();
        let mut succeeded = 0;

        ::log::info!(
            "Starting batch synthesis of {} segments with {}",
            total,
            self.synthesizer.engine_name()
        );
        observer(segments, &SessionEvent::BatchStarted { total });

        for index in 0..total {
            if self.generate_one(segments, index, speed, &mut observer).await {
                succeeded += 1;
            }
            if index + 1 < total {
                tokio::time::sleep(self.pacing).await;
            }
        }

        let report = BatchReport {
            total,
            succeeded,
            failed: total - succeeded,
            elapsed: start_time.elapsed(),
        };
        ::log::info!(
            "Batch finished: {}/{} succeeded in {:.1}s",
            report.succeeded,
            report.total,
            report.elapsed.as_secs_f64()
        );
        observer(segments, &SessionEvent::BatchFinished(report.clone()));
        report
    }

    /// Re-synthesize one segment in place; its id and the other segments are untouched
    pub async fn regenerate<F>(
        &self,
        segments: &mut [Segment],
        id: &str,
        speed: f32,
        mut observer: F,
    ) -> Result<bool, SessionError>
    where
        F: FnMut(&[Segment], &SessionEvent) + Send,
    {
        let index = segments
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SessionError::UnknownSegment(id.to_string()))?;
        ::log::info!("Regenerating {}", id);
        Ok(self.generate_one(segments, index, speed, &mut observer).await)
    }

    async fn generate_one<F>(
        &self,
        segments: &mut [Segment],
        index: usize,
        speed: f32,
        observer: &mut F,
    ) -> bool
    where
        F: FnMut(&[Segment], &SessionEvent) + Send,
    {
        segments[index].begin_generation();
        let id = segments[index].id.clone();
        ::log::info!(
            "Segment {}/{}: {} ({})",
            index + 1,
            segments.len(),
            id,
            Self::truncate_text(&segments[index].text, 50)
        );
        observer(
            segments,
            &SessionEvent::SegmentStarted {
                id: id.clone(),
                index,
            },
        );

        let result = self
            .synthesizer
            .synthesize(&segments[index].text, &segments[index].voice, speed)
            .await;

        let event = match result {
            Ok(clip) => {
                let handle = self.registry.acquire(clip.bytes.clone());
                segments[index].complete(GeneratedAudio {
                    clip: clip.bytes,
                    duration_seconds: clip.duration_seconds,
                    handle,
                });
                SessionEvent::SegmentReady {
                    id,
                    duration_seconds: clip.duration_seconds,
                }
            }
            Err(e) => {
                ::log::error!("Segment {} failed: {}", id, e);
                let message = format!("Generation failed: {}", e);
                segments[index].fail(message.clone());
                SessionEvent::SegmentFailed { id, message }
            }
        };

        let succeeded = matches!(event, SessionEvent::SegmentReady { .. });
        observer(segments, &event);
        succeeded
    }

    /// Truncate text to preview length
    fn truncate_text(text: &str, max_len: usize) -> String {
        match text.char_indices().nth(max_len) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }
}

// ============================================================================
// CAST SESSION
// ============================================================================

/// State shared between the session worker and observers
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub segments: Vec<Segment>,
    pub progress: Progress,
    /// Whether a batch is in flight
    pub batch_running: bool,
    /// Configuration the segments were built from
    pub config: VoiceConfiguration,
}

/// Commands sent to the session worker
#[derive(Debug)]
pub enum SessionCommand {
    /// Re-segment a script, replacing the current segment list
    LoadScript {
        script: String,
        config: VoiceConfiguration,
        style: HostStyle,
    },
    GenerateAll,
    Regenerate { id: String },
    /// Acknowledged once every earlier command has been handled
    Barrier { done: oneshot::Sender<()> },
}

/// Owns one segment list and runs commands against it one at a time
///
/// Must be created inside a tokio runtime.
pub struct CastSession {
    /// Shared state
    state: Arc<RwLock<SessionState>>,
    /// Command sender (caller → worker)
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Event receiver (worker → caller)
    event_rx: Receiver<SessionEvent>,
    worker: JoinHandle<()>,
}

impl CastSession {
    pub fn spawn(batch: BatchSynthesizer) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = unbounded();
        let state = Arc::new(RwLock::new(SessionState::default()));

        let worker = tokio::spawn(Self::worker(
            batch,
            Arc::clone(&state),
            command_rx,
            event_tx,
        ));

        Self {
            state,
            command_tx,
            event_rx,
            worker,
        }
    }

    /// Get shared state
    pub fn state(&self) -> Arc<RwLock<SessionState>> {
        Arc::clone(&self.state)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn send_command(&self, command: SessionCommand) -> Result<(), SessionError> {
        ::log::debug!("Sending session command: {:?}", std::mem::discriminant(&command));
        self.command_tx.send(command).map_err(|_| {
            ::log::error!("Failed to send command (worker stopped)");
            SessionError::Closed
        })
    }

    pub fn load_script(
        &self,
        script: impl Into<String>,
        config: VoiceConfiguration,
        style: HostStyle,
    ) -> Result<(), SessionError> {
        self.send_command(SessionCommand::LoadScript {
            script: script.into(),
            config,
            style,
        })
    }

    pub fn generate_all(&self) -> Result<(), SessionError> {
        self.send_command(SessionCommand::GenerateAll)
    }

    /// Queue a regeneration; it runs after any batch already queued
    pub fn regenerate(&self, id: impl Into<String>) -> Result<(), SessionError> {
        self.send_command(SessionCommand::Regenerate { id: id.into() })
    }

    /// Wait until every command sent so far has been handled
    pub async fn wait_idle(&self) -> Result<(), SessionError> {
        let (done, ack) = oneshot::channel();
        self.send_command(SessionCommand::Barrier { done })?;
        ack.await.map_err(|_| SessionError::Closed)
    }

    /// Poll for events from the worker
    pub fn poll_events(&self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Finish queued commands, then stop the worker
    pub async fn shutdown(self) {
        let Self {
            command_tx, worker, ..
        } = self;
        drop(command_tx);
        if let Err(e) = worker.await {
            ::log::error!("Session worker ended abnormally: {}", e);
        }
    }

    async fn worker(
        batch: BatchSynthesizer,
        state: Arc<RwLock<SessionState>>,
        mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        event_tx: Sender<SessionEvent>,
    ) {
        let mut segments: Vec<Segment> = Vec::new();

        let publish = |segments: &[Segment], event: &SessionEvent| {
            {
                let mut state = state.write();
                state.segments = segments.to_vec();
                state.progress = Progress::of(segments);
                match event {
                    SessionEvent::BatchStarted { .. } => state.batch_running = true,
                    SessionEvent::BatchFinished(_) => state.batch_running = false,
                    _ => {}
                }
            }
            let _ = event_tx.send(event.clone());
        };

        while let Some(command) = command_rx.recv().await {
            match command {
                SessionCommand::LoadScript {
                    script,
                    config,
                    style,
                } => {
                    segments = ScriptSegmenter::new().segment(&script, &config, style);
                    ::log::info!("Loaded script: {} segments ({:?})", segments.len(), style);
                    state.write().config = config;
                    publish(
                        &segments,
                        &SessionEvent::SegmentsLoaded {
                            count: segments.len(),
                        },
                    );
                }

                SessionCommand::GenerateAll => {
                    if segments.is_empty() {
                        ::log::warn!("Generate requested with no segments");
                        publish(
                            &segments,
                            &SessionEvent::Notice {
                                message: "No segments to generate".to_string(),
                            },
                        );
                        continue;
                    }
                    let speed = state.read().config.speed();
                    batch.generate_all(&mut segments, speed, publish).await;
                }

                SessionCommand::Regenerate { id } => {
                    let speed = state.read().config.speed();
                    if let Err(e) = batch.regenerate(&mut segments, &id, speed, publish).await {
                        ::log::warn!("Regenerate rejected: {}", e);
                        publish(
                            &segments,
                            &SessionEvent::Notice {
                                message: e.to_string(),
                            },
                        );
                    }
                }

                SessionCommand::Barrier { done } => {
                    let _ = done.send(());
                }
            }
        }

        ::log::info!("Cast session worker: exiting");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthesisError;
    use crate::speech_client::SynthesizedClip;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records call start times and fails on texts containing "FAIL"
    #[derive(Default)]
    struct RecordingSynthesizer {
        calls: Mutex<Vec<(String, Instant)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        latency: Duration,
    }

    #[async_trait]
    impl Synthesizer for RecordingSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            _voice: &str,
            _speed: f32,
        ) -> Result<SynthesizedClip, SynthesisError> {
            self.calls.lock().push((text.to_string(), Instant::now()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if text.contains("FAIL") {
                return Err(SynthesisError::Transport("HTTP error! status: 500".into()));
            }
            Ok(SynthesizedClip {
                bytes: Bytes::from(text.to_string()),
                duration_seconds: 1.0,
            })
        }

        fn engine_name(&self) -> &str {
            "recording"
        }
    }

    fn segments(texts: &[&str]) -> Vec<Segment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Segment::new(format!("segment-{}", i), *t, "alloy"))
            .collect()
    }

    fn batch(synth: &Arc<RecordingSynthesizer>) -> BatchSynthesizer {
        BatchSynthesizer::new(synth.clone(), HandleRegistry::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_calls_only() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let batch = batch(&synth);
        let mut list = segments(&["a", "b", "c", "d"]);

        let report = batch.generate_all(&mut list, 1.0, |_, _| {}).await;
        let finished = Instant::now();

        let calls = synth.calls.lock();
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            let gap = pair[1].1 - pair[0].1;
            assert!(gap >= DEFAULT_PACING);
            assert!(gap < DEFAULT_PACING + Duration::from_millis(100));
        }
        // No delay after the final segment
        assert!(finished - calls[3].1 < Duration::from_millis(100));
        assert!(report.elapsed >= DEFAULT_PACING * 3);
        assert!(report.elapsed < DEFAULT_PACING * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_continues() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let batch = batch(&synth);
        let mut list = segments(&["one", "two", "FAIL three", "four", "five"]);

        let report = batch.generate_all(&mut list, 1.0, |_, _| {}).await;

        assert_eq!(report.total, 5);
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(
            list[2].last_error(),
            Some("Generation failed: transport error: HTTP error! status: 500")
        );
        assert!(list[2].audio_clip().is_none());
        for i in [0, 1, 3, 4] {
            assert!(list[i].has_audio());
            assert!(list[i].last_error().is_none());
            assert!(list[i].playable_url().is_some());
        }
        assert_eq!(batch.registry().live_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_generating_state() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let batch = batch(&synth);
        let mut list = segments(&["a", "b"]);
        let mut seen = Vec::new();

        batch
            .generate_all(&mut list, 1.0, |segs, event| {
                if let SessionEvent::SegmentStarted { index, .. } = event {
                    assert!(segs[*index].is_generating());
                }
                seen.push(event.clone());
            })
            .await;

        assert_eq!(seen.first(), Some(&SessionEvent::BatchStarted { total: 2 }));
        assert!(matches!(seen.last(), Some(SessionEvent::BatchFinished(_))));
        assert_eq!(
            seen[1],
            SessionEvent::SegmentStarted {
                id: "segment-0".into(),
                index: 0
            }
        );
    }

    #[tokio::test]
    async fn test_regenerate_keeps_id_and_others() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let batch = batch(&synth).with_pacing(Duration::ZERO);
        let mut list = segments(&["one", "two", "three"]);
        batch.generate_all(&mut list, 1.0, |_, _| {}).await;

        let before_url = list[1].playable_url().unwrap();
        let others = (list[0].clone(), list[2].clone());

        let ok = batch
            .regenerate(&mut list, "segment-1", 1.0, |_, _| {})
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(list[1].id, "segment-1");
        assert_ne!(list[1].playable_url().unwrap(), before_url);
        assert_eq!((list[0].clone(), list[2].clone()), others);
        drop(others);
        // Superseded handle is released
        assert!(batch.registry().resolve(&before_url).is_none());
        assert_eq!(batch.registry().live_count(), 3);
    }

    #[tokio::test]
    async fn test_regenerate_unknown_segment() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let batch = batch(&synth);
        let mut list = segments(&["one"]);
        let err = batch
            .regenerate(&mut list, "segment-9", 1.0, |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::UnknownSegment("segment-9".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_serialises_regeneration_behind_batch() {
        let synth = Arc::new(RecordingSynthesizer {
            latency: Duration::from_millis(300),
            ..Default::default()
        });
        let session = CastSession::spawn(batch(&synth));

        session
            .load_script(
                "First line\nSecond line\nThird line",
                VoiceConfiguration::default(),
                HostStyle::Single,
            )
            .unwrap();
        session.generate_all().unwrap();
        session.regenerate("segment-0").unwrap();
        session.wait_idle().await.unwrap();

        let texts: Vec<_> = synth.calls.lock().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            texts,
            ["First line", "Second line", "Third line", "First line"]
        );
        assert_eq!(synth.max_in_flight.load(Ordering::SeqCst), 1);

        let state = session.snapshot();
        assert!(!state.batch_running);
        assert_eq!(state.progress.generated, 3);
        assert_eq!(state.progress.percentage, 100.0);

        let events = session.poll_events();
        assert_eq!(events[0], SessionEvent::SegmentsLoaded { count: 3 });
        let finished = events
            .iter()
            .position(|e| matches!(e, SessionEvent::BatchFinished(_)))
            .unwrap();
        assert!(matches!(
            events[finished + 1],
            SessionEvent::SegmentStarted { index: 0, .. }
        ));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_session_notices() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let session = CastSession::spawn(batch(&synth));

        session.generate_all().unwrap();
        session.regenerate("segment-3").unwrap();
        session.wait_idle().await.unwrap();

        let events = session.poll_events();
        assert_eq!(
            events,
            [
                SessionEvent::Notice {
                    message: "No segments to generate".into()
                },
                SessionEvent::Notice {
                    message: "unknown segment: segment-3".into()
                },
            ]
        );
        assert!(synth.calls.lock().is_empty());
        session.shutdown().await;
    }

    #[test]
    fn test_progress() {
        assert_eq!(Progress::of(&[]).percentage, 0.0);
        let registry = HandleRegistry::new();
        let mut list = segments(&["a", "b", "c", "d"]);
        list[0].complete(GeneratedAudio {
            clip: Bytes::from_static(b"x"),
            duration_seconds: 1.0,
            handle: registry.acquire(Bytes::from_static(b"x")),
        });
        let progress = Progress::of(&list);
        assert_eq!(progress.generated, 1);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percentage, 25.0);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(BatchSynthesizer::truncate_text("short", 10), "short");
        assert_eq!(BatchSynthesizer::truncate_text("abcdef", 3), "abc...");
    }
}
