//! The capture coordinator thread.
//!
//! # Threads
//!
//! ```text
//! pipeline thread                 worker thread
//! ───────────────                 ─────────────
//! source.read ─► segmenter ─► job ─► transcriber.transcribe
//!      ▲                              │
//!      └──────── result ◄─────────────┘
//!                  │
//!                  └─► apply_result ─► PipelineEvent::TranscriptChunk
//! ```
//!
//! The source lives entirely on the pipeline thread (`cpal::Stream` is not
//! `Send`); it is built there from a `Send` factory closure.  Exactly one
//! transcription job is in flight at a time — the worker is sequential, so
//! chunks arrive downstream in order by construction.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::Sender;

use crate::audio::{rms, AudioSource, TARGET_RATE};
use crate::config::TranscriptionConfig;
use crate::segment::{PreparedChunk, Segmenter};
use crate::stt::{Transcriber, TranscriptSegment, SttError};

use super::events::{AudioStatus, PipelineControl, PipelineEvent};

/// How long one `read` blocks before the loop re-checks its flags.
const READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Minimum spacing between level-meter events.
const LEVEL_INTERVAL: Duration = Duration::from_millis(100);
/// How long shutdown waits for the in-flight transcription.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds the session's audio source on the pipeline thread.
pub type SourceFactory = Box<dyn FnOnce() -> Box<dyn AudioSource> + Send>;

// ---------------------------------------------------------------------------
// Worker plumbing
// ---------------------------------------------------------------------------

struct Job {
    chunk: PreparedChunk,
    prompt: Option<String>,
}

struct JobResult {
    result: Result<Vec<TranscriptSegment>, SttError>,
    wall_start: f64,
    is_first: bool,
}

fn spawn_worker(
    transcriber: Arc<dyn Transcriber>,
) -> (mpsc::Sender<Job>, mpsc::Receiver<JobResult>) {
    let (job_tx, job_rx) = mpsc::channel::<Job>();
    let (result_tx, result_rx) = mpsc::channel::<JobResult>();

    thread::Builder::new()
        .name("transcribe-worker".into())
        .spawn(move || {
            while let Ok(job) = job_rx.recv() {
                let result = transcriber.transcribe(&job.chunk.samples, job.prompt.as_deref());
                let done = JobResult {
                    result,
                    wall_start: job.chunk.wall_start,
                    is_first: job.chunk.is_first,
                };
                if result_tx.send(done).is_err() {
                    break;
                }
            }
        })
        .expect("failed to spawn transcription worker");

    (job_tx, result_rx)
}

// ---------------------------------------------------------------------------
// WAV recording (optional)
// ---------------------------------------------------------------------------

struct WavRecorder {
    writer: hound::WavWriter<std::io::BufWriter<std::fs::File>>,
}

impl WavRecorder {
    fn create(path: &PathBuf) -> Option<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: TARGET_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        match hound::WavWriter::create(path, spec) {
            Ok(writer) => Some(Self { writer }),
            Err(e) => {
                log::warn!("cannot create {}: {e}", path.display());
                None
            }
        }
    }

    fn write(&mut self, samples: &[f32]) {
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            if self.writer.write_sample(v).is_err() {
                return;
            }
        }
    }

    fn finalize(self) {
        if let Err(e) = self.writer.finalize() {
            log::warn!("failed to finalize recording: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Spawn the pipeline thread.
///
/// Events flow to `events` via `blocking_send`; the controller flips flags
/// on `control`.  The thread ends after emitting `Status(Stopped)`.
pub fn spawn_pipeline(
    factory: SourceFactory,
    config: TranscriptionConfig,
    hints: Vec<String>,
    transcriber: Arc<dyn Transcriber>,
    control: Arc<PipelineControl>,
    events: Sender<PipelineEvent>,
    wav_path: Option<PathBuf>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("audio-pipeline".into())
        .spawn(move || {
            run(factory, config, hints, transcriber, control, events, wav_path);
        })
        .expect("failed to spawn pipeline thread")
}

fn run(
    factory: SourceFactory,
    config: TranscriptionConfig,
    hints: Vec<String>,
    transcriber: Arc<dyn Transcriber>,
    control: Arc<PipelineControl>,
    events: Sender<PipelineEvent>,
    wav_path: Option<PathBuf>,
) {
    let mut source = factory();
    if let Err(e) = source.open() {
        let _ = events.blocking_send(PipelineEvent::Fatal(format!("cannot open audio: {e}")));
        let _ = events.blocking_send(PipelineEvent::Status(AudioStatus::Stopped));
        return;
    }
    let _ = events.blocking_send(PipelineEvent::Status(AudioStatus::Started));

    let mut segmenter = Segmenter::new(
        config.chunk_duration,
        config.overlap,
        config.silence_threshold,
        config.pause_duration,
        hints,
    );
    let (job_tx, result_rx) = spawn_worker(transcriber);
    let mut recorder = wav_path.as_ref().and_then(WavRecorder::create);

    let mut pending = false;
    let mut was_paused = false;
    let mut last_level = Instant::now();

    while !control.is_shutdown() {
        // ── Pause handling ────────────────────────────────────────────────
        if control.is_paused() {
            if !was_paused {
                was_paused = true;
                segmenter.reset();
                let _ = events.blocking_send(PipelineEvent::Status(AudioStatus::Paused));
                log::info!("recording paused");
            }
            // Frames are read and dropped so device buffers stay drained.
            match source.read(READ_TIMEOUT) {
                Ok(_) => {}
                Err(e) => {
                    let _ = events.blocking_send(PipelineEvent::Fatal(e.to_string()));
                    break;
                }
            }
            if drain_results(&result_rx, &mut segmenter, &events) {
                pending = false;
            }
            continue;
        }
        if was_paused {
            was_paused = false;
            let _ = events.blocking_send(PipelineEvent::Status(AudioStatus::Resumed));
            log::info!("recording resumed");
        }

        // ── Read one frame ────────────────────────────────────────────────
        match source.read(READ_TIMEOUT) {
            Ok(Some(frame)) => {
                segmenter.feed(&frame.samples);
                if let Some(r) = recorder.as_mut() {
                    r.write(&frame.samples);
                }
                if last_level.elapsed() >= LEVEL_INTERVAL {
                    last_level = Instant::now();
                    let _ = events.blocking_send(PipelineEvent::Level {
                        rms: rms(&frame.samples),
                    });
                }
            }
            Ok(None) => {}
            Err(e) => {
                let _ = events.blocking_send(PipelineEvent::Fatal(e.to_string()));
                break;
            }
        }

        // ── Collect finished work, then maybe launch the next chunk ──────
        if drain_results(&result_rx, &mut segmenter, &events) {
            pending = false;
        }

        if !pending && segmenter.should_emit() {
            if let Some(chunk) = segmenter.take_chunk() {
                let prompt = segmenter.prompt();
                if job_tx.send(Job { chunk, prompt }).is_ok() {
                    pending = true;
                }
            }
        }
    }

    // ── Shutdown: finish in-flight work, flush the tail ───────────────────
    if pending {
        if let Ok(done) = result_rx.recv_timeout(DRAIN_TIMEOUT) {
            forward_result(done, &mut segmenter, &events);
        } else {
            log::warn!("in-flight transcription did not finish before shutdown");
        }
    }

    if let Some(chunk) = segmenter.flush() {
        let prompt = segmenter.prompt();
        if job_tx.send(Job { chunk, prompt }).is_ok() {
            if let Ok(done) = result_rx.recv_timeout(DRAIN_TIMEOUT) {
                forward_result(done, &mut segmenter, &events);
            }
        }
    }

    source.close();
    if let Some(r) = recorder.take() {
        r.finalize();
    }
    drop(job_tx); // lets the worker thread exit
    let _ = events.blocking_send(PipelineEvent::Status(AudioStatus::Stopped));
    log::info!("pipeline stopped");
}

/// Forward every finished job waiting in the result channel.
/// Returns true when at least one result was consumed.
fn drain_results(
    result_rx: &mpsc::Receiver<JobResult>,
    segmenter: &mut Segmenter,
    events: &Sender<PipelineEvent>,
) -> bool {
    let mut any = false;
    while let Ok(done) = result_rx.try_recv() {
        any = true;
        forward_result(done, segmenter, events);
    }
    any
}

fn forward_result(
    done: JobResult,
    segmenter: &mut Segmenter,
    events: &Sender<PipelineEvent>,
) {
    match done.result {
        Ok(segments) => {
            let kept = segmenter.apply_result(segments, done.wall_start, done.is_first);
            if !kept.is_empty() {
                let _ = events.blocking_send(PipelineEvent::TranscriptChunk(kept));
            }
        }
        Err(e) => {
            // One bad chunk is skipped; the session keeps running.
            log::warn!("transcription failed, skipping chunk: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFrame, AudioSourceError};
    use crate::stt::MockTranscriber;
    use std::collections::VecDeque;

    /// Plays back scripted frames, then times out until shutdown.
    struct ScriptedSource {
        frames: VecDeque<Vec<f32>>,
    }

    impl AudioSource for ScriptedSource {
        fn open(&mut self) -> Result<(), AudioSourceError> {
            Ok(())
        }

        fn read(&mut self, _t: Duration) -> Result<Option<AudioFrame>, AudioSourceError> {
            Ok(self.frames.pop_front().map(|samples| AudioFrame {
                samples,
                captured_at: Instant::now(),
            }))
        }

        fn close(&mut self) {}
    }

    struct FailingSource;

    impl AudioSource for FailingSource {
        fn open(&mut self) -> Result<(), AudioSourceError> {
            Err(AudioSourceError::NoInputDevice)
        }

        fn read(&mut self, _t: Duration) -> Result<Option<AudioFrame>, AudioSourceError> {
            Ok(None)
        }

        fn close(&mut self) {}
    }

    fn test_config() -> TranscriptionConfig {
        TranscriptionConfig {
            chunk_duration: 1.0,
            overlap: 0.25,
            silence_threshold: 0.01,
            pause_duration: 0.5,
            ..TranscriptionConfig::default()
        }
    }

    fn loud_frames(secs: f32) -> VecDeque<Vec<f32>> {
        // 100 ms frames of speech-level signal.
        let n = (secs / 0.1) as usize;
        (0..n).map(|_| vec![0.5_f32; 1_600]).collect()
    }

    #[tokio::test]
    async fn pipeline_emits_ordered_chunks_and_stops() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let control = Arc::new(PipelineControl::new());
        let transcriber = Arc::new(MockTranscriber::ok("hello", 0.9));

        let handle = spawn_pipeline(
            Box::new(|| {
                Box::new(ScriptedSource {
                    frames: loud_frames(3.0),
                })
            }),
            test_config(),
            vec![],
            transcriber,
            control.clone(),
            tx,
            None,
        );

        let mut started = false;
        let mut chunks: Vec<Vec<TranscriptSegment>> = Vec::new();
        let mut stopped = false;

        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Status(AudioStatus::Started) => started = true,
                PipelineEvent::Status(AudioStatus::Stopped) => {
                    stopped = true;
                    break;
                }
                PipelineEvent::TranscriptChunk(segs) => {
                    chunks.push(segs);
                    if chunks.len() == 2 {
                        control.request_shutdown();
                    }
                }
                _ => {}
            }
        }

        handle.join().unwrap();
        assert!(started);
        assert!(stopped);
        assert!(chunks.len() >= 2, "expected at least two chunks");
        // Chunks carry strictly increasing stream offsets.
        let starts: Vec<f64> = chunks.iter().map(|c| c[0].wall_start).collect();
        for pair in starts.windows(2) {
            assert!(pair[0] < pair[1], "out of order: {starts:?}");
        }
    }

    #[tokio::test]
    async fn open_failure_is_fatal_then_stopped() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let control = Arc::new(PipelineControl::new());
        let transcriber = Arc::new(MockTranscriber::ok("x", 0.5));

        let handle = spawn_pipeline(
            Box::new(|| Box::new(FailingSource)),
            test_config(),
            vec![],
            transcriber,
            control,
            tx,
            None,
        );

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, PipelineEvent::Fatal(_)));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            PipelineEvent::Status(AudioStatus::Stopped)
        ));
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn failed_chunk_is_skipped_not_fatal() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let control = Arc::new(PipelineControl::new());
        let transcriber = Arc::new(MockTranscriber::scripted(vec![
            Err(SttError::Transcription("boom".into())),
            Ok(vec![TranscriptSegment {
                text: "after the failure".into(),
                wall_start: 0.0,
                wall_end: 0.9,
            }]),
        ]));

        let handle = spawn_pipeline(
            Box::new(|| {
                Box::new(ScriptedSource {
                    frames: loud_frames(2.5),
                })
            }),
            test_config(),
            vec![],
            transcriber,
            control.clone(),
            tx,
            None,
        );

        let mut chunks = 0;
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::TranscriptChunk(_) => {
                    chunks += 1;
                    control.request_shutdown();
                }
                PipelineEvent::Fatal(m) => panic!("unexpected fatal: {m}"),
                PipelineEvent::Status(AudioStatus::Stopped) => break,
                _ => {}
            }
        }
        handle.join().unwrap();
        // The first chunk failed and was skipped; the next one still arrived.
        assert!(chunks >= 1);
    }
}
