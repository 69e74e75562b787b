//! Background generation worker.
//!
//! A single long-lived thread owns the whole resolve -> generate -> apply
//! pipeline, so manual requests and auto-change ticks are serialized by
//! construction: a tick or click that arrives mid-cycle waits behind it, and
//! duplicate manual requests collapse into the cycle that just ran. The UI
//! talks to the worker through channels only.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use crate::api::{GenerationRequest, PollinationsClient};
use crate::context;
use crate::modes::{self, ContextSnapshot, Mode};
use crate::wallpaper::{self, StyleMode};

/// Everything one cycle needs, snapshotted from settings at trigger time.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub mode: Mode,
    pub custom_prompt: String,
    pub width: u32,
    pub height: u32,
    pub enhance: bool,
    pub style: StyleMode,
    pub output_dir: PathBuf,
}

/// Command messages sent to the worker.
pub enum WorkerCommand {
    /// Replace the job template used by subsequent cycles.
    Configure(Box<JobSpec>),
    /// Swap API credentials or model.
    Credentials { api_key: String, model: String },
    /// Run one cycle now.
    Generate,
    /// Enable or disable the auto-change timer.
    SetAutoChange(Option<Duration>),
    /// Stop the worker loop.
    Stop,
}

/// Events emitted back to the UI thread.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Progress text for the status line.
    Status(String),
    /// A wallpaper was generated and applied.
    Applied { path: PathBuf, sub_condition: String },
    /// The cycle failed; the message names the probable cause.
    Failed(String),
    /// The cycle was cancelled before anything became visible.
    Cancelled,
}

/// One generation cycle, minus the scheduling. Implemented by the real
/// Pollinations-backed pipeline and by test stubs.
pub trait Pipeline: Send {
    fn run(&mut self, spec: &JobSpec, cancel: &AtomicBool, events: &Sender<WorkerEvent>);

    fn reconfigure(&mut self, _api_key: &str, _model: &str) {}
}

/// Handle to the background generation worker.
pub struct GenerationWorker {
    cmd_tx: Sender<WorkerCommand>,
    event_rx: Receiver<WorkerEvent>,
    cancel: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl GenerationWorker {
    /// Spawn the worker with the real Pollinations pipeline.
    pub fn start(spec: JobSpec, api_key: &str, model: &str) -> Self {
        let pipeline = GenerationPipeline {
            client: PollinationsClient::new(api_key, model),
            rng: ChaChaRng::from_entropy(),
        };
        Self::start_with(pipeline, spec)
    }

    fn start_with(pipeline: impl Pipeline + 'static, spec: JobSpec) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (evt_tx, evt_rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let join = thread::spawn(move || {
            run_worker(pipeline, spec, worker_cancel, cmd_rx, evt_tx);
        });
        Self {
            cmd_tx,
            event_rx: evt_rx,
            cancel,
            join: Some(join),
        }
    }

    pub fn configure(&self, spec: JobSpec) {
        let _ = self.cmd_tx.send(WorkerCommand::Configure(Box::new(spec)));
    }

    pub fn set_credentials(&self, api_key: &str, model: &str) {
        let _ = self.cmd_tx.send(WorkerCommand::Credentials {
            api_key: api_key.to_string(),
            model: model.to_string(),
        });
    }

    /// Request one generation cycle.
    pub fn generate_now(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::Generate);
    }

    /// Enable or disable the auto-change timer. Disabling also cancels any
    /// cycle still in flight so its result is never applied.
    pub fn set_auto_change(&self, interval: Option<Duration>) {
        if interval.is_none() {
            self.cancel.store(true, Ordering::SeqCst);
        }
        let _ = self.cmd_tx.send(WorkerCommand::SetAutoChange(interval));
    }

    /// Drain any pending events into the provided buffer.
    pub fn drain_events(&self, out: &mut Vec<WorkerEvent>) {
        while let Ok(event) = self.event_rx.try_recv() {
            out.push(event);
        }
    }

    /// Stop the worker without blocking the UI thread. An in-flight cycle is
    /// cancelled rather than applied.
    pub fn stop(mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        let _ = self.cmd_tx.send(WorkerCommand::Stop);
        if let Some(join) = self.join.take() {
            thread::spawn(move || {
                let _ = join.join();
            });
        }
    }
}

/// Scheduler loop: reacts to commands and the auto-change deadline, running
/// at most one pipeline cycle at a time.
fn run_worker<P: Pipeline>(
    mut pipeline: P,
    mut spec: JobSpec,
    cancel: Arc<AtomicBool>,
    cmd_rx: Receiver<WorkerCommand>,
    evt_tx: Sender<WorkerEvent>,
) {
    let mut auto: Option<Duration> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let command = match deadline {
            Some(due) => {
                let now = Instant::now();
                if due <= now {
                    None
                } else {
                    match cmd_rx.recv_timeout(due - now) {
                        Ok(command) => Some(command),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
            }
            None => match cmd_rx.recv() {
                Ok(command) => Some(command),
                Err(_) => return,
            },
        };

        match command {
            Some(WorkerCommand::Stop) => return,
            Some(WorkerCommand::Configure(new_spec)) => {
                spec = *new_spec;
                continue;
            }
            Some(WorkerCommand::Credentials { api_key, model }) => {
                pipeline.reconfigure(&api_key, &model);
                continue;
            }
            Some(WorkerCommand::SetAutoChange(interval)) => {
                auto = interval;
                deadline = interval.map(|period| Instant::now() + period);
                if interval.is_some() {
                    cancel.store(false, Ordering::SeqCst);
                }
                continue;
            }
            Some(WorkerCommand::Generate) => {
                cancel.store(false, Ordering::SeqCst);
                pipeline.run(&spec, &cancel, &evt_tx);
            }
            // Auto-change deadline elapsed.
            None => pipeline.run(&spec, &cancel, &evt_tx),
        }

        // Requests queued while the cycle ran collapse into it; config
        // updates still take effect.
        loop {
            match cmd_rx.try_recv() {
                Ok(WorkerCommand::Generate) => {}
                Ok(WorkerCommand::Stop) => return,
                Ok(WorkerCommand::Configure(new_spec)) => spec = *new_spec,
                Ok(WorkerCommand::Credentials { api_key, model }) => {
                    pipeline.reconfigure(&api_key, &model)
                }
                Ok(WorkerCommand::SetAutoChange(interval)) => {
                    auto = interval;
                    if interval.is_some() {
                        cancel.store(false, Ordering::SeqCst);
                    }
                }
                Err(_) => break,
            }
        }

        // Re-arm from the end of the run, so a tick that elapsed mid-cycle
        // is deferred instead of stacking.
        deadline = auto.map(|period| Instant::now() + period);
    }
}

/// The production pipeline: context -> prompt -> Pollinations -> Pictures.
struct GenerationPipeline {
    client: PollinationsClient,
    rng: ChaChaRng,
}

impl Pipeline for GenerationPipeline {
    fn run(&mut self, spec: &JobSpec, cancel: &AtomicBool, events: &Sender<WorkerEvent>) {
        let _ = events.send(WorkerEvent::Status("Resolving prompt...".to_string()));

        // Only the providers the mode needs are consulted, so e.g. the
        // nature mode never waits on the weather service.
        let snapshot = ContextSnapshot {
            hour: context::current_hour(),
            weather: (spec.mode == Mode::Weather)
                .then(context::fetch_weather)
                .flatten(),
            mood: (spec.mode == Mode::Music)
                .then(context::sample_music_mood)
                .flatten(),
        };
        let resolved = modes::resolve(spec.mode, &spec.custom_prompt, &snapshot, &mut self.rng);
        info!(
            "cycle: mode={:?} sub-condition={}",
            spec.mode, resolved.sub_condition
        );

        let _ = events.send(WorkerEvent::Status(format!(
            "Contacting AI server ({})...",
            resolved.sub_condition
        )));
        let request = GenerationRequest {
            prompt: resolved.prompt,
            width: spec.width,
            height: spec.height,
            seed: None,
            enhance: spec.enhance,
        };
        let payload = match self.client.generate(&request) {
            Ok(payload) => payload,
            Err(err) => {
                let _ = events.send(WorkerEvent::Failed(err.to_string()));
                return;
            }
        };

        finish_cycle(
            &payload.bytes,
            spec,
            &resolved.sub_condition,
            cancel,
            events,
        );
    }

    fn reconfigure(&mut self, api_key: &str, model: &str) {
        self.client.reconfigure(api_key, model);
    }
}

/// Apply stage shared with tests: the cancellation flag is checked before
/// anything user-visible happens.
fn finish_cycle(
    bytes: &[u8],
    spec: &JobSpec,
    sub_condition: &str,
    cancel: &AtomicBool,
    events: &Sender<WorkerEvent>,
) {
    if cancel.load(Ordering::SeqCst) {
        info!("cycle cancelled before apply, discarding image");
        let _ = events.send(WorkerEvent::Cancelled);
        return;
    }

    let _ = events.send(WorkerEvent::Status("Setting wallpaper...".to_string()));
    if let Err(err) = wallpaper::set_wallpaper_style(spec.style) {
        // Style is cosmetic; the wallpaper itself can still be applied.
        warn!("could not set wallpaper style: {err}");
    }
    match wallpaper::apply(bytes, &spec.output_dir) {
        Ok(path) => {
            let _ = events.send(WorkerEvent::Applied {
                path,
                sub_condition: sub_condition.to_string(),
            });
        }
        Err(err) => {
            let _ = events.send(WorkerEvent::Failed(err.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn spec() -> JobSpec {
        JobSpec {
            mode: Mode::Nature,
            custom_prompt: String::new(),
            width: 1920,
            height: 1080,
            enhance: false,
            style: StyleMode::Fill,
            output_dir: std::env::temp_dir().join("pollipaper_worker_test"),
        }
    }

    /// Pipeline stub that records run counts, rejects overlap, and honors
    /// the cancellation flag the way the real apply stage does.
    struct StubPipeline {
        runs: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
        overlaps: Arc<AtomicUsize>,
        applied: Arc<AtomicUsize>,
        duration: Duration,
    }

    impl StubPipeline {
        fn new(duration: Duration) -> Self {
            Self {
                runs: Arc::new(AtomicUsize::new(0)),
                active: Arc::new(AtomicUsize::new(0)),
                overlaps: Arc::new(AtomicUsize::new(0)),
                applied: Arc::new(AtomicUsize::new(0)),
                duration,
            }
        }
    }

    impl Pipeline for StubPipeline {
        fn run(&mut self, _spec: &JobSpec, cancel: &AtomicBool, events: &Sender<WorkerEvent>) {
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.duration);
            if cancel.load(Ordering::SeqCst) {
                let _ = events.send(WorkerEvent::Cancelled);
            } else {
                self.applied.fetch_add(1, Ordering::SeqCst);
                let _ = events.send(WorkerEvent::Applied {
                    path: PathBuf::from("stub.png"),
                    sub_condition: "stub".to_string(),
                });
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn burst_of_requests_runs_one_pipeline() {
        let stub = StubPipeline::new(Duration::from_millis(100));
        let runs = Arc::clone(&stub.runs);
        let overlaps = Arc::clone(&stub.overlaps);

        let worker = GenerationWorker::start_with(stub, spec());
        worker.generate_now();
        worker.generate_now();
        worker.generate_now();
        thread::sleep(Duration::from_millis(300));
        worker.stop();
        thread::sleep(Duration::from_millis(150));

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn auto_change_keeps_ticking_without_overlap() {
        let stub = StubPipeline::new(Duration::from_millis(40));
        let runs = Arc::clone(&stub.runs);
        let overlaps = Arc::clone(&stub.overlaps);

        let worker = GenerationWorker::start_with(stub, spec());
        worker.set_auto_change(Some(Duration::from_millis(30)));
        thread::sleep(Duration::from_millis(300));
        worker.stop();
        thread::sleep(Duration::from_millis(150));

        assert!(runs.load(Ordering::SeqCst) >= 2);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stopping_mid_cycle_prevents_apply() {
        let stub = StubPipeline::new(Duration::from_millis(120));
        let applied = Arc::clone(&stub.applied);
        let runs = Arc::clone(&stub.runs);

        let worker = GenerationWorker::start_with(stub, spec());
        worker.generate_now();
        thread::sleep(Duration::from_millis(30));
        // Stop while the cycle is sleeping; the flag must win.
        worker.stop();
        thread::sleep(Duration::from_millis(250));

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disabling_auto_change_cancels_in_flight_cycle() {
        let stub = StubPipeline::new(Duration::from_millis(120));
        let applied = Arc::clone(&stub.applied);

        let worker = GenerationWorker::start_with(stub, spec());
        worker.set_auto_change(Some(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(50));
        worker.set_auto_change(None);
        thread::sleep(Duration::from_millis(250));
        let applied_at_disable = applied.load(Ordering::SeqCst);
        worker.stop();

        // The cycle running when auto-change was disabled must not apply.
        assert_eq!(applied_at_disable, 0);
    }

    #[test]
    fn cancelled_cycle_writes_nothing_and_reports_it() {
        let dir = std::env::temp_dir().join(format!(
            "pollipaper_cancel_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let mut job = spec();
        job.output_dir = dir.clone();
        let cancel = AtomicBool::new(true);
        let (tx, rx) = mpsc::channel();

        finish_cycle(&[1, 2, 3], &job, "aurora", &cancel, &tx);

        assert!(matches!(rx.try_recv(), Ok(WorkerEvent::Cancelled)));
        assert!(!dir.exists());
    }
}
