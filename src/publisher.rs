//! Background frame delivery.
//!
//! One worker thread per session opens the sink, then writes the same
//! frame every frame period until the stop flag is raised. Everything the
//! worker has to tell the UI goes through a `PublisherEvent` channel,
//! followed by a call to the notifier so the UI thread wakes up and drains
//! it on its own schedule.

use crate::config::SessionConfig;
use crate::error::{AppError, Result};
use crate::frame::FrameBuffer;
use crate::output::SinkOpener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Frames between two stats lines at debug level
const STATS_INTERVAL: u64 = 300;

/// Wakes the UI thread after an event was queued
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

pub fn noop_notifier() -> Notifier {
    Arc::new(|| {})
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherEvent {
    /// The sink is open and the send loop is running
    Started { session: u64, device: String },
    /// Opening or writing failed; the worker has exited
    Failed { session: u64, error: AppError },
}

impl PublisherEvent {
    pub fn session(&self) -> u64 {
        match self {
            PublisherEvent::Started { session, .. } | PublisherEvent::Failed { session, .. } => {
                *session
            }
        }
    }
}

/// Result of a bounded stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running
    NotRunning,
    /// The worker released the sink and exited
    Stopped,
    /// The worker did not acknowledge in time and was left to finish alone
    TimedOut,
}

pub struct FramePublisher {
    session: u64,
    stop: Arc<AtomicBool>,
    done_rx: mpsc::Receiver<()>,
    exited: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FramePublisher {
    pub fn spawn(
        session: u64,
        opener: Arc<dyn SinkOpener>,
        frame: Arc<FrameBuffer>,
        config: Arc<SessionConfig>,
        events: mpsc::Sender<PublisherEvent>,
        notify: Notifier,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();

        let exited = Arc::new(AtomicBool::new(false));
        let exit_guard = WakeOnExit {
            exited: Arc::clone(&exited),
            notify: Arc::clone(&notify),
        };
        let worker = Worker {
            session,
            opener,
            frame,
            config,
            stop: Arc::clone(&stop),
            events,
            notify,
        };

        let handle = std::thread::Builder::new()
            .name("frame-publisher".into())
            .spawn(move || {
                let _exit_guard = exit_guard;
                worker.run();
                // Receiver may be gone after a timed-out stop
                let _ = done_tx.send(());
            })
            .map_err(|e| AppError::Device(format!("failed to spawn publisher thread: {}", e)))?;

        Ok(Self {
            session,
            stop,
            done_rx,
            exited,
            handle: Some(handle),
        })
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// True once the worker is past its last event, even if the thread is
    /// still unwinding
    pub fn is_finished(&self) -> bool {
        self.exited.load(Ordering::Acquire)
            || self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Raise the stop flag and wait up to `timeout` for the worker to exit
    pub fn stop(mut self, timeout: Duration) -> StopOutcome {
        self.stop.store(true, Ordering::Release);

        match self.done_rx.recv_timeout(timeout) {
            // Disconnected means the worker died without acknowledging
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        tracing::error!("Publisher thread for session {} panicked", self.session);
                    }
                }
                tracing::debug!("Publisher for session {} stopped", self.session);
                StopOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Publisher for session {} did not stop within {:?}; detaching",
                    self.session,
                    timeout
                );
                StopOutcome::TimedOut
            }
        }
    }
}

impl Drop for FramePublisher {
    fn drop(&mut self) {
        // A publisher dropped without stop() must not keep writing
        self.stop.store(true, Ordering::Release);
    }
}

/// Wakes the UI once the worker thread ends, panics included, so a dead
/// worker is noticed without waiting for other input
struct WakeOnExit {
    exited: Arc<AtomicBool>,
    notify: Notifier,
}

impl Drop for WakeOnExit {
    fn drop(&mut self) {
        self.exited.store(true, Ordering::Release);
        (self.notify)();
    }
}

struct Worker {
    session: u64,
    opener: Arc<dyn SinkOpener>,
    frame: Arc<FrameBuffer>,
    config: Arc<SessionConfig>,
    stop: Arc<AtomicBool>,
    events: mpsc::Sender<PublisherEvent>,
    notify: Notifier,
}

impl Worker {
    fn run(self) {
        let mut sink = match self.opener.open(&self.config) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::error!("Failed to open virtual camera: {:#}", e);
                self.emit(PublisherEvent::Failed {
                    session: self.session,
                    error: AppError::device(&e),
                });
                return;
            }
        };

        let device = sink.device_name();
        tracing::info!(
            "Virtual camera active on {} ({} @ {}fps)",
            device,
            sink.resolution(),
            self.config.fps
        );
        self.emit(PublisherEvent::Started {
            session: self.session,
            device,
        });

        let frame_duration = self.config.frame_period();
        let mut frame_count = 0u64;
        let mut total_write_time = Duration::ZERO;
        let started = Instant::now();

        while !self.stop.load(Ordering::Acquire) {
            let loop_start = Instant::now();

            if let Err(e) = sink.write_frame(&self.frame) {
                tracing::error!("Virtual camera write failed: {:#}", e);
                self.emit(PublisherEvent::Failed {
                    session: self.session,
                    error: AppError::device(&e),
                });
                return;
            }
            total_write_time += loop_start.elapsed();
            frame_count += 1;

            if frame_count % STATS_INTERVAL == 0 {
                let avg_write_ms = total_write_time.as_secs_f64() * 1000.0 / frame_count as f64;
                let actual_fps = frame_count as f64 / started.elapsed().as_secs_f64();
                tracing::debug!(
                    "Frame {}: write={:.2}ms, fps={:.1}",
                    frame_count,
                    avg_write_ms,
                    actual_fps
                );
            }

            // Frame rate limiting
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }

        drop(sink);
        tracing::info!(
            "Virtual camera released after {} frames (session {})",
            frame_count,
            self.session
        );
    }

    fn emit(&self, event: PublisherEvent) {
        if self.events.send(event).is_ok() {
            (self.notify)();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PixelFormat, Resolution};
    use crate::output::OutputSink;
    use image::{DynamicImage, RgbImage};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    struct CountingSink {
        writes: Arc<AtomicUsize>,
        resolution: Resolution,
    }

    impl OutputSink for CountingSink {
        fn write_frame(&mut self, frame: &FrameBuffer) -> anyhow::Result<()> {
            assert_eq!(frame.resolution(), self.resolution);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn resolution(&self) -> Resolution {
            self.resolution
        }

        fn device_name(&self) -> String {
            "counting".into()
        }
    }

    struct CountingOpener {
        writes: Arc<AtomicUsize>,
    }

    impl SinkOpener for CountingOpener {
        fn open(&self, config: &SessionConfig) -> anyhow::Result<Box<dyn OutputSink>> {
            Ok(Box::new(CountingSink {
                writes: Arc::clone(&self.writes),
                resolution: config.resolution,
            }))
        }
    }

    struct BusyOpener;

    impl SinkOpener for BusyOpener {
        fn open(&self, _config: &SessionConfig) -> anyhow::Result<Box<dyn OutputSink>> {
            anyhow::bail!("device busy")
        }
    }

    fn session_parts(fps: u32) -> (Arc<FrameBuffer>, Arc<SessionConfig>) {
        let resolution = Resolution::new(8, 6);
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 6));
        let frame = FrameBuffer::render(&image, resolution, PixelFormat::Rgb24);
        let config = SessionConfig {
            image_path: PathBuf::from("unused.png"),
            resolution,
            fps,
            pixel_format: PixelFormat::Rgb24,
        };
        (Arc::new(frame), Arc::new(config))
    }

    #[test]
    fn writes_until_stopped() {
        let writes = Arc::new(AtomicUsize::new(0));
        let (frame, config) = session_parts(60);
        let (tx, rx) = mpsc::channel();

        let publisher = FramePublisher::spawn(
            1,
            Arc::new(CountingOpener { writes: Arc::clone(&writes) }),
            frame,
            config,
            tx,
            noop_notifier(),
        )
        .unwrap();

        let started = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            started,
            PublisherEvent::Started {
                session: 1,
                device: "counting".into()
            }
        );

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(publisher.stop(Duration::from_secs(2)), StopOutcome::Stopped);

        let written = writes.load(Ordering::SeqCst);
        assert!(written >= 1);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(writes.load(Ordering::SeqCst), written, "no writes after stop");
    }

    #[test]
    fn open_failure_reported_and_notified() {
        let (frame, config) = session_parts(30);
        let (tx, rx) = mpsc::channel();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);

        let publisher = FramePublisher::spawn(
            7,
            Arc::new(BusyOpener),
            frame,
            config,
            tx,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            event,
            PublisherEvent::Failed {
                session: 7,
                error: AppError::Device("device busy".into())
            }
        );
        assert_eq!(event.session(), 7);
        assert_eq!(publisher.stop(Duration::from_secs(2)), StopOutcome::Stopped);
        // Once for the event, once for the thread exit
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert!(rx.try_recv().is_err());
    }
}
