//! Session lifecycle behind the control panel.
//!
//! `Controller` owns all panel state and is the only thing the GUI talks
//! to. It is toolkit-agnostic: the GUI renders its accessors and forwards
//! button presses, and calls `poll_events` once per UI frame so publisher
//! events are handled on the UI thread.

use crate::config::{clamp_fps, PixelFormat, SessionConfig, DEFAULT_FPS, PRESET_RESOLUTIONS};
use crate::error::{AppError, Result};
use crate::frame::{self, FrameBuffer};
use crate::output::SinkOpener;
use crate::publisher::{noop_notifier, FramePublisher, Notifier, PublisherEvent, StopOutcome};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// How long `stop` waits for the publisher to release the camera
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

struct ActiveSession {
    publisher: FramePublisher,
    config: Arc<SessionConfig>,
}

pub struct Controller {
    opener: Arc<dyn SinkOpener>,
    notify: Notifier,
    events_tx: mpsc::Sender<PublisherEvent>,
    events_rx: mpsc::Receiver<PublisherEvent>,
    stop_timeout: Duration,

    image_path: Option<PathBuf>,
    preview: Option<RgbaImage>,
    preview_generation: u64,
    resolution: String,
    fps: u32,
    pixel_format: PixelFormat,

    state: SessionState,
    status: String,
    warnings: Vec<String>,
    pending_error: Option<String>,

    session: Option<ActiveSession>,
    next_session: u64,
}

impl Controller {
    pub fn new(opener: Arc<dyn SinkOpener>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            opener,
            notify: noop_notifier(),
            events_tx,
            events_rx,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            image_path: None,
            preview: None,
            preview_generation: 0,
            resolution: PRESET_RESOLUTIONS[0].to_string(),
            fps: DEFAULT_FPS,
            pixel_format: PixelFormat::default(),
            state: SessionState::Idle,
            status: "Ready: select an image".into(),
            warnings: Vec::new(),
            pending_error: None,
            session: None,
            next_session: 1,
        }
    }

    /// Called by the publisher thread after each queued event
    pub fn with_notifier(mut self, notify: Notifier) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Startup warnings shown as a banner
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Decode `path` and make it the image for the next session. A file
    /// that does not decode leaves the previous selection in place.
    pub fn select_image(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if self.state == SessionState::Running {
            tracing::warn!("Image selection ignored while running");
            return Err(AppError::configuration("stop the camera before changing the image"));
        }

        let image = frame::decode_image(&path).map_err(|e| self.report(e))?;
        tracing::info!(
            "Selected {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        self.preview = Some(frame::preview(&image));
        self.preview_generation += 1;
        self.status = format!("Selected: {}", display_name(&path));
        self.image_path = Some(path);
        Ok(())
    }

    pub fn set_resolution(&mut self, resolution: impl Into<String>) {
        if self.state == SessionState::Idle {
            self.resolution = resolution.into();
        }
    }

    pub fn set_fps(&mut self, fps: u32) {
        if self.state == SessionState::Idle {
            self.fps = clamp_fps(fps);
        }
    }

    /// Validate the panel inputs, render the frame and launch the publisher
    pub fn start(&mut self) -> Result<()> {
        if self.state == SessionState::Running {
            tracing::warn!("Start ignored: a session is already running");
            return Err(AppError::configuration("a session is already running"));
        }

        let config = SessionConfig::new(
            self.image_path.clone(),
            &self.resolution,
            self.fps,
            self.pixel_format,
        )
        .map_err(|e| self.report(e))?;

        let frame = FrameBuffer::load(&config).map_err(|e| self.report(e))?;

        let session = self.next_session;
        self.next_session += 1;

        let config = Arc::new(config);
        let publisher = FramePublisher::spawn(
            session,
            Arc::clone(&self.opener),
            Arc::new(frame),
            Arc::clone(&config),
            self.events_tx.clone(),
            Arc::clone(&self.notify),
        )
        .map_err(|e| self.report(e))?;

        tracing::info!(
            "Session {} started: {} @ {}fps ({})",
            session,
            config.resolution,
            config.fps,
            config.pixel_format
        );
        self.status = format!("Running: {} @ {}fps", config.resolution, config.fps);
        self.state = SessionState::Running;
        self.session = Some(ActiveSession { publisher, config });
        Ok(())
    }

    /// Ask the publisher to stop and wait a bounded time. The panel is
    /// back to Idle afterwards whether or not the worker acknowledged.
    pub fn stop(&mut self) -> StopOutcome {
        // A failure queued before the press must still reach the user
        self.drain_events();

        let Some(active) = self.session.take() else {
            return StopOutcome::NotRunning;
        };

        let outcome = active.publisher.stop(self.stop_timeout);
        self.state = SessionState::Idle;
        self.status = match outcome {
            StopOutcome::TimedOut => "Stopped (camera release timed out)".into(),
            _ => "Stopped".into(),
        };
        tracing::info!("{}", self.status);
        outcome
    }

    /// The publisher failed on its own; show the error and return to Idle
    pub fn on_publisher_error(&mut self, error: AppError) {
        if let Some(active) = self.session.take() {
            active.publisher.stop(self.stop_timeout);
        }
        self.state = SessionState::Idle;
        self.report(error);
    }

    /// Handle queued publisher events. Must run on the UI thread.
    pub fn poll_events(&mut self) {
        self.drain_events();

        let exited = self
            .session
            .as_ref()
            .is_some_and(|s| s.publisher.is_finished());
        if exited {
            // A failing worker queues its error right before exiting
            self.drain_events();
            if self.session.is_some() {
                self.on_publisher_error(AppError::Device("publisher stopped unexpectedly".into()));
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            let Some(active) = &self.session else {
                tracing::debug!("Dropping event from finished session {}", event.session());
                continue;
            };
            if active.publisher.session() != event.session() {
                tracing::debug!("Dropping event from finished session {}", event.session());
                continue;
            }

            match event {
                PublisherEvent::Started { device, .. } => {
                    self.status = format!(
                        "Running: {} @ {}fps on {}",
                        active.config.resolution, active.config.fps, device
                    );
                }
                PublisherEvent::Failed { error, .. } => self.on_publisher_error(error),
            }
        }
    }

    /// Pending user-visible error, handed out once
    pub fn take_error(&mut self) -> Option<String> {
        self.pending_error.take()
    }

    fn report(&mut self, error: AppError) -> AppError {
        tracing::error!("{}", error);
        self.status = error.to_string();
        self.pending_error = Some(error.to_string());
        error
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn can_start(&self) -> bool {
        self.state == SessionState::Idle && self.image_path.is_some()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    /// Preview thumbnail and a counter bumped whenever it changes
    pub fn preview(&self) -> Option<(&RgbaImage, u64)> {
        self.preview.as_ref().map(|p| (p, self.preview_generation))
    }

    pub fn resolution_text(&self) -> &str {
        &self.resolution
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.stop();
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputSink;

    struct NeverOpener;

    impl SinkOpener for NeverOpener {
        fn open(&self, _config: &SessionConfig) -> anyhow::Result<Box<dyn OutputSink>> {
            anyhow::bail!("no device")
        }
    }

    fn controller() -> Controller {
        Controller::new(Arc::new(NeverOpener))
    }

    #[test]
    fn starts_idle_with_defaults() {
        let c = controller();
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.resolution_text(), "640x480");
        assert_eq!(c.fps(), 30);
        assert!(!c.can_start());
        assert!(c.preview().is_none());
    }

    #[test]
    fn fps_is_clamped() {
        let mut c = controller();
        c.set_fps(0);
        assert_eq!(c.fps(), 1);
        c.set_fps(120);
        assert_eq!(c.fps(), 60);
    }

    #[test]
    fn malformed_resolution_aborts_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();

        let mut c = controller();
        c.select_image(&path).unwrap();
        c.set_resolution("wide");

        let err = c.start().unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.take_error().is_some());
    }

    #[test]
    fn display_name_uses_file_name() {
        assert_eq!(display_name(Path::new("/tmp/photos/photo.png")), "photo.png");
    }
}
