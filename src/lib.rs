//! Stream a still image into a v4l2loopback virtual camera.
//!
//! ```text
//! ┌──────────────┐ start/stop ┌────────────────┐ write_frame ┌──────────────┐
//! │  Controller  │───────────▶│ FramePublisher │────────────▶│  V4L2Output  │
//! │  (UI thread) │◀───────────│ (worker)       │             │ (loopback)   │
//! └──────────────┘   events   └────────────────┘             └──────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod output;
pub mod probe;
pub mod publisher;

pub use config::{PixelFormat, Resolution, SessionConfig};
pub use controller::{Controller, SessionState};
pub use error::{AppError, Result};
pub use frame::FrameBuffer;
pub use publisher::{FramePublisher, PublisherEvent, StopOutcome};
