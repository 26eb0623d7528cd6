mod app;

pub use app::StillcamApp;
