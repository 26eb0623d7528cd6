//! Startup environment checks. Only ever produces warnings.

use std::path::{Path, PathBuf};

/// Places where an OBS Studio install usually leaves a trace
pub fn obs_install_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = [
        "/usr/bin/obs",
        "/usr/local/bin/obs",
        "/usr/share/obs",
        "/var/lib/flatpak/app/com.obsproject.Studio",
        "/snap/obs-studio",
        "/Applications/OBS.app",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Some(data) = dirs::data_local_dir() {
        candidates.push(data.join("flatpak/app/com.obsproject.Studio"));
    }

    for var in ["ProgramFiles", "ProgramFiles(x86)"] {
        if let Some(dir) = std::env::var_os(var) {
            candidates.push(PathBuf::from(dir).join("obs-studio"));
        }
    }

    candidates
}

/// Returns a warning when none of `candidates` exists
pub fn check_obs(candidates: &[PathBuf]) -> Option<String> {
    if candidates.iter().any(|p| p.exists()) {
        None
    } else {
        Some("OBS Studio not detected - the virtual camera may not work".into())
    }
}

/// Returns warnings when the loopback module or the output node is missing
pub fn check_loopback(module_dir: &Path, device: &Path) -> Vec<String> {
    let mut warnings = Vec::new();

    if !module_dir.exists() {
        warnings.push(
            "v4l2loopback kernel module is not loaded (try: sudo modprobe v4l2loopback)".into(),
        );
    }
    if !device.exists() {
        warnings.push(format!("Output device {} does not exist", device.display()));
    }

    warnings
}

/// Runs every check against the real system
pub fn check_environment(device: &Path) -> Vec<String> {
    let mut warnings = Vec::new();

    if cfg!(target_os = "linux") {
        warnings.extend(check_loopback(Path::new("/sys/module/v4l2loopback"), device));
    }
    warnings.extend(check_obs(&obs_install_candidates()));

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    warnings
}
