//! Platform detection utilities

use std::env;
use std::fs;
use std::path::PathBuf;

/// Detect if running in WSL (Windows Subsystem for Linux)
pub fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        let lower = contents.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return true;
        }
    }

    env::var("WSL_DISTRO_NAME").is_ok()
}

/// Locate an executable on `PATH`
pub fn find_program(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
