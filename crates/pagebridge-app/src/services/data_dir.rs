// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-user data directory and config file location.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "pagebridge";
const CONFIG_FILE: &str = "config.json";

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = base_dir(
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
    .join(APP_DIR);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "cannot create data directory");
    }
    dir
}

/// Default location of the bridge config file.
pub fn config_path() -> PathBuf {
    config_in(&data_dir())
}

fn config_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// XDG data dir, then `~/.local/share`, then the temp dir.
fn base_dir(xdg: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    if let Some(xdg) = xdg.filter(|p| p.is_absolute()) {
        return xdg;
    }
    if let Some(home) = home {
        return home.join(".local").join("share");
    }
    std::env::temp_dir()
}
