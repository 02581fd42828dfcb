use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const ACTIVITY_LOG_FILE: &str = "activity.log";

/// Append-only JSON lines log shared by commands and background services.
#[derive(Debug)]
pub struct ActivityLog {
    path: Option<PathBuf>,
    guard: Mutex<()>,
}

impl ActivityLog {
    pub fn in_dir(logs_dir: impl AsRef<Path>) -> Self {
        Self {
            path: Some(logs_dir.as_ref().join(ACTIVITY_LOG_FILE)),
            guard: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, component: &str, message: &str) {
        self.append("info", component, message);
    }

    pub fn warn(&self, component: &str, message: &str) {
        self.append("warn", component, message);
    }

    pub fn error(&self, component: &str, message: &str) {
        self.append("error", component, message);
    }

    fn append(&self, level: &str, component: &str, message: &str) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let Ok(_guard) = self.guard.lock() else {
            return;
        };
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "component": component,
            "message": message,
        });

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::disabled()
    }
}
