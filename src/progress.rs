//! Rebuild progress reporting.
//!
//! Reports observable progress during `docvault index rebuild` so users see
//! how many archives were found and how far reading them has got. Progress
//! is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use clap::ValueEnum;

/// A single progress event for a rebuild.
#[derive(Clone, Debug)]
pub enum RebuildProgressEvent {
    /// Walking the archive root. Total unknown.
    Discovering { root: String },
    /// `n` archives read out of `total`.
    Reading { n: u64, total: u64 },
    /// Replacing the index with `entries` entries.
    Writing { entries: u64 },
}

/// Reports rebuild progress. Implementations write to stderr (human or JSON).
pub trait RebuildProgressReporter: Send + Sync {
    fn report(&self, event: RebuildProgressEvent);
}

/// Human-friendly progress on stderr: "rebuild  reading  1,234 / 5,000 archives".
pub struct StderrProgress;

impl RebuildProgressReporter for StderrProgress {
    fn report(&self, event: RebuildProgressEvent) {
        let line = match &event {
            RebuildProgressEvent::Discovering { root } => {
                format!("rebuild {}  discovering...\n", root)
            }
            RebuildProgressEvent::Reading { n, total } => format!(
                "rebuild  reading  {} / {} archives\n",
                format_number(*n),
                format_number(*total)
            ),
            RebuildProgressEvent::Writing { entries } => {
                format!("rebuild  writing  {} entries\n", format_number(*entries))
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl RebuildProgressReporter for JsonProgress {
    fn report(&self, event: RebuildProgressEvent) {
        let obj = match &event {
            RebuildProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root
            }),
            RebuildProgressEvent::Reading { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "reading",
                "n": n,
                "total": total
            }),
            RebuildProgressEvent::Writing { entries } => serde_json::json!({
                "event": "progress",
                "phase": "writing",
                "entries": entries
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl RebuildProgressReporter for NoProgress {
    fn report(&self, _event: RebuildProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn RebuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
