//! Output sinks: the shared terminal and the append-only log files.

use super::format::LineFormatter;
use super::{LogLine, MANAGER};
use console::Term;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Name of the file every line lands in, regardless of service.
pub const COMBINED_LOG: &str = "combined.log";

enum Target {
    Stdout(Term),
    Capture(Vec<String>),
}

/// The terminal, shared by the router and the shell.
///
/// Writes are serialized so that the rows of one message are never split by
/// another writer.
pub struct Console {
    target: Mutex<Target>,
    interactive: bool,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

impl Console {
    pub fn stdout() -> Self {
        let term = Term::stdout();
        Self {
            interactive: term.is_term(),
            target: Mutex::new(Target::Stdout(term)),
        }
    }

    /// In-memory console for tests and headless runs.
    pub fn capture() -> Self {
        Self {
            interactive: false,
            target: Mutex::new(Target::Capture(Vec::new())),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn write_line(&self, line: &str) {
        self.write_lines(std::slice::from_ref(&line.to_string()));
    }

    pub fn write_lines(&self, lines: &[String]) {
        let mut target = self.target.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *target {
            Target::Stdout(term) => {
                if self.interactive {
                    // The prompt line may hold a half-typed command.
                    let _ = term.clear_line();
                }
                for line in lines {
                    if term.write_line(line).is_err() {
                        break;
                    }
                }
            }
            Target::Capture(buf) => buf.extend(lines.iter().cloned()),
        }
    }

    /// Lines written so far, ANSI stripped. Empty for a real terminal.
    pub fn captured(&self) -> Vec<String> {
        let target = self.target.lock().unwrap_or_else(|e| e.into_inner());
        match &*target {
            Target::Stdout(_) => Vec::new(),
            Target::Capture(buf) => buf
                .iter()
                .map(|l| console::strip_ansi_codes(l).into_owned())
                .collect(),
        }
    }
}

/// Per-service files plus `combined.log`, opened lazily in append mode.
#[derive(Debug)]
pub struct FileSinks {
    service_paths: HashMap<String, PathBuf>,
    combined_path: PathBuf,
    open: HashMap<PathBuf, File>,
    failed: HashSet<PathBuf>,
}

impl FileSinks {
    pub fn new(log_dir: &Path, service_paths: HashMap<String, PathBuf>) -> Self {
        Self {
            service_paths,
            combined_path: log_dir.join(COMBINED_LOG),
            open: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    pub fn combined_path(&self) -> &Path {
        &self.combined_path
    }

    /// Append a line to its service file (if any) and to `combined.log`.
    pub fn write(&mut self, line: &LogLine) {
        if line.service != MANAGER
            && let Some(path) = self.service_paths.get(&line.service).cloned()
        {
            let text = LineFormatter::format_file(line, false);
            self.append(&path, &text);
        }
        let combined = self.combined_path.clone();
        let text = LineFormatter::format_file(line, true);
        self.append(&combined, &text);
    }

    fn append(&mut self, path: &Path, text: &str) {
        if self.failed.contains(path) {
            return;
        }
        if !self.open.contains_key(path) {
            match open_append(path) {
                Ok(file) => {
                    self.open.insert(path.to_path_buf(), file);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot open log file");
                    self.failed.insert(path.to_path_buf());
                    return;
                }
            }
        }
        if let Some(file) = self.open.get_mut(path)
            && let Err(e) = writeln!(file, "{}", text)
        {
            tracing::warn!(path = %path.display(), error = %e, "log write failed");
            self.open.remove(path);
            self.failed.insert(path.to_path_buf());
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::StreamKind;
    use tempfile::tempdir;

    #[test]
    fn test_capture_console_records_lines() {
        let console = Console::capture();
        console.write_line("one");
        console.write_lines(&["two".to_string(), "\u{1b}[31mthree\u{1b}[0m".to_string()]);
        assert_eq!(console.captured(), vec!["one", "two", "three"]);
        assert!(!console.is_interactive());
    }

    #[test]
    fn test_files_created_on_first_write_and_appended() {
        let dir = tempdir().unwrap();
        let api_log = dir.path().join("logs/api.log");
        let paths = HashMap::from([("api".to_string(), api_log.clone())]);
        let mut sinks = FileSinks::new(&dir.path().join("logs"), paths);

        assert!(!api_log.exists());
        sinks.write(&LogLine::new("api", StreamKind::Stdout, "first"));
        sinks.write(&LogLine::new("api", StreamKind::Stderr, "second"));
        sinks.write(&LogLine::new(MANAGER, StreamKind::Status, "hello"));

        let api = std::fs::read_to_string(&api_log).unwrap();
        assert_eq!(api.lines().count(), 2);
        assert!(api.contains("[out] first"));
        assert!(api.contains("[err] second"));
        assert!(!api.contains("hello"));

        let combined = std::fs::read_to_string(sinks.combined_path()).unwrap();
        assert_eq!(combined.lines().count(), 3);
        assert!(combined.contains("manager [status] hello"));
    }

    #[test]
    fn test_existing_file_is_not_truncated() {
        let dir = tempdir().unwrap();
        let api_log = dir.path().join("api.log");
        std::fs::write(&api_log, "previous run\n").unwrap();

        let paths = HashMap::from([("api".to_string(), api_log.clone())]);
        let mut sinks = FileSinks::new(dir.path(), paths);
        sinks.write(&LogLine::new("api", StreamKind::Stdout, "new run"));

        let api = std::fs::read_to_string(&api_log).unwrap();
        assert!(api.starts_with("previous run\n"));
        assert!(api.contains("new run"));
    }
}
