use std::sync::Mutex;
use crate::output::Reporter;

/// Collects reported lines and progress marks in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
    progress: Mutex<String>,
}

impl RecordingReporter {
    pub fn new() -> RecordingReporter {
        Default::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn progress_marks(&self) -> String {
        match self.progress.lock() {
            Ok(progress) => progress.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn has_line(&self, line: &str) -> bool {
        self.lines().iter().any(|l| l == line)
    }

    pub fn has_line_starting_with(&self, prefix: &str) -> bool {
        self.lines().iter().any(|l| l.starts_with(prefix))
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }

    fn progress(&self, mark: &str) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.push_str(mark);
        }
    }
}
