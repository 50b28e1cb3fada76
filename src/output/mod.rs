pub mod binary_dump;
pub mod hex_dump;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use anyhow::Context;
#[cfg(test)] use mockall::automock;
use tracing::warn;

/// The primary user-facing output of both tools. Implementations are responsible for fanning
///  out to secondary sinks, callers just report one line at a time.
#[cfg_attr(test, automock)]
pub trait Reporter: Send + Sync {
    fn report(&self, line: &str);

    /// progress marker without line break, e.g. one '.' per burst in quiet mode
    fn progress(&self, mark: &str);
}

/// Reports to stdout, and optionally mirrors every line to a file
pub struct ConsoleReporter {
    mirror: Option<Mutex<BufWriter<File>>>,
}

impl ConsoleReporter {
    pub fn new() -> ConsoleReporter {
        ConsoleReporter { mirror: None }
    }

    pub fn with_mirror(path: &Path) -> anyhow::Result<ConsoleReporter> {
        let file = File::create(path)
            .with_context(|| format!("open output file {:?}", path))?;
        Ok(ConsoleReporter {
            mirror: Some(Mutex::new(BufWriter::new(file))),
        })
    }

    fn write_mirror(&self, s: &str, line_break: bool) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        let mut mirror = match mirror.lock() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = if line_break {
            writeln!(mirror, "{}", s)
        }
        else {
            write!(mirror, "{}", s)
        };
        if let Err(e) = result.and_then(|_| mirror.flush()) {
            warn!("error writing to output file: {}", e);
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        ConsoleReporter::new()
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();

        self.write_mirror(line, true);
    }

    fn progress(&self, mark: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}", mark);
        let _ = stdout.flush();

        self.write_mirror(mark, false);
    }
}
