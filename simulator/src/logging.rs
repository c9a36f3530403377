use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::writer::MakeWriter;

/// Tee writer: everything goes to stdout, and to the log file when one was requested.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>) -> io::Result<Self> {
        let file = match path {
            Some(path) => Some(Arc::new(Mutex::new(File::create(path)?))),
            None => None,
        };
        Ok(Self { file })
    }
}

pub(crate) struct LogWriterGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            file: self.file.clone(),
        }
    }
}

impl LogWriterGuard {
    fn with_file(&self, f: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<()> {
        match &self.file {
            Some(file) => {
                let mut handle = file
                    .lock()
                    .map_err(|_| io::Error::other("log file lock poisoned"))?;
                f(&mut handle)
            }
            None => Ok(()),
        }
    }
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.with_file(|file| file.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.with_file(File::flush)
    }
}

/// Keeps the first and the most recent step messages so a failure can be replayed by eye.
pub(crate) struct EventLog {
    first: Vec<String>,
    tail: VecDeque<String>,
    first_cap: usize,
    tail_cap: usize,
    skipped: u64,
}

impl EventLog {
    pub(crate) fn new(first_cap: usize, tail_cap: usize) -> Self {
        Self {
            first: Vec::with_capacity(first_cap),
            tail: VecDeque::with_capacity(tail_cap),
            first_cap,
            tail_cap,
            skipped: 0,
        }
    }

    pub(crate) fn record(&mut self, message: String) {
        if self.first.len() < self.first_cap {
            self.first.push(message);
            return;
        }
        if self.tail_cap == 0 {
            self.skipped += 1;
            return;
        }
        if self.tail.len() == self.tail_cap {
            self.tail.pop_front();
            self.skipped += 1;
        }
        self.tail.push_back(message);
    }

    pub(crate) fn dump_failure(&self, reason: &str) {
        tracing::error!("invariant violated: {reason}");
        for line in &self.first {
            tracing::error!("  {line}");
        }
        if self.skipped > 0 {
            tracing::error!("  ... {} steps omitted ...", self.skipped);
        }
        for line in &self.tail {
            tracing::error!("  {line}");
        }
    }

    #[cfg(test)]
    fn lines(&self) -> Vec<&str> {
        self.first
            .iter()
            .chain(self.tail.iter())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_head_and_tail() {
        let mut log = EventLog::new(2, 2);
        for i in 0..6 {
            log.record(format!("step {i}"));
        }
        assert_eq!(log.lines(), vec!["step 0", "step 1", "step 4", "step 5"]);
        assert_eq!(log.skipped, 2);
    }
}
