//! Output sink: stdout, or a truncated file given via `-f`.

use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;
use std::sync::Mutex;

pub enum Sink {
    Stdout(Stdout),
    File(BufWriter<File>),
}

impl Sink {
    pub fn stdout() -> Self {
        Self::Stdout(io::stdout())
    }

    pub fn open_file(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::File(BufWriter::new(file)))
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            Self::Stdout(out) => {
                out.write_all(line.as_bytes())?;
                out.flush()
            }
            Self::File(out) => {
                out.write_all(line.as_bytes())?;
                out.flush()
            }
        }
    }
}

/// Shared handle every worker writes CSV lines through; one `write()` per
/// flushed integration so lines are never interleaved mid-record.
pub struct SharedSink(Mutex<Sink>);

impl SharedSink {
    pub fn new(sink: Sink) -> Self {
        Self(Mutex::new(sink))
    }

    pub fn write_line(&self, line: &str) -> io::Result<()> {
        self.0.lock().expect("sink mutex poisoned").write_line(line)
    }
}
