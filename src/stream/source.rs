use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::debug;

use super::error::StreamError;

/// Something that can yield protocol lines in order.
pub trait LineSource {
    /// Next line without its terminator, or `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<String>, StreamError>;
    /// Stops the underlying producer. Idempotent.
    fn terminate(&mut self) {}
}

/// In-memory source for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<String>,
}

impl ManualSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for ManualSource {
    fn next_line(&mut self) -> Result<Option<String>, StreamError> {
        Ok(self.queue.pop_front())
    }
}

/// Line stream read from a spawned acquisition process.
///
/// Reads hold at most one line of unframed data. `terminate` kills and reaps
/// the child; `Drop` does the same so the handle is released on every exit
/// path.
pub struct ProcessSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl ProcessSource {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, StreamError> {
        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| StreamError::Spawn {
                command: program.to_string(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or(StreamError::NoStdout)?;
        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }
}

impl LineSource for ProcessSource {
    fn next_line(&mut self) -> Result<Option<String>, StreamError> {
        self.line.clear();
        let n = self.stdout.read_line(&mut self.line)?;
        if n == 0 {
            return Ok(None);
        }
        if !self.line.ends_with('\n') {
            // Unterminated tail of a cancelled or crashed producer.
            debug!("discarding {} bytes of partial line at end of stream", n);
            return Ok(None);
        }
        Ok(Some(self.line.trim_end().to_string()))
    }

    fn terminate(&mut self) {
        if let Err(err) = self.child.kill() {
            debug!("kill acquisition process: {err}");
        }
        let _ = self.child.wait();
    }
}

impl Drop for ProcessSource {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_source_yields_in_order_then_none() {
        let mut source = ManualSource::new(["a", "b"]);
        assert_eq!(source.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(source.next_line().unwrap().as_deref(), Some("b"));
        assert!(source.next_line().unwrap().is_none());
    }
}
