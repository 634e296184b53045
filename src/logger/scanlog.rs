//! Dual-sink scan output: human progress on an output stream, fixed
//! machine-readable lines on an optional log stream.
//!
//! Machine lines are `scan:<verb>:<disk>:<sub>[:<sub2>]` during the walk
//! and `summary:<key>:<value>` / `summary:exit:{equal,diff}` at the end,
//! flushed per line so a tailing consumer never sees partial records.
//! Stream write failures never abort a scan.

use std::io::{self, Write};

/// Sink set and verbosity flags for one scan run.
pub struct ScanLog {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    gui_stream: Option<Box<dyn Write>>,
    output: bool,
    verbose: bool,
    gui: bool,
}

impl ScanLog {
    /// Log to stdout/stderr with no machine stream.
    #[must_use]
    pub fn new(output: bool, verbose: bool) -> Self {
        Self::with_streams(
            Box::new(io::stdout()),
            Box::new(io::stderr()),
            None,
            output,
            verbose,
            false,
        )
    }

    /// Full constructor with caller-supplied sinks.
    #[must_use]
    pub fn with_streams(
        out: Box<dyn Write>,
        err: Box<dyn Write>,
        gui_stream: Option<Box<dyn Write>>,
        output: bool,
        verbose: bool,
        gui: bool,
    ) -> Self {
        Self {
            out,
            err,
            gui_stream,
            output,
            verbose,
            gui,
        }
    }

    #[must_use]
    pub fn output(&self) -> bool {
        self.output
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Unconditional progress line.
    pub fn progress(&mut self, msg: &str) {
        let _ = writeln!(self.out, "{msg}");
    }

    /// Per-change human line, shown only when change output is enabled.
    pub fn print(&mut self, msg: &str) {
        if self.output {
            let _ = writeln!(self.out, "{msg}");
        }
    }

    /// Exclusion note, shown only in verbose mode.
    pub fn verbose_note(&mut self, msg: &str) {
        if self.verbose {
            let _ = writeln!(self.out, "{msg}");
        }
    }

    /// Warning on the error stream.
    pub fn warning(&mut self, msg: &str) {
        let _ = writeln!(self.err, "{msg}");
    }

    /// Machine line `scan:<verb>:<disk>:<sub>`.
    pub fn event(&mut self, verb: &str, disk: &str, sub: &str) {
        if self.gui {
            if let Some(stream) = self.gui_stream.as_mut() {
                let _ = writeln!(stream, "scan:{verb}:{disk}:{sub}");
                let _ = stream.flush();
            }
        }
    }

    /// Machine line `scan:<verb>:<disk>:<sub>:<sub2>` (moves).
    pub fn event2(&mut self, verb: &str, disk: &str, sub: &str, sub2: &str) {
        if self.gui {
            if let Some(stream) = self.gui_stream.as_mut() {
                let _ = writeln!(stream, "scan:{verb}:{disk}:{sub}:{sub2}");
                let _ = stream.flush();
            }
        }
    }

    /// Machine line `summary:<key>:<value>`.
    pub fn summary_value(&mut self, key: &str, value: u32) {
        if self.gui {
            if let Some(stream) = self.gui_stream.as_mut() {
                let _ = writeln!(stream, "summary:{key}:{value}");
                let _ = stream.flush();
            }
        }
    }

    /// Machine line `summary:exit:{equal,diff}`.
    pub fn summary_exit(&mut self, equal: bool) {
        if self.gui {
            if let Some(stream) = self.gui_stream.as_mut() {
                let verdict = if equal { "equal" } else { "diff" };
                let _ = writeln!(stream, "summary:exit:{verdict}");
                let _ = stream.flush();
            }
        }
    }
}
