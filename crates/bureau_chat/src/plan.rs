//! Plan-block detection inside a freeform text stream.
//!
//! Agents are prompted to open multi-step answers with a block of the form
//!
//! ```text
//! <plan>
//! Short task name
//! First step label
//! Second step label
//! </plan>
//! ```
//!
//! The detector classifies a growing buffer exactly once per message:
//! either the buffer turns out to be a plan (title + step labels, remainder
//! passed through), or it is ordinary text and is flushed verbatim. There is
//! no escaping mechanism; detection is literal prefix/suffix matching, not a
//! grammar. After either verdict the detector becomes a pure pass-through.

use crate::config::ChatConfig;

/// Literal marker opening a plan block
pub const PLAN_OPEN: &str = "<plan>";
/// Literal marker closing a plan block
pub const PLAN_CLOSE: &str = "</plan>";

/// A successfully parsed plan block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanBlock {
    /// First non-blank line inside the markers
    pub title: String,
    /// Remaining non-blank lines, one label per step
    pub steps: Vec<String>,
    /// Text that followed the close marker, if any
    pub remainder: Option<String>,
}

/// Outcome of feeding one chunk to the detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanScan {
    /// Still undecided; nothing to emit downstream yet
    Pending,
    /// Not a plan (or already resolved); emit this text downstream
    Text(String),
    /// A plan block was detected
    Plan(PlanBlock),
}

/// One-shot plan classifier for a single streaming message.
#[derive(Debug)]
pub struct PlanDetector {
    buffer: String,
    resolved: bool,
    open_latency: usize,
    buffer_cap: usize,
}

impl PlanDetector {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            buffer: String::new(),
            resolved: false,
            open_latency: config.plan_open_latency,
            buffer_cap: config.plan_buffer_cap,
        }
    }

    /// Whether a verdict has been reached
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Feed the next text chunk and get the detector's verdict so far
    pub fn push(&mut self, chunk: &str) -> PlanScan {
        if self.resolved {
            return PlanScan::Text(chunk.to_string());
        }

        self.buffer.push_str(chunk);

        let head = self.buffer.len().min(PLAN_OPEN.len());
        let prefix_matches = self.buffer.as_bytes()[..head] == PLAN_OPEN.as_bytes()[..head];

        if !prefix_matches {
            // Give a few characters of header latency before rejecting, in
            // case a marker straddles tiny chunks.
            if self.buffer.len() >= self.open_latency {
                return self.reject();
            }
            return PlanScan::Pending;
        }

        if let Some(close) = self.buffer.find(PLAN_CLOSE) {
            return self.accept(close);
        }

        if self.buffer.len() > self.buffer_cap {
            return self.reject();
        }

        PlanScan::Pending
    }

    /// Flush whatever is still buffered when the stream ends undecided.
    /// Returns `None` when nothing is pending.
    pub fn finish(&mut self) -> Option<String> {
        if self.resolved || self.buffer.is_empty() {
            self.resolved = true;
            return None;
        }
        self.resolved = true;
        Some(std::mem::take(&mut self.buffer))
    }

    fn reject(&mut self) -> PlanScan {
        self.resolved = true;
        PlanScan::Text(std::mem::take(&mut self.buffer))
    }

    fn accept(&mut self, close: usize) -> PlanScan {
        let inner = &self.buffer[PLAN_OPEN.len()..close];
        let mut lines = inner
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        // A plan needs a title and at least one step
        if lines.len() < 2 {
            return self.reject();
        }

        let title = lines.remove(0);
        let rest = self.buffer[close + PLAN_CLOSE.len()..]
            .trim_start_matches(['\r', '\n'])
            .to_string();
        let remainder = (!rest.is_empty()).then_some(rest);

        self.resolved = true;
        self.buffer.clear();

        PlanScan::Plan(PlanBlock {
            title,
            steps: lines,
            remainder,
        })
    }
}
