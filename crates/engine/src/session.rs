// CppStep - C++ Step Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Host-side debug session.
//!
//! [`DebugSession`] instruments the program, hands it to the
//! [`Coordinator`], and turns the raw worker events into [`SessionEvent`]s:
//! program output with the debug blocks removed, object graph snapshots,
//! pauses and test results.

use std::collections::{BTreeSet, VecDeque};

use cppstep_common::{BreakpointSet, ObjectGraph, TestOutcome, VariableRecord, WorkerEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    coordinator::{Coordinator, EventReceiver, RunPhase},
    demux::{DemuxOutput, OutputDemux},
    graph,
    instrumentation::{instrument, InstrumentedSource},
    EngineError,
};

/// Program state at one pause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSnapshot {
    /// Variables, heap objects and pointers.
    pub graph: ObjectGraph,
    /// Call stack as dumped, outermost frame first.
    pub stack: Vec<String>,
}

/// What the host observes while a program runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// The program compiled and is starting.
    Compiled,
    /// Program output, debug blocks removed.
    Output(String),
    /// A fresh state dump.
    Snapshot(DebugSnapshot),
    /// The program is blocked at `line`.
    Paused {
        /// 1-based source line.
        line: u32,
    },
    /// An `EXPECT_EQUAL` check ran.
    Test(TestOutcome),
    /// The run is over.
    Finished,
}

/// Drives one program at a time.
#[derive(Debug)]
pub struct DebugSession {
    coordinator: Coordinator,
    events: Option<EventReceiver>,
    demux: OutputDemux,
    queue: VecDeque<SessionEvent>,
    instrumented: Option<InstrumentedSource>,
    /// Variables of a dump whose stack block has not arrived yet.
    pending_records: Option<Vec<VariableRecord>>,
    snapshot: Option<DebugSnapshot>,
    current_line: Option<u32>,
    tests: Vec<TestOutcome>,
}

impl DebugSession {
    /// Creates a session on top of a coordinator.
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            events: None,
            demux: OutputDemux::new(),
            queue: VecDeque::new(),
            instrumented: None,
            pending_records: None,
            snapshot: None,
            current_line: None,
            tests: Vec::new(),
        }
    }

    /// Instruments and starts `source`, replacing any current run.
    ///
    /// If the source cannot be instrumented it runs as written, without
    /// step announcements.
    pub fn start(&mut self, source: &str) -> Result<(), EngineError> {
        self.reset();
        let program = match instrument(source) {
            Ok(instrumented) => {
                let program = instrumented.source.clone();
                self.instrumented = Some(instrumented);
                program
            }
            Err(error) => {
                warn!(%error, "instrumentation failed, running the source as written");
                source.to_string()
            }
        };
        self.events = Some(self.coordinator.start(program)?);
        Ok(())
    }

    /// Waits for the next event. Returns `None` once the run's event stream
    /// is exhausted, or immediately when there is no run.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            let received = self.events.as_mut()?.recv().await;
            match received {
                Some(event) => self.absorb(event),
                None => {
                    self.events = None;
                    let tail = self.demux.flush();
                    self.absorb_output(tail);
                }
            }
        }
    }

    /// Lets the program advance by one step.
    pub fn step(&self) {
        self.coordinator.step();
    }

    /// Lets the program run to the next breakpoint.
    pub fn resume(&self) {
        self.coordinator.resume();
    }

    /// Stops the program at its next step.
    pub fn pause(&self) {
        self.coordinator.pause();
    }

    /// Abandons the run.
    pub fn stop(&mut self) {
        self.coordinator.stop();
        self.events = None;
        self.current_line = None;
    }

    /// Replaces the breakpoints.
    pub fn set_breakpoints(&self, lines: impl IntoIterator<Item = u32>) {
        self.coordinator.update_breakpoints(lines);
    }

    /// Toggles one breakpoint, returning whether it is now set.
    pub fn toggle_breakpoint(&self, line: u32) -> bool {
        let mut set = self.coordinator.breakpoints();
        let enabled = set.toggle(line);
        self.coordinator.update_breakpoints(set.iter().copied());
        enabled
    }

    /// Current breakpoints.
    pub fn breakpoints(&self) -> BreakpointSet {
        self.coordinator.breakpoints()
    }

    /// Lines a breakpoint can actually stop at, if the program was
    /// instrumented.
    pub fn breakable_lines(&self) -> Option<&BTreeSet<u32>> {
        self.instrumented.as_ref().map(|i| &i.breakable_lines)
    }

    /// The instrumented program of the current run.
    pub fn instrumented(&self) -> Option<&InstrumentedSource> {
        self.instrumented.as_ref()
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Option<&DebugSnapshot> {
        self.snapshot.as_ref()
    }

    /// Line the program is blocked at.
    pub fn current_line(&self) -> Option<u32> {
        self.current_line
    }

    /// Test results of the current run so far.
    pub fn tests(&self) -> &[TestOutcome] {
        &self.tests
    }

    /// Phase of the current run.
    pub fn phase(&self) -> RunPhase {
        self.coordinator.phase()
    }

    fn reset(&mut self) {
        self.coordinator.stop();
        self.events = None;
        self.demux.reset();
        self.queue.clear();
        self.instrumented = None;
        self.pending_records = None;
        self.snapshot = None;
        self.current_line = None;
        self.tests.clear();
    }

    fn absorb(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Log { text } => {
                let out = self.demux.feed(&text);
                self.absorb_output(out);
            }
            WorkerEvent::Compiled => self.queue.push_back(SessionEvent::Compiled),
            WorkerEvent::DebugPaused { line } => {
                self.current_line = Some(line);
                self.queue.push_back(SessionEvent::Paused { line });
            }
            WorkerEvent::Finished => {
                let tail = self.demux.flush();
                self.absorb_output(tail);
                self.current_line = None;
                self.queue.push_back(SessionEvent::Finished);
            }
        }
    }

    fn absorb_output(&mut self, out: DemuxOutput) {
        if !out.output.is_empty() {
            self.queue.push_back(SessionEvent::Output(out.output));
        }
        for outcome in out.tests {
            self.tests.push(outcome.clone());
            self.queue.push_back(SessionEvent::Test(outcome));
        }
        if let Some(records) = out.variables {
            self.pending_records = Some(records);
        }
        if let Some(stack) = out.stack {
            let records = self.pending_records.take().unwrap_or_default();
            let snapshot = DebugSnapshot { graph: graph::build(&records), stack };
            debug!(frames = snapshot.graph.frames.len(), "new snapshot");
            self.snapshot = Some(snapshot.clone());
            self.queue.push_back(SessionEvent::Snapshot(snapshot));
        }
    }
}

/// Everything recovered from a captured output log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Program output with the debug blocks removed.
    pub output: String,
    /// State at the last complete dump.
    pub snapshot: Option<DebugSnapshot>,
    /// Every test result in the log.
    pub tests: Vec<TestOutcome>,
    /// Number of complete dumps.
    pub dumps: usize,
}

/// Demultiplexes a whole output log offline.
pub fn replay(log: &str) -> Replay {
    let mut demux = OutputDemux::new();
    let mut replay = Replay::default();
    let mut records = None;
    let mut absorb = |out: DemuxOutput, replay: &mut Replay| {
        replay.output.push_str(&out.output);
        replay.tests.extend(out.tests);
        if out.variables.is_some() {
            records = out.variables;
        }
        if let Some(stack) = out.stack {
            let graph = graph::build(&records.take().unwrap_or_default());
            replay.snapshot = Some(DebugSnapshot { graph, stack });
            replay.dumps += 1;
        }
    };
    // line by line, so that every dump in the log is seen
    for line in log.split_inclusive('\n') {
        absorb(demux.feed(line), &mut replay);
    }
    absorb(demux.flush(), &mut replay);
    replay
}
