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

//! Host/worker protocol.
//!
//! The host drives a run with [`HostCommand`]s and observes it through the
//! ordered stream of [`WorkerEvent`]s. Both serialize as JSON objects tagged
//! by `type`, so they can cross a process or socket boundary unchanged.

use serde::{Deserialize, Serialize};

/// Command sent from the host to the execution coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostCommand {
    /// Compile and start a program, tearing down any previous run
    Compile {
        /// Instrumented source text
        code: String,
    },
    /// Let the program advance to the next step announcement
    Step,
    /// Let the program run until a breakpoint or the end
    Run,
    /// Stop at the next step announcement
    Pause,
    /// Replace the breakpoint set
    UpdateBreakpoints {
        /// 1-based source lines
        lines: Vec<u32>,
    },
    /// Abandon the current run unconditionally
    Terminate,
}

/// Event sent from the worker to the host, in production order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerEvent {
    /// A chunk of program output or a diagnostic
    Log {
        /// Raw text, not necessarily line aligned
        text: String,
    },
    /// The module compiled and is about to start
    Compiled,
    /// The program is blocked at a step announcement
    DebugPaused {
        /// 1-based source line of the announcement
        line: u32,
    },
    /// The run is over, successfully or not
    Finished,
}

impl WorkerEvent {
    /// Creates a log event
    pub fn log(text: impl Into<String>) -> Self {
        Self::Log { text: text.into() }
    }

    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_command_serialization() {
        let json = serde_json::to_string(&HostCommand::UpdateBreakpoints { lines: vec![7, 9] })
            .unwrap();
        assert!(json.contains("\"type\":\"update-breakpoints\""));
        assert!(json.contains("\"lines\":[7,9]"));

        let json = serde_json::to_string(&HostCommand::Step).unwrap();
        assert_eq!(json, r#"{"type":"step"}"#);
    }

    #[test]
    fn test_host_command_deserialization() {
        let json = r#"{"type":"compile","code":"int main() {}"}"#;
        let command: HostCommand = serde_json::from_str(json).unwrap();
        match command {
            HostCommand::Compile { code } => assert_eq!(code, "int main() {}"),
            _ => panic!("Expected Compile variant"),
        }
    }

    #[test]
    fn test_worker_event_serialization() {
        let json = serde_json::to_string(&WorkerEvent::DebugPaused { line: 3 }).unwrap();
        assert!(json.contains("\"type\":\"debug-paused\""));
        assert!(json.contains("\"line\":3"));

        let json = serde_json::to_string(&WorkerEvent::log("hi\n")).unwrap();
        assert!(json.contains("\"type\":\"log\""));
        assert!(WorkerEvent::Finished.is_terminal());
    }
}
