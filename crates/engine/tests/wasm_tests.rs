//! End-to-end runs through a real compiler and wasmtime.
//!
//! These need `clang++` with a `wasm32-wasi` sysroot. When the toolchain is
//! missing the tests log why and return early.

#![cfg(feature = "wasmtime")]

use std::time::Duration;

use cppstep_engine::{
    coordinator::{CommandToolchain, Toolchain, WasmRunner},
    instrument, Coordinator, DebugSession, EngineConfig, SessionEvent,
};
use tokio::time::timeout;
use tracing::{info, warn};

const RECURSION: &str = include_str!("../../../demos/recursion.cpp");

fn toolchain_available() -> bool {
    let toolchain = CommandToolchain::from_config(&EngineConfig::default());
    match toolchain.compile("int main() { return 0; }", &[]) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "skipping, no usable wasm toolchain");
            false
        }
    }
}

async fn drain(session: &mut DebugSession) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Some(event) = timeout(Duration::from_secs(60), session.next_event()).await.unwrap() {
        if let SessionEvent::Paused { .. } = event {
            session.resume();
        }
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_recursion_demo_runs_to_completion() {
    cppstep_common::logging::ensure_test_logging(None);
    info!("Running test");
    if !toolchain_available() {
        return;
    }

    let coordinator =
        Coordinator::new(CommandToolchain::from_config(&EngineConfig::default()), WasmRunner::new());
    let mut session = DebugSession::new(coordinator);
    session.start(RECURSION).unwrap();
    let events = drain(&mut session).await;

    let output: String = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Output(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(output.contains("4! = 24"), "{output}");
    assert_eq!(session.tests().len(), 2);
    assert!(session.tests().iter().all(|t| t.passed()));
    assert_eq!(events.last(), Some(&SessionEvent::Finished));
}

#[tokio::test]
async fn test_breakpoint_inside_recursion() {
    cppstep_common::logging::ensure_test_logging(None);
    info!("Running test");
    if !toolchain_available() {
        return;
    }

    // `return 1;` in the base case
    let base_case = 8;
    assert!(instrument(RECURSION).unwrap().breakable_lines.contains(&base_case));

    let coordinator =
        Coordinator::new(CommandToolchain::from_config(&EngineConfig::default()), WasmRunner::new());
    let mut session = DebugSession::new(coordinator);
    session.set_breakpoints([base_case]);
    session.start(RECURSION).unwrap();

    loop {
        let event = timeout(Duration::from_secs(60), session.next_event()).await.unwrap().unwrap();
        match event {
            SessionEvent::Paused { line } if line == base_case => break,
            SessionEvent::Paused { .. } => session.resume(),
            SessionEvent::Finished => panic!("never reached the base case"),
            _ => {}
        }
    }

    let stack = &session.snapshot().unwrap().stack;
    assert_eq!(stack.first().map(String::as_str), Some("main"));
    assert_eq!(stack.last().map(String::as_str), Some("fact (4)"));
    session.stop();
}

#[tokio::test]
async fn test_priority_queue_dequeues_lowest_first() {
    cppstep_common::logging::ensure_test_logging(None);
    info!("Running test");
    if !toolchain_available() {
        return;
    }

    let program = r#"#include <iostream>
using namespace std;

int main() {
    PriorityQueue<string> pq;
    pq.enqueue("low", 3);
    pq.enqueue("first", 1);
    pq.enqueue("second", 1);
    cout << pq << endl;
    while (!pq.isEmpty()) {
        cout << pq.dequeue() << " ";
    }
    cout << endl;
    return 0;
}
"#;
    let coordinator =
        Coordinator::new(CommandToolchain::from_config(&EngineConfig::default()), WasmRunner::new());
    let mut session = DebugSession::new(coordinator);
    session.start(program).unwrap();
    let events = drain(&mut session).await;

    let output: String = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Output(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert!(output.contains("{1:first, 1:second, 3:low}"), "{output}");
    assert!(output.contains("first second low "), "{output}");
}
