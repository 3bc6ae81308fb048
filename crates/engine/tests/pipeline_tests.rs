use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use cppstep_common::format_address;
use cppstep_engine::{
    coordinator::{CompileError, CompiledModule, ProgramHost, ProgramRunner, RunError, Toolchain},
    graph,
    shim::session::ShimState,
    Coordinator, DebugSession, OutputDemux, SessionEvent,
};
use regex::Regex;
use tokio::time::timeout;
use tracing::info;

/// Hands the instrumented source through as the "module".
struct SourceAsModule;

impl Toolchain for SourceAsModule {
    fn compile(&self, source: &str, _flags: &[String]) -> Result<CompiledModule, CompileError> {
        Ok(CompiledModule::new(source.as_bytes().to_vec()))
    }
}

/// Walks the step announcements of a straight-line program in source order,
/// printing a shim dump before each one like `DEBUG_STEP` does.
struct StepWalker;

impl ProgramRunner for StepWalker {
    fn run(&self, module: &CompiledModule, mut host: Box<dyn ProgramHost>) -> Result<i32, RunError> {
        let source = String::from_utf8_lossy(&module.bytes);
        let steps = Regex::new(r"DEBUG_STEP\((\d+)\)").unwrap();

        let shim = ShimState::default();
        let _main = shim.enter_function("main");
        let current = Rc::new(RefCell::new(0u32));
        let _current = shim.trace("line", &current);

        for capture in steps.captures_iter(&source) {
            let line: u32 = capture[1].parse().unwrap();
            *current.borrow_mut() = line;
            host.write_output(&shim.dump());
            host.wait(line)?;
        }
        host.write_output("done\n");
        Ok(0)
    }
}

const PROGRAM: &str = "int main() {\n    int x = 5;\n    x++;\n    x *= 2;\n    return 0;\n}\n";

async fn until_stop(session: &mut DebugSession) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(5), session.next_event())
            .await
            .expect("timed out")
            .expect("event stream closed");
        let stop = matches!(event, SessionEvent::Paused { .. } | SessionEvent::Finished);
        events.push(event);
        if stop {
            return events;
        }
    }
}

fn snapshot_lines(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Snapshot(snapshot) => {
                Some(snapshot.graph.frame("main")?.variables[0].display_value.clone())
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_step_then_run_to_breakpoint() {
    cppstep_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = DebugSession::new(Coordinator::new(SourceAsModule, StepWalker));
    session.set_breakpoints([4]);
    session.start(PROGRAM).unwrap();

    // paused before anything runs, at the function entry
    let events = until_stop(&mut session).await;
    assert_eq!(events[0], SessionEvent::Compiled);
    assert_eq!(events.last(), Some(&SessionEvent::Paused { line: 1 }));

    session.step();
    let events = until_stop(&mut session).await;
    assert_eq!(events.last(), Some(&SessionEvent::Paused { line: 2 }));
    assert_eq!(snapshot_lines(&events), vec!["2"]);

    // running still stops at the breakpoint, with a snapshot per step on the way
    session.resume();
    let events = until_stop(&mut session).await;
    assert_eq!(events.last(), Some(&SessionEvent::Paused { line: 4 }));
    assert_eq!(snapshot_lines(&events), vec!["3", "4"]);
    assert_eq!(session.snapshot().unwrap().stack, vec!["main"]);

    session.resume();
    let events = until_stop(&mut session).await;
    assert_eq!(snapshot_lines(&events), vec!["5"]);
    assert!(events.contains(&SessionEvent::Output("done\n".into())));
    assert_eq!(events.last(), Some(&SessionEvent::Finished));
}

#[tokio::test]
async fn test_restart_discards_previous_run() {
    cppstep_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = DebugSession::new(Coordinator::new(SourceAsModule, StepWalker));
    session.start(PROGRAM).unwrap();
    let events = until_stop(&mut session).await;
    assert_eq!(events.last(), Some(&SessionEvent::Paused { line: 1 }));
    session.step();

    session.start(PROGRAM).unwrap();
    assert!(session.snapshot().is_none());
    let events = until_stop(&mut session).await;
    assert_eq!(events[0], SessionEvent::Compiled);
    assert_eq!(events.last(), Some(&SessionEvent::Paused { line: 1 }));
}

#[test]
fn test_node_with_null_next_round_trip() {
    cppstep_common::logging::ensure_test_logging(None);
    info!("Running test");

    let shim = ShimState::default();
    let _main = shim.enter_function("main");
    let node = shim.allocate(16);
    shim.update_heap_info(node, "Node", |_| "{\"val\": \"7\", \"next\": \"nullptr\"}".to_string());
    let head = Rc::new(Cell::new(node));
    let _head = shim.trace_pointer("head", "Node", &head);

    let mut demux = OutputDemux::new();
    let records = demux.feed(&shim.dump()).variables.unwrap();
    let graph = graph::build(&records);

    let object = graph.heap_object(&format_address(node)).unwrap();
    assert_eq!(object.value.keys(), vec!["val", "next"]);
    // the only edge is head -> node; the node itself points nowhere
    assert_eq!(graph.edges.len(), 1);
    assert!(graph.edges.iter().all(|edge| edge.target == format_address(node)));
}

#[test]
fn test_round_trip_preserves_frames_and_heap() {
    cppstep_common::logging::ensure_test_logging(None);
    info!("Running test");

    let shim = ShimState::default();
    let _main = shim.enter_function("main");
    let n = Rc::new(RefCell::new(3));
    let _n = shim.trace("n", &n);
    let _outer = shim.enter_function("fact");
    let _inner = shim.enter_function("fact");
    let m = Rc::new(RefCell::new(2));
    let _m = shim.trace("n", &m);
    let a = shim.allocate(4);
    let b = shim.allocate(4);
    shim.update_heap_info(a, "int", |_| "1".to_string());
    shim.update_heap_info(b, "int", |_| "2".to_string());

    let mut demux = OutputDemux::new();
    let dump = shim.dump();
    // one byte at a time
    let mut records = None;
    for (index, _) in dump.char_indices() {
        let out = demux.feed(&dump[index..index + 1]);
        if out.variables.is_some() {
            records = out.variables;
        }
    }
    let graph = graph::build(&records.unwrap());

    let labels: Vec<&str> = graph.frames.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["fact (2)", "main"]);
    let mut heap: Vec<String> = graph.heap.iter().map(|h| h.address.clone()).collect();
    heap.sort();
    let mut expected: Vec<String> = shim.heap().keys().map(|addr| format_address(*addr)).collect();
    expected.sort();
    assert_eq!(heap, expected);
}
