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

//! Execution coordinator.
//!
//! A [`Coordinator`] compiles a program and runs it on a dedicated worker
//! thread. The program suspends itself at every step announcement by calling
//! back into the host ([`ProgramHost::wait`]); whether that call returns at
//! once or blocks is decided by the run's [`ControlRegister`] and the
//! breakpoint set. Everything else the worker has to say arrives, in order,
//! on the event channel returned by [`Coordinator::start`].

mod control;
pub use control::*;

mod runner;
pub use runner::*;

mod toolchain;
pub use toolchain::*;

#[cfg(feature = "wasmtime")]
mod wasm;
#[cfg(feature = "wasmtime")]
pub use wasm::WasmRunner;

mod worker;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use cppstep_common::{BreakpointSet, HostCommand, WorkerEvent};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, error, info};

use crate::EngineError;
use worker::{run_worker, WorkerContext};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Receiving end of a run's event stream.
pub type EventReceiver = UnboundedReceiver<WorkerEvent>;

/// Lifecycle of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum RunPhase {
    /// No run, or the last one was stopped.
    #[default]
    Idle,
    /// The toolchain is working.
    Compiling,
    /// The program is executing, or blocked at a step announcement.
    Running {
        /// Whether the program is waiting for the host.
        blocked: bool,
    },
    /// The program exited.
    Finished,
    /// Compilation failed, the program trapped, or it could not be started.
    Failed,
}

impl RunPhase {
    /// Whether the run ended on its own.
    pub fn is_over(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

struct ActiveRun {
    id: u64,
    control: Arc<ControlRegister>,
    phase: Arc<Mutex<RunPhase>>,
}

/// Drives program runs on behalf of the host.
pub struct Coordinator {
    toolchain: Arc<dyn Toolchain>,
    runner: Arc<dyn ProgramRunner>,
    flags: Vec<String>,
    breakpoints: Arc<RwLock<BreakpointSet>>,
    run: Option<ActiveRun>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("flags", &self.flags)
            .field("breakpoints", &*self.breakpoints.read())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a coordinator with no run.
    pub fn new(toolchain: impl Toolchain + 'static, runner: impl ProgramRunner + 'static) -> Self {
        Self {
            toolchain: Arc::new(toolchain),
            runner: Arc::new(runner),
            flags: Vec::new(),
            breakpoints: Arc::default(),
            run: None,
        }
    }

    /// Extra compiler flags for every run.
    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    /// Compiles and starts `source`, stopping any previous run first.
    ///
    /// The run begins paused, so the program blocks at its first step
    /// announcement. The returned receiver yields the run's events and
    /// closes once the worker is done.
    pub fn start(&mut self, source: impl Into<String>) -> Result<EventReceiver, EngineError> {
        self.stop();

        let id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        let control = Arc::new(ControlRegister::new());
        let phase = Arc::new(Mutex::new(RunPhase::Compiling));
        let (events, receiver) = unbounded_channel();

        let ctx = WorkerContext {
            run_id: id,
            source: source.into(),
            flags: self.flags.clone(),
            toolchain: self.toolchain.clone(),
            runner: self.runner.clone(),
            control: control.clone(),
            breakpoints: self.breakpoints.clone(),
            phase: phase.clone(),
            events,
        };
        std::thread::Builder::new()
            .name(format!("cppstep-worker-{id}"))
            .spawn(move || run_worker(ctx))
            .map_err(|e| {
                error!(error = %e, "failed to spawn worker thread");
                EngineError::EnvironmentUnsupported(format!("cannot spawn worker thread: {e}"))
            })?;

        info!(run = id, "run started");
        self.run = Some(ActiveRun { id, control, phase });
        Ok(receiver)
    }

    /// Lets the program advance by one step announcement.
    pub fn step(&self) {
        if let Some(run) = &self.run {
            run.control.step();
        }
    }

    /// Lets the program run to the next breakpoint.
    pub fn resume(&self) {
        if let Some(run) = &self.run {
            run.control.run();
        }
    }

    /// Makes the program stop at its next step announcement.
    pub fn pause(&self) {
        if let Some(run) = &self.run {
            run.control.pause();
        }
    }

    /// Replaces the breakpoint set, for this run and the following ones.
    pub fn update_breakpoints(&self, lines: impl IntoIterator<Item = u32>) {
        let set: BreakpointSet = lines.into_iter().collect();
        debug!(breakpoints = %set, "breakpoints updated");
        *self.breakpoints.write() = set;
    }

    /// Current breakpoints.
    pub fn breakpoints(&self) -> BreakpointSet {
        self.breakpoints.read().clone()
    }

    /// Abandons the current run, if any. Safe to call at any time.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            info!(run = run.id, "stopping run");
            run.control.terminate();
        }
    }

    /// Phase of the current run.
    pub fn phase(&self) -> RunPhase {
        self.run.as_ref().map(|run| *run.phase.lock()).unwrap_or_default()
    }

    /// Applies a protocol command. Returns the event stream of a newly
    /// started run.
    pub fn handle(&mut self, command: HostCommand) -> Result<Option<EventReceiver>, EngineError> {
        match command {
            HostCommand::Compile { code } => return self.start(code).map(Some),
            HostCommand::Step => self.step(),
            HostCommand::Run => self.resume(),
            HostCommand::Pause => self.pause(),
            HostCommand::UpdateBreakpoints { lines } => self.update_breakpoints(lines),
            HostCommand::Terminate => self.stop(),
        }
        Ok(None)
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cppstep_common::wire::WORKER_ERROR_PREFIX;
    use tokio::time::timeout;

    use super::*;

    enum Action {
        Print(&'static str),
        Wait(u32),
        Trap(&'static str),
    }

    struct Scripted(Vec<Action>);

    impl ProgramRunner for Scripted {
        fn run(&self, _module: &CompiledModule, mut host: Box<dyn ProgramHost>) -> Result<i32, RunError> {
            for action in &self.0 {
                match action {
                    Action::Print(text) => host.write_output(text),
                    Action::Wait(line) => host.wait(*line)?,
                    Action::Trap(reason) => return Err(RunError::Trap(reason.to_string())),
                }
            }
            Ok(0)
        }
    }

    struct Accept;

    impl Toolchain for Accept {
        fn compile(&self, _source: &str, _flags: &[String]) -> Result<CompiledModule, CompileError> {
            Ok(CompiledModule::new(b"\0asm".to_vec()))
        }
    }

    struct Reject;

    impl Toolchain for Reject {
        fn compile(&self, _source: &str, _flags: &[String]) -> Result<CompiledModule, CompileError> {
            Err(CompileError::Diagnostics("main.cpp:1:1: error: expected ';'".into()))
        }
    }

    async fn next(rx: &mut EventReceiver) -> Option<WorkerEvent> {
        timeout(Duration::from_secs(5), rx.recv()).await.expect("timed out")
    }

    #[tokio::test]
    async fn test_step_through_program() {
        let mut coordinator = Coordinator::new(
            Accept,
            Scripted(vec![Action::Wait(1), Action::Print("hi\n"), Action::Wait(2)]),
        );
        let mut rx = coordinator.start("int main() {}").unwrap();

        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Compiled));
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::DebugPaused { line: 1 }));
        assert_eq!(coordinator.phase(), RunPhase::Running { blocked: true });

        coordinator.step();
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::log("hi\n")));
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::DebugPaused { line: 2 }));

        coordinator.step();
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Finished));
        assert_eq!(next(&mut rx).await, None);
        assert_eq!(coordinator.phase(), RunPhase::Finished);
    }

    #[tokio::test]
    async fn test_run_stops_only_at_breakpoints() {
        let mut coordinator = Coordinator::new(
            Accept,
            Scripted(vec![Action::Wait(1), Action::Wait(5), Action::Wait(7), Action::Wait(9)]),
        );
        coordinator.update_breakpoints([7]);
        let mut rx = coordinator.start("").unwrap();
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Compiled));
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::DebugPaused { line: 1 }));

        coordinator.resume();
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::DebugPaused { line: 7 }));
        coordinator.resume();
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Finished));
    }

    #[tokio::test]
    async fn test_compile_failure_is_reported_as_output() {
        let mut coordinator = Coordinator::new(Reject, Scripted(vec![]));
        let mut rx = coordinator.start("int main( {}").unwrap();
        match next(&mut rx).await {
            Some(WorkerEvent::Log { text }) => {
                assert!(text.contains(WORKER_ERROR_PREFIX));
                assert!(text.contains("expected ';'"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Finished));
        assert_eq!(next(&mut rx).await, None);
        assert_eq!(coordinator.phase(), RunPhase::Failed);
    }

    #[tokio::test]
    async fn test_trap_is_reported_as_output() {
        let mut coordinator =
            Coordinator::new(Accept, Scripted(vec![Action::Print("before\n"), Action::Trap("unreachable")]));
        let mut rx = coordinator.start("").unwrap();
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Compiled));
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::log("before\n")));
        match next(&mut rx).await {
            Some(WorkerEvent::Log { text }) => assert!(text.contains("unreachable")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Finished));
    }

    #[tokio::test]
    async fn test_environment_without_blocking_wait() {
        let mut coordinator = Coordinator::new(Accept, NoRuntime);
        let mut rx = coordinator.start("").unwrap();
        match next(&mut rx).await {
            Some(WorkerEvent::Log { text }) => assert!(text.contains("environment unsupported")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Finished));
        assert_eq!(next(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_stop_while_blocked() {
        let mut coordinator = Coordinator::new(Accept, Scripted(vec![Action::Wait(1), Action::Print("never\n")]));
        let mut rx = coordinator.start("").unwrap();
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::Compiled));
        assert_eq!(next(&mut rx).await, Some(WorkerEvent::DebugPaused { line: 1 }));

        coordinator.stop();
        assert_eq!(coordinator.phase(), RunPhase::Idle);
        assert_eq!(next(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_new_run_tears_down_old_one() {
        let mut coordinator = Coordinator::new(Accept, Scripted(vec![Action::Wait(1)]));
        let mut first = coordinator.start("").unwrap();
        assert_eq!(next(&mut first).await, Some(WorkerEvent::Compiled));
        assert_eq!(next(&mut first).await, Some(WorkerEvent::DebugPaused { line: 1 }));

        let mut second = coordinator.start("").unwrap();
        assert_eq!(next(&mut first).await, None);
        assert_eq!(next(&mut second).await, Some(WorkerEvent::Compiled));
        assert_eq!(next(&mut second).await, Some(WorkerEvent::DebugPaused { line: 1 }));
    }

    #[tokio::test]
    async fn test_breakpoints_survive_runs_and_commands() {
        let mut coordinator = Coordinator::new(Accept, Scripted(vec![]));
        coordinator.handle(HostCommand::UpdateBreakpoints { lines: vec![3, 4] }).unwrap();
        let rx = coordinator.handle(HostCommand::Compile { code: String::new() }).unwrap();
        assert!(rx.is_some());
        coordinator.handle(HostCommand::Terminate).unwrap();
        assert_eq!(coordinator.breakpoints().lines(), vec![3, 4]);
    }
}
