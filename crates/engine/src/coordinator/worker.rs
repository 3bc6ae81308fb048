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

//! Body of the worker thread that owns one program run.

use std::sync::Arc;

use cppstep_common::{wire::WORKER_ERROR_PREFIX, BreakpointSet, WorkerEvent};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::{
    CompileError, ControlRegister, ControlState, ProgramHost, ProgramRunner, RunError, RunPhase,
    Toolchain,
};
use crate::EngineError;

/// Everything a worker thread needs. Moved into the thread.
pub(super) struct WorkerContext {
    pub run_id: u64,
    pub source: String,
    pub flags: Vec<String>,
    pub toolchain: Arc<dyn Toolchain>,
    pub runner: Arc<dyn ProgramRunner>,
    pub control: Arc<ControlRegister>,
    pub breakpoints: Arc<RwLock<BreakpointSet>>,
    pub phase: Arc<Mutex<RunPhase>>,
    pub events: UnboundedSender<WorkerEvent>,
}

impl WorkerContext {
    fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            debug!(run = self.run_id, "host went away");
        }
    }

    fn fail(&self, error: EngineError) {
        warn!(run = self.run_id, %error, "run failed");
        *self.phase.lock() = RunPhase::Failed;
        self.emit(WorkerEvent::log(format!("\n{WORKER_ERROR_PREFIX} {error}\n")));
        self.emit(WorkerEvent::Finished);
    }
}

/// Compiles and runs one program, reporting through the event channel.
pub(super) fn run_worker(ctx: WorkerContext) {
    if !ctx.runner.supports_blocking_wait() {
        ctx.fail(EngineError::EnvironmentUnsupported(
            "the program runner cannot suspend execution at a step".into(),
        ));
        return;
    }

    *ctx.phase.lock() = RunPhase::Compiling;
    let module = match ctx.toolchain.compile(&ctx.source, &ctx.flags) {
        Ok(module) => module,
        Err(CompileError::Diagnostics(text)) => {
            ctx.fail(EngineError::CompileFailure(text));
            return;
        }
        Err(other) => {
            ctx.fail(EngineError::CompileFailure(other.to_string()));
            return;
        }
    };
    if ctx.control.is_terminated() {
        return;
    }

    info!(run = ctx.run_id, "module compiled, starting");
    *ctx.phase.lock() = RunPhase::Running { blocked: false };
    ctx.emit(WorkerEvent::Compiled);

    let host = WorkerHost {
        control: ctx.control.clone(),
        breakpoints: ctx.breakpoints.clone(),
        phase: ctx.phase.clone(),
        events: ctx.events.clone(),
    };
    match ctx.runner.run(&module, Box::new(host)) {
        Ok(code) => {
            info!(run = ctx.run_id, code, "program exited");
            *ctx.phase.lock() = RunPhase::Finished;
            ctx.emit(WorkerEvent::Finished);
        }
        Err(RunError::Terminated) => debug!(run = ctx.run_id, "run terminated"),
        Err(RunError::Unsupported(reason)) => {
            ctx.fail(EngineError::EnvironmentUnsupported(reason))
        }
        Err(RunError::Trap(reason)) => ctx.fail(EngineError::RuntimeTrap(reason)),
    }
}

/// The [`ProgramHost`] handed to the runner.
pub(super) struct WorkerHost {
    pub control: Arc<ControlRegister>,
    pub breakpoints: Arc<RwLock<BreakpointSet>>,
    pub phase: Arc<Mutex<RunPhase>>,
    pub events: UnboundedSender<WorkerEvent>,
}

impl ProgramHost for WorkerHost {
    fn write_output(&mut self, text: &str) {
        if !text.is_empty() && !self.control.is_terminated() {
            let _ = self.events.send(WorkerEvent::log(text));
        }
    }

    fn wait(&mut self, line: u32) -> Result<(), RunError> {
        if self.control.is_terminated() {
            return Err(RunError::Terminated);
        }
        // a command written between the read and the pause is re-read
        loop {
            let observed = self.control.load();
            match observed {
                ControlState::Running if !self.breakpoints.read().hits(line) => return Ok(()),
                ControlState::Step if self.control.consume_step() => return Ok(()),
                ControlState::Step => continue,
                _ => {}
            }
            if self.control.pause_from(observed) {
                break;
            }
        }

        *self.phase.lock() = RunPhase::Running { blocked: true };
        let _ = self.events.send(WorkerEvent::DebugPaused { line });

        if !self.control.block_while_paused() {
            return Err(RunError::Terminated);
        }
        self.control.consume_step();
        *self.phase.lock() = RunPhase::Running { blocked: false };
        Ok(())
    }
}
