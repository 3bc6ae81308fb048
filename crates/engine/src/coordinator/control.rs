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

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

/// Value held by the [`ControlRegister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ControlState {
    /// Block at the next step announcement.
    Paused = 0,
    /// Let exactly one step announcement through.
    Step = 1,
    /// Run until a breakpoint.
    Running = 2,
}

impl ControlState {
    fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Step,
            2 => Self::Running,
            _ => Self::Paused,
        }
    }
}

/// The one piece of memory shared between the host and a running program.
///
/// The host writes [`ControlState::Step`] and [`ControlState::Running`];
/// the program thread consumes steps and resets the value to
/// [`ControlState::Paused`] whenever it stops. The terminate flag is only
/// ever set, by `stop`.
#[derive(Debug)]
pub struct ControlRegister {
    value: AtomicI32,
    terminated: AtomicBool,
    lock: Mutex<()>,
    changed: Condvar,
}

impl Default for ControlRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlRegister {
    /// A register holding [`ControlState::Paused`].
    pub fn new() -> Self {
        Self {
            value: AtomicI32::new(ControlState::Paused as i32),
            terminated: AtomicBool::new(false),
            lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Current value.
    pub fn load(&self) -> ControlState {
        ControlState::from_raw(self.value.load(Ordering::SeqCst))
    }

    /// Releases the program for one step.
    pub fn step(&self) {
        self.store(ControlState::Step, true);
    }

    /// Releases the program until the next breakpoint.
    pub fn run(&self) {
        self.store(ControlState::Running, true);
    }

    /// Makes the program stop at its next step announcement. A blocked
    /// program stays blocked.
    pub fn pause(&self) {
        self.store(ControlState::Paused, false);
    }

    /// Abandons the run. Any blocked waiter returns.
    pub fn terminate(&self) {
        let _guard = self.lock.lock();
        self.terminated.store(true, Ordering::SeqCst);
        self.changed.notify_all();
    }

    /// Whether [`ControlRegister::terminate`] was called.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Program side: takes a pending step, leaving the register paused.
    pub fn consume_step(&self) -> bool {
        self.value
            .compare_exchange(
                ControlState::Step as i32,
                ControlState::Paused as i32,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Program side: moves the register from `observed` to paused before
    /// blocking. Fails, leaving the register alone, if the host wrote a new
    /// value since `observed` was read.
    pub fn pause_from(&self, observed: ControlState) -> bool {
        self.value
            .compare_exchange(
                observed as i32,
                ControlState::Paused as i32,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Program side: blocks while the register reads paused.
    ///
    /// There is no timeout. Returns `false` if the run was terminated.
    pub fn block_while_paused(&self) -> bool {
        let mut guard = self.lock.lock();
        while self.load() == ControlState::Paused && !self.is_terminated() {
            self.changed.wait(&mut guard);
        }
        !self.is_terminated()
    }

    fn store(&self, state: ControlState, wake: bool) {
        let _guard = self.lock.lock();
        self.value.store(state as i32, Ordering::SeqCst);
        if wake {
            self.changed.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn test_starts_paused() {
        let control = ControlRegister::new();
        assert_eq!(control.load(), ControlState::Paused);
        assert!(!control.consume_step());
    }

    #[test]
    fn test_step_is_consumed_once() {
        let control = ControlRegister::new();
        control.step();
        assert!(control.consume_step());
        assert_eq!(control.load(), ControlState::Paused);
        assert!(!control.consume_step());
    }

    #[test]
    fn test_run_wakes_blocked_waiter() {
        let control = Arc::new(ControlRegister::new());
        let waiter = {
            let control = control.clone();
            thread::spawn(move || control.block_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        control.run();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_pause_does_not_wake() {
        let control = ControlRegister::new();
        control.run();
        control.pause();
        assert_eq!(control.load(), ControlState::Paused);
    }

    #[test]
    fn test_pause_from_keeps_newer_command() {
        let control = ControlRegister::new();
        // the program read paused, then the host stepped
        control.step();
        assert!(!control.pause_from(ControlState::Paused));
        assert_eq!(control.load(), ControlState::Step);

        // the program read running at a breakpoint, then the host stepped
        control.run();
        let observed = control.load();
        control.step();
        assert!(!control.pause_from(observed));
        assert!(control.consume_step());

        control.run();
        assert!(control.pause_from(ControlState::Running));
        assert_eq!(control.load(), ControlState::Paused);
    }

    #[test]
    fn test_terminate_releases_waiter() {
        let control = Arc::new(ControlRegister::new());
        let waiter = {
            let control = control.clone();
            thread::spawn(move || control.block_while_paused())
        };
        thread::sleep(Duration::from_millis(20));
        control.terminate();
        assert!(!waiter.join().unwrap());
        assert!(control.is_terminated());
    }
}
