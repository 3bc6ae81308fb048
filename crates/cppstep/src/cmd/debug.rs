//! Debug command - interactive step debugging in the terminal

use std::{
    fs,
    io::{self, Write},
    path::Path,
    str::FromStr,
};

use cppstep_common::BreakpointSet;
use cppstep_engine::{
    coordinator::CommandToolchain, Coordinator, DebugSession, EngineConfig, SessionEvent,
};
use eyre::{bail, Context, Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info, warn};

use crate::utils::{render_listing, render_stack, render_test_summary, render_variables};

const PROMPT: &str = "(cppstep) ";

/// Lines of source shown on either side of the current line.
const LISTING_CONTEXT: u32 = 2;

const HELP: &str = "\
commands:
  step, s            run to the next step
  run, c             run to the next breakpoint
  pause, p           stop a running program at its next step
  break, b <lines>   toggle breakpoints, e.g. `b 4,9-11`; no argument lists them
  vars, v            variables and heap objects
  stack, bt          call stack
  list, l            source around the current line
  json               current state as JSON
  quit, q            abandon the program and exit";

/// A command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Advance one step.
    Step,
    /// Run to the next breakpoint.
    Run,
    /// Stop at the next step.
    Pause,
    /// Toggle these breakpoints; list them when empty.
    Break(BreakpointSet),
    /// Show variables.
    Vars,
    /// Show the call stack.
    Stack,
    /// Show the source listing.
    List,
    /// Print the snapshot as JSON.
    Json,
    /// Show the command list.
    Help,
    /// Abandon the run.
    Quit,
}

impl FromStr for ReplCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (word, rest) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
        let command = match word {
            "step" | "s" => Self::Step,
            "run" | "c" | "continue" => Self::Run,
            "pause" | "p" => Self::Pause,
            "break" | "b" => Self::Break(rest.parse()?),
            "vars" | "v" => Self::Vars,
            "stack" | "bt" => Self::Stack,
            "list" | "l" => Self::List,
            "json" => Self::Json,
            "help" | "h" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            "" => bail!("type `help` for the list of commands"),
            other => bail!("unknown command `{other}`, type `help` for the list of commands"),
        };
        Ok(command)
    }
}

/// Why the program stopped advancing.
enum Stop {
    Paused(u32),
    Finished,
    Quit,
}

type Input = Lines<BufReader<Stdin>>;

fn coordinator(config: &EngineConfig) -> Coordinator {
    Coordinator::new(CommandToolchain::from_config(config), runner())
}

#[cfg(feature = "wasmtime")]
fn runner() -> cppstep_engine::coordinator::WasmRunner {
    cppstep_engine::coordinator::WasmRunner::new()
}

#[cfg(not(feature = "wasmtime"))]
fn runner() -> cppstep_engine::coordinator::NoRuntime {
    cppstep_engine::coordinator::NoRuntime
}

/// Runs `file` under the debugger, reading commands from stdin.
pub async fn debug_program(
    file: &Path,
    breakpoints: BreakpointSet,
    run: bool,
    config: &EngineConfig,
) -> Result<()> {
    let source = fs::read_to_string(file)
        .wrap_err_with(|| format!("Failed to read {}", file.display()))?;

    let mut session = DebugSession::new(coordinator(config));
    session.set_breakpoints(breakpoints.iter().copied());
    session.start(&source)?;

    if let Some(breakable) = session.breakable_lines() {
        let unreachable: Vec<u32> =
            breakpoints.iter().copied().filter(|line| !breakable.contains(line)).collect();
        if !unreachable.is_empty() {
            warn!(lines = ?unreachable, "breakpoints on lines without a step will never hit");
        }
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut skip_first_pause = run;

    'session: loop {
        match advance(&mut session, &mut input).await? {
            Stop::Finished => {
                println!("\nprogram finished");
                break;
            }
            Stop::Quit => return Ok(()),
            Stop::Paused(line) => {
                if std::mem::take(&mut skip_first_pause) && !session.breakpoints().hits(line) {
                    session.resume();
                    continue;
                }
                print!(
                    "{}",
                    render_listing(&source, Some(line), &session.breakpoints(), LISTING_CONTEXT)
                );
            }
        }

        loop {
            prompt()?;
            let Some(line) = input.next_line().await? else {
                session.stop();
                return Ok(());
            };
            let command = match line.parse::<ReplCommand>() {
                Ok(command) => command,
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            };
            debug!(?command, "command");

            match command {
                ReplCommand::Step => {
                    session.step();
                    continue 'session;
                }
                ReplCommand::Run => {
                    session.resume();
                    continue 'session;
                }
                ReplCommand::Pause => println!("already paused"),
                ReplCommand::Break(lines) => {
                    for line in lines.iter().copied() {
                        let enabled = session.toggle_breakpoint(line);
                        let breakable =
                            session.breakable_lines().is_none_or(|set| set.contains(&line));
                        match (enabled, breakable) {
                            (true, true) => println!("breakpoint set at line {line}"),
                            (true, false) => {
                                println!("breakpoint set at line {line} (no step on that line)")
                            }
                            (false, _) => println!("breakpoint cleared at line {line}"),
                        }
                    }
                    if lines.is_empty() {
                        println!("breakpoints: {}", session.breakpoints());
                    }
                }
                ReplCommand::Vars => match session.snapshot() {
                    Some(snapshot) => print!("{}", render_variables(&snapshot.graph)),
                    None => println!("no state yet"),
                },
                ReplCommand::Stack => match session.snapshot() {
                    Some(snapshot) => print!("{}", render_stack(&snapshot.stack)),
                    None => println!("no state yet"),
                },
                ReplCommand::List => print!(
                    "{}",
                    render_listing(
                        &source,
                        session.current_line(),
                        &session.breakpoints(),
                        LISTING_CONTEXT
                    )
                ),
                ReplCommand::Json => {
                    println!("{}", serde_json::to_string_pretty(&session.snapshot())?)
                }
                ReplCommand::Help => println!("{HELP}"),
                ReplCommand::Quit => {
                    session.stop();
                    return Ok(());
                }
            }
        }
    }

    if !session.tests().is_empty() {
        print!("{}", render_test_summary(session.tests()));
    }
    Ok(())
}

/// Forwards program output until the program blocks or ends. `pause` and
/// `quit` are honored while it runs.
async fn advance(session: &mut DebugSession, input: &mut Input) -> Result<Stop> {
    loop {
        tokio::select! {
            event = session.next_event() => match event {
                None | Some(SessionEvent::Finished) => return Ok(Stop::Finished),
                Some(SessionEvent::Paused { line }) => return Ok(Stop::Paused(line)),
                Some(SessionEvent::Output(text)) => {
                    print!("{text}");
                    io::stdout().flush()?;
                }
                Some(SessionEvent::Compiled) => info!("program compiled"),
                Some(SessionEvent::Snapshot(_)) | Some(SessionEvent::Test(_)) => {}
            },
            line = input.next_line() => match line? {
                None => {
                    session.stop();
                    return Ok(Stop::Quit);
                }
                Some(line) => match line.parse::<ReplCommand>() {
                    Ok(ReplCommand::Pause) => session.pause(),
                    Ok(ReplCommand::Quit) => {
                        session.stop();
                        return Ok(Stop::Quit);
                    }
                    Ok(_) => println!("program is running, `pause` to stop it"),
                    Err(e) => println!("{e}"),
                },
            },
        }
    }
}

fn prompt() -> Result<()> {
    print!("{PROMPT}");
    io::stdout().flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("s".parse::<ReplCommand>().unwrap(), ReplCommand::Step);
        assert_eq!(" run ".parse::<ReplCommand>().unwrap(), ReplCommand::Run);
        assert_eq!("bt".parse::<ReplCommand>().unwrap(), ReplCommand::Stack);
        assert_eq!("json".parse::<ReplCommand>().unwrap(), ReplCommand::Json);
        assert_eq!("q".parse::<ReplCommand>().unwrap(), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_break() {
        let ReplCommand::Break(lines) = "b 4,9-10".parse::<ReplCommand>().unwrap() else {
            panic!("not a break command");
        };
        assert_eq!(lines.lines(), vec![4, 9, 10]);

        assert_eq!("break".parse::<ReplCommand>().unwrap(), ReplCommand::Break(Default::default()));
        assert!("b zero".parse::<ReplCommand>().is_err());
    }

    #[cfg(feature = "wasmtime")]
    #[test]
    fn test_runner_can_suspend_programs() {
        use cppstep_engine::coordinator::ProgramRunner;
        assert!(runner().supports_blocking_wait());
    }

    #[test]
    fn test_parse_unknown() {
        assert!("frobnicate".parse::<ReplCommand>().is_err());
        assert!("".parse::<ReplCommand>().is_err());
    }
}
