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

use std::{collections::BTreeMap, fmt::Display};

use itertools::Itertools;

use crate::{
    analysis::{LoopKind, SourceAnalysis, StepKind},
    instrumentation::codegen,
    EngineError,
};

const LEFT_BRACKET_PRIORITY: u8 = 255; // used for the left bracket of a braced statement body
const FUNCTION_ENTRY_PRIORITY: u8 = 191; // used for the function entry sequence
const LOOP_VARIABLE_PRIORITY: u8 = 150; // used for the loop variable tracker at the top of the body
const VARIABLE_UPDATE_PRIORITY: u8 = 127; // used for the tracker after a declaration
const RIGHT_BRACKET_PRIORITY: u8 = 95; // used for the right bracket of a braced statement body
const BEFORE_STEP_PRIORITY: u8 = 63; // used for the step before a statement
const LOOP_BACK_PRIORITY: u8 = 31; // used for the iteration step at the bottom of a loop block

/// The collections of modifications on a source file.
#[derive(Debug, Default)]
pub struct SourceModifications {
    /// The modifications on the source file. The key is the location of modification in the
    /// original source code; actions sharing a location are kept in application order.
    modifications: BTreeMap<usize, Vec<InstrumentAction>>,
}

impl SourceModifications {
    /// Creates an empty set of modifications.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct locations that will be modified.
    pub fn len(&self) -> usize {
        self.modifications.len()
    }

    /// Whether nothing will be modified.
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Adds a modification.
    ///
    /// Insertions at the same location are merged: the content with the
    /// higher priority comes first, and on a tie the earlier one stays first.
    /// A replacement that overlaps another modification is rejected.
    pub fn add_modification(&mut self, modification: InstrumentAction) -> Result<(), EngineError> {
        let loc = modification.loc;
        // Check if the modification overlaps with the previous modification
        if let Some((_, prev)) = self.modifications.range(..loc).next_back() {
            if prev.iter().any(|action| action.end > loc) {
                return Err(EngineError::ConflictingEdit(loc));
            }
        }
        // Check if the modification overlaps with the next modification
        if let Some((next_loc, next)) = self.modifications.range_mut(loc..).next() {
            if *next_loc == loc {
                // if both of them instrument at the same location, merge them.
                if modification.end != loc || next.iter().any(|action| action.end != loc) {
                    return Err(EngineError::ConflictingEdit(loc));
                }
                let position = next
                    .iter()
                    .position(|action| action.priority < modification.priority)
                    .unwrap_or(next.len());
                next.insert(position, modification);
                return Ok(());
            }
            if modification.end > *next_loc {
                return Err(EngineError::ConflictingEdit(loc));
            }
        }
        self.modifications.insert(loc, vec![modification]);
        Ok(())
    }

    /// Extends the modifications with the given modifications.
    pub fn extend_modifications(
        &mut self,
        modifications: impl IntoIterator<Item = InstrumentAction>,
    ) -> Result<(), EngineError> {
        for modification in modifications {
            self.add_modification(modification)?;
        }
        Ok(())
    }

    /// Modifies the source code with the modifications.
    pub fn modify_source(&self, source: &str) -> String {
        let mut modified_source = source.to_string();
        // Apply the modifications in reverse order to avoid index shifting
        for (loc, actions) in self.modifications.iter().rev() {
            let end = actions.iter().map(|action| action.end).max().unwrap_or(*loc);
            let content = actions.iter().map(|action| action.content.to_string()).join(" ");
            modified_source.replace_range(*loc..end, &content);
        }
        modified_source
    }
}

/// An action to instrument a code in the source file.
#[derive(Debug, Clone)]
pub struct InstrumentAction {
    /// The offset at which the instrumented code is inserted.
    pub loc: usize,
    /// End of the replaced text; equal to `loc` for a pure insertion.
    pub end: usize,
    /// The code to instrument
    pub content: InstrumentContent,
    /// The priority of the instrument action. If two `InstrumentAction`s have the same `loc`, the one with higher priority will be applied first.
    pub priority: u8,
}

impl InstrumentAction {
    /// An insertion at `loc`.
    pub fn insert(loc: usize, content: InstrumentContent, priority: u8) -> Self {
        Self { loc, end: loc, content, priority }
    }
}

/// The content to instrument.
#[derive(Debug, Clone)]
pub enum InstrumentContent {
    /// The code to instrument. The plain code can be directly inserted into the source code as a string.
    Plain(String),
    /// A step announcement. The program may pause here.
    StepHook {
        /// Line reported to the host.
        line: u32,
    },
    /// A tracker registering a variable with the shim.
    VariableTracker {
        /// Name of the tracked variable.
        name: String,
    },
}

impl Display for InstrumentContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let content = match self {
            Self::Plain(content) => content.clone(),
            Self::StepHook { line } => codegen::generate_step_hook(*line),
            Self::VariableTracker { name } => codegen::generate_variable_tracker(name),
        };
        write!(f, "{content}")
    }
}

impl SourceModifications {
    /// Collects the modifications on the source code given the analysis result.
    pub fn collect_modifications(&mut self, analysis: &SourceAnalysis) -> Result<(), EngineError> {
        // Patch single-statement if/else/loop bodies into blocks.
        self.collect_statement_to_block_modifications(analysis)?;

        self.collect_function_entry_modifications(analysis)?;
        self.collect_loop_modifications(analysis)?;
        self.collect_before_step_hook_modifications(analysis)?;
        self.collect_variable_update_hook_modifications(analysis)?;
        self.collect_printer_prototype_modifications(analysis)?;

        Ok(())
    }

    /// Collects the modifications to convert a statement to a block. Control
    /// flow structures such as if/else/for/while may have a single statement
    /// as their body; a step injected in front of it would detach it.
    ///
    /// Nested bodies can end at the same offset. They are visited innermost
    /// first so their closing brackets nest, each carrying its own loop-back
    /// step.
    fn collect_statement_to_block_modifications(
        &mut self,
        analysis: &SourceAnalysis,
    ) -> Result<(), EngineError> {
        for statement_body in analysis.statement_bodies.iter().rev() {
            let left_bracket = InstrumentAction::insert(
                statement_body.range.start,
                InstrumentContent::Plain("{".to_string()),
                LEFT_BRACKET_PRIORITY,
            );
            let closing = match statement_body.loop_back {
                Some(line) => format!(" {} }}", codegen::generate_step_hook(line)),
                None => " }".to_string(),
            };
            let right_bracket = InstrumentAction::insert(
                statement_body.range.end,
                InstrumentContent::Plain(closing),
                RIGHT_BRACKET_PRIORITY,
            );
            self.extend_modifications([left_bracket, right_bracket])?;
        }
        Ok(())
    }

    fn collect_function_entry_modifications(
        &mut self,
        analysis: &SourceAnalysis,
    ) -> Result<(), EngineError> {
        for function in &analysis.functions {
            self.add_modification(InstrumentAction::insert(
                function.entry_loc(),
                InstrumentContent::Plain(codegen::generate_function_entry(function)),
                FUNCTION_ENTRY_PRIORITY,
            ))?;
        }
        Ok(())
    }

    /// Loop variable trackers, the per-iteration call of counted loops and
    /// the loop-back step of the other loops when their body is a block.
    /// Unbraced bodies get their loop-back step with the closing bracket.
    fn collect_loop_modifications(&mut self, analysis: &SourceAnalysis) -> Result<(), EngineError> {
        for lp in &analysis.loops {
            if lp.kind != LoopKind::Counted && lp.body_is_block {
                self.add_modification(InstrumentAction::insert(
                    lp.body_exit_loc(),
                    InstrumentContent::Plain(format!(" {}", codegen::generate_step_hook(lp.line))),
                    LOOP_BACK_PRIORITY,
                ))?;
            }
            if let Some(name) = &lp.loop_variable {
                self.add_modification(InstrumentAction::insert(
                    lp.body_entry_loc(),
                    InstrumentContent::VariableTracker { name: name.clone() },
                    LOOP_VARIABLE_PRIORITY,
                ))?;
            }
            if lp.kind == LoopKind::Counted {
                if let Some(loc) = lp.update_loc {
                    self.add_modification(InstrumentAction::insert(
                        loc,
                        InstrumentContent::Plain(codegen::generate_iteration_hook(lp)),
                        BEFORE_STEP_PRIORITY,
                    ))?;
                }
            }
        }
        Ok(())
    }

    fn collect_before_step_hook_modifications(
        &mut self,
        analysis: &SourceAnalysis,
    ) -> Result<(), EngineError> {
        // loop-back steps are placed with their loops
        for step in analysis.steps.iter().filter(|s| s.kind == StepKind::Statement) {
            self.add_modification(InstrumentAction::insert(
                step.loc,
                InstrumentContent::StepHook { line: step.line },
                BEFORE_STEP_PRIORITY,
            ))?;
        }
        Ok(())
    }

    fn collect_variable_update_hook_modifications(
        &mut self,
        analysis: &SourceAnalysis,
    ) -> Result<(), EngineError> {
        for declaration in &analysis.declarations {
            for name in &declaration.names {
                self.add_modification(InstrumentAction::insert(
                    declaration.loc,
                    InstrumentContent::VariableTracker { name: name.clone() },
                    VARIABLE_UPDATE_PRIORITY,
                ))?;
            }
        }
        Ok(())
    }

    fn collect_printer_prototype_modifications(
        &mut self,
        analysis: &SourceAnalysis,
    ) -> Result<(), EngineError> {
        for descriptor in &analysis.structs {
            let Some(loc) = descriptor.prototype_loc else {
                continue;
            };
            self.add_modification(InstrumentAction::insert(
                loc,
                InstrumentContent::Plain(codegen::generate_printer_prototype(descriptor)),
                VARIABLE_UPDATE_PRIORITY,
            ))?;
        }
        Ok(())
    }
}
