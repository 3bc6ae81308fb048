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

//! Markers of the textual debug channel.
//!
//! The instrumented program multiplexes its ordinary output and the debugger
//! state over one text stream. A state dump looks like this:
//!
//! ```text
//! [DEBUG:VARS:START]
//! name|type|ownAddr|value|targetAddr|frame|pointeeValue
//! [DEBUG:VARS:END]
//! [DEBUG:STACK:START]
//! frameLabel
//! [DEBUG:STACK:END]
//! ```

/// Opens the variable block of a dump.
pub const VARS_START: &str = "[DEBUG:VARS:START]";
/// Closes the variable block of a dump.
pub const VARS_END: &str = "[DEBUG:VARS:END]";
/// Opens the call stack block of a dump.
pub const STACK_START: &str = "[DEBUG:STACK:START]";
/// Closes the call stack block of a dump.
pub const STACK_END: &str = "[DEBUG:STACK:END]";

/// Prefix of a passing `EXPECT_EQUAL` line.
pub const TEST_PASS: &str = "[TEST:PASS]";
/// Prefix of a failing `EXPECT_EQUAL` line.
pub const TEST_FAIL: &str = "[TEST:FAIL]";
/// Separator before the expected value of a failing test line.
pub const TEST_EXPECTED: &str = " Expected: ";
/// Separator before the actual value of a failing test line.
pub const TEST_ACTUAL: &str = " Actual: ";

/// Field separator of a variable record.
pub const FIELD_SEPARATOR: char = '|';
/// Spelling of the separator inside the last field of a record.
pub const ESCAPED_SEPARATOR: &str = "\\u007c";
/// Spelling of a newline inside a record field.
pub const ESCAPED_NEWLINE: &str = "\\n";
/// Spelling of a backslash inside a record field.
pub const ESCAPED_BACKSLASH: &str = "\\\\";
/// Number of fields in a complete variable record.
pub const RECORD_FIELDS: usize = 7;

/// Frame label reserved for heap objects.
pub const HEAP_FRAME: &str = "heap";
/// Frame label of variables tracked outside any function.
pub const GLOBAL_FRAME: &str = "global";
/// Target address written for pointers that point nowhere.
pub const NULL_TARGET: &str = "0";

/// Prefix of worker-side diagnostics injected into the output stream.
pub const WORKER_ERROR_PREFIX: &str = "[Worker Error]";

/// Keeps a rendered value on one record line.
///
/// Newlines and backslashes are escaped in every value field. The last field
/// of a record may not contain the separator, so it is escaped there too.
/// Carriage returns are dropped.
pub fn escape_field(text: &str, last_field: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str(ESCAPED_NEWLINE),
            '\\' => out.push_str(ESCAPED_BACKSLASH),
            '\r' => {}
            FIELD_SEPARATOR if last_field => out.push_str(ESCAPED_SEPARATOR),
            c => out.push(c),
        }
    }
    out
}

/// Reverses [`escape_field`]. A backslash that starts no known escape is
/// kept as written.
pub fn unescape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(index) = rest.find('\\') {
        out.push_str(&rest[..index]);
        let escape = &rest[index..];
        let (decoded, len) = if escape.starts_with(ESCAPED_SEPARATOR) {
            (FIELD_SEPARATOR, ESCAPED_SEPARATOR.len())
        } else if escape.starts_with(ESCAPED_NEWLINE) {
            ('\n', ESCAPED_NEWLINE.len())
        } else if escape.starts_with(ESCAPED_BACKSLASH) {
            ('\\', ESCAPED_BACKSLASH.len())
        } else {
            ('\\', 1)
        };
        out.push(decoded);
        rest = &escape[len..];
    }
    out.push_str(rest);
    out
}

/// Returns `true` if the line is one of the four block sentinels.
pub fn is_sentinel(line: &str) -> bool {
    matches!(line, VARS_START | VARS_END | STACK_START | STACK_END)
}
