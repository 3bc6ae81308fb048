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

//! The runtime shim linked into every debugged program.
//!
//! The shim is C++ and ships inside the engine; [`session`] holds a Rust
//! model of the same registries that is used to test the dump format.

pub mod session;

use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use tracing::debug;

/// Name of the header every program includes.
pub const UMBRELLA_HEADER: &str = "stanford.h";

/// File name the student's source is reported under in diagnostics.
pub const SOURCE_FILE_NAME: &str = "main.cpp";

/// The shim headers as `(file name, contents)`.
pub const HEADERS: &[(&str, &str)] = &[
    ("debug_core.h", include_str!("cpp/debug_core.h")),
    ("collections.h", include_str!("cpp/collections.h")),
    ("strlib.h", include_str!("cpp/strlib.h")),
    (UMBRELLA_HEADER, include_str!("cpp/stanford.h")),
];

/// Prepends the shim include to a (typically instrumented) program.
///
/// The `#line` directive makes compiler diagnostics refer to the student's
/// own line numbers.
pub fn wrap_source(source: &str) -> String {
    format!("#include \"{UMBRELLA_HEADER}\"\n#line 1 \"{SOURCE_FILE_NAME}\"\n{source}")
}

/// Writes the shim headers into `dir`, returning the written paths.
pub fn write_headers(dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
    HEADERS
        .iter()
        .map(|(name, contents)| {
            let path = dir.join(name);
            std::fs::write(&path, contents)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            debug!(path = %path.display(), "wrote shim header");
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_source_resets_line_numbers() {
        let wrapped = wrap_source("int main() {}\n");
        let mut lines = wrapped.lines();
        assert_eq!(lines.next(), Some("#include \"stanford.h\""));
        assert_eq!(lines.next(), Some("#line 1 \"main.cpp\""));
        assert_eq!(lines.next(), Some("int main() {}"));
    }

    #[test]
    fn test_headers_define_the_injected_hooks() {
        let core = HEADERS.iter().find(|(name, _)| *name == "debug_core.h").unwrap().1;
        for hook in ["DEBUG_STEP", "FuncTracker", "struct Tracer", "_debug_loop_step", "_debug_field",
            "_debug_update_heap_info", "_debug_wait", "EXPECT_EQUAL", "[DEBUG:VARS:START]"]
        {
            assert!(core.contains(hook), "missing {hook}");
        }
    }

    #[test]
    fn test_collections_cover_the_course_types() {
        let collections = HEADERS.iter().find(|(name, _)| *name == "collections.h").unwrap().1;
        for class in ["class Vector", "class Grid", "class Stack", "class Queue", "class PriorityQueue"] {
            assert!(collections.contains(class), "missing {class}");
        }
        for method in ["void enqueue(const T &value, double priority)", "double peekPriority()",
            "void changePriority("]
        {
            assert!(collections.contains(method), "missing {method}");
        }
    }

    #[test]
    fn test_write_headers() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_headers(&dir.path().join("include")).unwrap();
        assert_eq!(written.len(), HEADERS.len());
        for path in written {
            assert!(path.exists());
        }
    }
}
