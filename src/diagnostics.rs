/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

/// A single assembly error or warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerMessage {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Append-only accumulator for errors and warnings. Both passes keep going
/// after most problems so one run reports as many of them as possible; an
/// explicit accumulator (rather than process state) keeps the passes
/// re-entrant and testable.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<AssemblerMessage>,
    warnings: Vec<AssemblerMessage>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>, line: usize, column: usize) {
        self.errors.push(AssemblerMessage {
            message: message.into(),
            line,
            column,
        });
    }

    pub fn add_warning(&mut self, message: impl Into<String>, line: usize, column: usize) {
        self.warnings.push(AssemblerMessage {
            message: message.into(),
            line,
            column,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn errors(&self) -> &[AssemblerMessage] {
        &self.errors
    }

    pub fn warnings(&self) -> &[AssemblerMessage] {
        &self.warnings
    }

    /// Print every message in insertion order, then a one-line summary.
    /// Errors and warnings go to stderr; the success line goes to stdout.
    pub fn report(&self) {
        for error in &self.errors {
            eprintln!("Error at line {}: {}", error.line, error.message);
        }
        for warning in &self.warnings {
            eprintln!("Warning at line {}: {}", warning.line, warning.message);
        }

        if !self.errors.is_empty() {
            eprintln!(
                "\nAssembly failed with {} errors, {} warnings.",
                self.errors.len(),
                self.warnings.len()
            );
        } else if !self.warnings.is_empty() {
            println!(
                "Assembly completed with {} warnings.",
                self.warnings.len()
            );
        } else {
            println!("Assembly completed successfully.");
        }
    }
}
