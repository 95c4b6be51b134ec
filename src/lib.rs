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

pub mod assembler;
pub mod bits;
pub mod diagnostics;
pub mod errors;
pub mod isa;
pub mod lexer;
pub mod output;
pub mod token;

use anyhow::{Context, Result};
use diagnostics::Diagnostics;

pub use assembler::second_pass::{Assembly, TraceEntry};

/// Run the whole pipeline over one source file: tokenize, size and lay out
/// the sections (pass 1), then resolve and encode into the 64 KiB image
/// (pass 2). Assembly problems land in `diag`; callers gate success on
/// `diag.has_errors()`. Only a lexical failure aborts early.
pub fn assemble(source: &str, verbose: bool, diag: &mut Diagnostics) -> Result<Assembly> {
    let tokens = lexer::tokenize(source).context("Failed during lexing stage")?;

    let first = assembler::first_pass::run(tokens, diag);

    Ok(assembler::second_pass::run(first, verbose, diag))
}
