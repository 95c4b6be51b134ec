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

use anyhow::{Context, Result};
use clap::Parser as clap_parser;
use clap::ValueEnum;
use std::fs;
use std::path::PathBuf;
use std::process;
use zx16asm::assemble;
use zx16asm::diagnostics::Diagnostics;
use zx16asm::output;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    Bin,
    Hex,
    Verilog,
    Mem,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Bin => "bin",
            Format::Hex => "hex",
            Format::Verilog => "v",
            Format::Mem => "mem",
        }
    }
}

#[derive(clap_parser)]
#[clap(version = "0.1.0", about = "ZX16 assembler")]
struct Opts {
    /// Input assembly file
    input: PathBuf,
    /// Output file (defaults to the input with the format's extension)
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Output format
    #[clap(short, long, value_enum, default_value_t = Format::Bin)]
    format: Format,
    /// Generate a listing file
    #[clap(short, long)]
    listing: Option<PathBuf>,
    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
    /// Module name for Verilog output
    #[clap(long, default_value = "program_memory")]
    verilog_module: String,
    /// Generate a sparse memory file
    #[clap(long)]
    mem_sparse: bool,
    /// Write the symbol table as JSON
    #[clap(long)]
    symbols: Option<PathBuf>,
}

fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    let source = fs::read_to_string(&opts.input)
        .with_context(|| format!("Failed to read input file: {}", opts.input.display()))?;

    let mut diag = Diagnostics::new();
    let assembly = assemble(&source, opts.verbose, &mut diag)?;

    diag.report();
    if diag.has_errors() {
        process::exit(1);
    }

    let output_path = opts
        .output
        .clone()
        .unwrap_or_else(|| opts.input.with_extension(opts.format.extension()));

    match opts.format {
        Format::Bin => fs::write(&output_path, output::binary(&assembly.image)),
        Format::Hex => fs::write(&output_path, output::intel_hex(&assembly.image)),
        Format::Verilog => fs::write(
            &output_path,
            output::verilog(&assembly.image, &opts.verilog_module),
        ),
        Format::Mem => fs::write(
            &output_path,
            output::memory_file(&assembly.image, opts.mem_sparse),
        ),
    }
    .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    if let Some(path) = &opts.listing {
        fs::write(path, output::listing(&source, &assembly))
            .with_context(|| format!("Failed to write listing file: {}", path.display()))?;
        if opts.verbose {
            println!("Listing written to {}", path.display());
        }
    }

    if let Some(path) = &opts.symbols {
        let json = output::symbols_json(&assembly.symbol_table)
            .context("Failed to serialize the symbol table")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write symbol file: {}", path.display()))?;
    }

    if opts.verbose {
        println!("Output written to {}", output_path.display());
    }

    Ok(())
}
