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

//! Back-end writers: serialize the finished memory image into the formats
//! the driver offers, plus the listing and symbol-table dumps.

use crate::Assembly;
use crate::assembler::memory::MemoryImage;
use crate::assembler::symbol_table::SymbolTable;
use std::fmt::Write;

/// Raw image bytes, trimmed at the high-water mark.
pub fn binary(image: &MemoryImage) -> Vec<u8> {
    image.used().to_vec()
}

/// Intel-HEX: 16-byte data records over the used range, then the EOF record.
pub fn intel_hex(image: &MemoryImage) -> String {
    let mut out = String::new();
    for (index, chunk) in image.used().chunks(16).enumerate() {
        let address = index * 16;
        let mut record: Vec<u8> = vec![
            chunk.len() as u8,
            (address >> 8) as u8,
            address as u8,
            0x00, // data record
        ];
        record.extend_from_slice(chunk);
        let sum = record.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte));
        let _ = write!(out, ":");
        for byte in &record {
            let _ = write!(out, "{:02X}", byte);
        }
        let _ = writeln!(out, "{:02X}", sum.wrapping_neg());
    }
    out.push_str(":00000001FF\n");
    out
}

/// A synthesizable ROM module with one `initial` assignment per non-zero
/// byte.
pub fn verilog(image: &MemoryImage, module: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module {} (", module);
    out.push_str("    input  wire [15:0] addr,\n");
    out.push_str("    output wire [7:0]  data\n");
    out.push_str(");\n\n");
    out.push_str("    reg [7:0] mem [0:65535];\n\n");
    out.push_str("    assign data = mem[addr];\n\n");
    out.push_str("    initial begin\n");
    for (address, byte) in image.used().iter().enumerate() {
        if *byte != 0 {
            let _ = writeln!(out, "        mem[16'h{:04X}] = 8'h{:02X};", address, byte);
        }
    }
    out.push_str("    end\n\nendmodule\n");
    out
}

/// `$readmemh`-style memory file: 16 bytes per row. Dense files cover the
/// whole used range from address zero; sparse files emit only rows with data,
/// each prefixed by its address.
pub fn memory_file(image: &MemoryImage, sparse: bool) -> String {
    let mut out = String::new();
    for (index, chunk) in image.used().chunks(16).enumerate() {
        if sparse && chunk.iter().all(|byte| *byte == 0) {
            continue;
        }
        if sparse {
            let _ = write!(out, "@{:04X} ", index * 16);
        }
        let row: Vec<String> = chunk.iter().map(|byte| format!("{:02X}", byte)).collect();
        let _ = writeln!(out, "{}", row.join(" "));
    }
    out
}

/// Listing: each source line, annotated with the address and word of every
/// instruction it produced.
pub fn listing(source: &str, assembly: &Assembly) -> String {
    let mut out = String::new();
    for (index, text) in source.lines().enumerate() {
        let number = index + 1;
        let mut entries = assembly.trace.iter().filter(|entry| entry.line == number);
        match entries.next() {
            Some(first) => {
                let _ = writeln!(
                    out,
                    "{:04X}  {:04X}    {:>4}  {}",
                    first.address, first.word, number, text
                );
                // pseudo expansions attach extra words to the same line
                for extra in entries {
                    let _ = writeln!(out, "{:04X}  {:04X}", extra.address, extra.word);
                }
            }
            None => {
                let _ = writeln!(out, "{:12}{:>4}  {}", "", number, text);
            }
        }
    }
    out
}

/// The symbol table as JSON, sorted by name for stable output.
pub fn symbols_json(table: &SymbolTable) -> serde_json::Result<String> {
    let mut symbols: Vec<_> = table.values().collect();
    symbols.sort_by(|a, b| a.name.cmp(&b.name));
    serde_json::to_string_pretty(&symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;

    fn assemble(source: &str) -> Assembly {
        let mut diag = Diagnostics::new();
        let assembly = crate::assemble(source, false, &mut diag).unwrap();
        assert!(!diag.has_errors(), "{:?}", diag.errors());
        assembly
    }

    #[test]
    fn test_binary_is_trimmed() {
        let assembly = assemble("add x1, x2\n");
        let bytes = binary(&assembly.image);
        assert_eq!(bytes.len(), 0x22);
        assert_eq!(&bytes[0x20..], &[0x40, 0x04]);
    }

    #[test]
    fn test_intel_hex_records_and_checksum() {
        let assembly = assemble("add x1, x2\n");
        let hex = intel_hex(&assembly.image);
        let lines: Vec<&str> = hex.lines().collect();
        // 0x22 bytes → three data records + EOF
        assert_eq!(lines.len(), 4);
        // all-zero record: sum 0x10, checksum 0xF0
        assert!(lines[0].starts_with(":10000000"));
        assert!(lines[0].ends_with("F0"));
        // the instruction record: 2 bytes at 0x0020
        assert_eq!(lines[2], ":0200200040049A");
        assert_eq!(lines[3], ":00000001FF");
    }

    #[test]
    fn test_verilog_lists_nonzero_bytes() {
        let assembly = assemble("addi x3, 5\n");
        let text = verilog(&assembly.image, "program_memory");
        assert!(text.starts_with("module program_memory ("));
        assert!(text.contains("mem[16'h0020] = 8'hC1;"));
        assert!(text.contains("mem[16'h0021] = 8'h0A;"));
        assert!(text.ends_with("endmodule\n"));
    }

    #[test]
    fn test_memory_file_sparse_skips_empty_rows() {
        let assembly = assemble("add x1, x2\n");
        let dense = memory_file(&assembly.image, false);
        let sparse = memory_file(&assembly.image, true);
        assert_eq!(dense.lines().count(), 3);
        assert_eq!(sparse.lines().count(), 1);
        assert!(sparse.starts_with("@0020 40 04"));
    }

    #[test]
    fn test_listing_annotates_instruction_lines() {
        let source = "add x1, x2\naddi x3, 5\n";
        let assembly = assemble(source);
        let text = listing(source, &assembly);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("0020  0440"));
        assert!(lines[0].ends_with("add x1, x2"));
        assert!(lines[1].starts_with("0022  0AC1"));
    }

    #[test]
    fn test_symbols_json_round_trips() {
        let assembly = assemble(".equ LIMIT, 64\nstart:\nnop\n");
        let json = symbols_json(&assembly.symbol_table).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entries = parsed.as_array().unwrap();
        let start = entries
            .iter()
            .find(|entry| entry["name"] == "start")
            .unwrap();
        assert_eq!(start["section"], ".text");
        assert_eq!(start["value"], 0);
        let limit = entries
            .iter()
            .find(|entry| entry["name"] == "LIMIT")
            .unwrap();
        assert_eq!(limit["section"], "const");
        assert_eq!(limit["value"], 64);
    }
}
