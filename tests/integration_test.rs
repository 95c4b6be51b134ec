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

use zx16asm::diagnostics::Diagnostics;
use zx16asm::{Assembly, assemble, output};

const CODE_START: usize = 0x0020;

fn assemble_ok(source: &str) -> Assembly {
    let mut diag = Diagnostics::new();
    let assembly = assemble(source, false, &mut diag).unwrap();
    assert!(!diag.has_errors(), "unexpected errors: {:?}", diag.errors());
    assembly
}

fn word_at(assembly: &Assembly, address: usize) -> u16 {
    u16::from_le_bytes([
        assembly.image.byte(address),
        assembly.image.byte(address + 1),
    ])
}

#[test]
fn test_add() {
    let assembly = assemble_ok("add x1, x2\n");
    assert_eq!(word_at(&assembly, CODE_START), 0x0440);
}

#[test]
fn test_addi() {
    let assembly = assemble_ok("addi x3, 5\n");
    assert_eq!(word_at(&assembly, CODE_START), 0x0AC1);
}

#[test]
fn test_li16_expansion_assembles_in_range() {
    let assembly = assemble_ok("li16 x4, 0x1234\n");
    // lui x4, 0x24 then ori x4, 0x34, both in range
    assert_eq!(word_at(&assembly, CODE_START), 0b110 | (4 << 6));
    assert_eq!(
        word_at(&assembly, CODE_START + 2),
        0b001 | (0b100 << 3) | (4 << 6) | (0x34 << 9)
    );
}

#[test]
fn test_jump_to_forward_label() {
    // label lands at 0x0024, the jump sits at 0x0020: offset (4)/2 = 2
    let assembly = assemble_ok("j skip\nnop\nskip:\nnop\n");
    assert_eq!(word_at(&assembly, CODE_START), 0b101 | (1 << 3));
}

#[test]
fn test_data_section_image() {
    let assembly = assemble_ok(".data\n.byte 1, 2, 3\n.string \"Hi\"\n");
    let bytes: Vec<u8> = (0..6).map(|i| assembly.image.byte(CODE_START + i)).collect();
    assert_eq!(bytes, vec![0x01, 0x02, 0x03, 0x48, 0x69, 0x00]);
}

#[test]
fn test_duplicate_equ_fails_assembly() {
    let mut diag = Diagnostics::new();
    let _ = assemble(".equ FOO, 1\n.equ FOO, 2\n", false, &mut diag).unwrap();
    assert!(diag.has_errors());
    assert_eq!(diag.error_count(), 1);
    assert!(
        diag.errors()[0]
            .message
            .contains("Symbol 'FOO' already defined")
    );
}

#[test]
fn test_sections_pack_in_declaration_order() {
    let source = "\
start:
addi x1, 1
addi x2, 2
.data
greeting:
.string \"ok\"
.bss
buffer:
.space 4
";
    let assembly = assemble_ok(source);
    let table = &assembly.symbol_table;
    // text is 4 bytes → data at 0x24, 3 bytes of data → bss at 0x27
    assert_eq!(table["start"].value, 0);
    assert_eq!(table["greeting"].value, 0);
    assert_eq!(table["buffer"].value, 0);
    assert_eq!(assembly.image.byte(0x24), b'o');
    assert_eq!(assembly.image.byte(0x25), b'k');
    assert_eq!(assembly.image.byte(0x26), 0);
}

#[test]
fn test_interrupt_vector_program() {
    let source = "\
.org 0x0
j handler
handler:
clr x1
ret
.org 0x20
nop
";
    let assembly = assemble_ok(source);
    // j at 0x0000 to 0x0002: offset 1, logical bit 0 dropped by the split
    assert_eq!(word_at(&assembly, 0x0000), 0b101);
    // clr x1 → xor x1, x1
    assert_eq!(
        word_at(&assembly, 0x0002),
        0b000 | (0b110 << 3) | (1 << 6) | (1 << 9) | (0b1001 << 12)
    );
    // ret → jr x1
    assert_eq!(word_at(&assembly, 0x0004), (1 << 6) | (0b1011 << 12));
    // back in .text at CODE_START
    assert_eq!(word_at(&assembly, CODE_START), 0x0000);
}

#[test]
fn test_call_and_ret_round_trip() {
    let source = "\
call func
nop
func:
ret
";
    let assembly = assemble_ok(source);
    // jal x1, func at 0x20; func at 0x24 → offset 2
    let jal = 0b101 | (1 << 3) | (2 << 3) | (1 << 15);
    assert_eq!(word_at(&assembly, CODE_START), jal as u16);
}

#[test]
fn test_constants_feed_instructions() {
    let source = ".equ DELTA, 5\n.equ NEWLINE, '\\n'\naddi x1, DELTA\naddi x2, NEWLINE\n";
    let assembly = assemble_ok(source);
    assert_eq!(word_at(&assembly, 0x20), 0b001 | (1 << 6) | (5 << 9));
    assert_eq!(word_at(&assembly, 0x22), 0b001 | (2 << 6) | (10 << 9));
}

#[test]
fn test_default_symbols_resolve() {
    let assembly = assemble_ok("li16 x1, STACK_TOP\n");
    // lui x1, 0xEFFE >> 7 = 0x1DF
    let high = 0x1DF;
    let imm_low = ((high >> 7) & 0b111) << 3;
    let imm_high = ((high >> 10) & 0x3F) << 9;
    assert_eq!(
        word_at(&assembly, 0x20),
        (0b110 | (1 << 6) | imm_low | imm_high) as u16
    );
}

#[test]
fn test_multiple_errors_accumulate() {
    let mut diag = Diagnostics::new();
    let _ = assemble(
        "addi x9, 1\nbogus_symbol\n.data\n.byte 999\n",
        false,
        &mut diag,
    )
    .unwrap();
    assert!(diag.has_errors());
    assert!(diag.error_count() >= 3);
}

#[test]
fn test_listing_and_writers_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = "start:\nadd x1, x2\n";
    let assembly = assemble_ok(source);

    let bin_path = dir.path().join("out.bin");
    std::fs::write(&bin_path, output::binary(&assembly.image)).unwrap();
    let bytes = std::fs::read(&bin_path).unwrap();
    assert_eq!(bytes.len(), 0x22);
    assert_eq!(&bytes[0x20..], &[0x40, 0x04]);

    let hex_path = dir.path().join("out.hex");
    std::fs::write(&hex_path, output::intel_hex(&assembly.image)).unwrap();
    let hex = std::fs::read_to_string(&hex_path).unwrap();
    assert!(hex.ends_with(":00000001FF\n"));

    let listing = output::listing(source, &assembly);
    assert!(listing.contains("add x1, x2"));
}

#[test]
fn test_symbol_dump_contains_labels_and_constants() {
    let assembly = assemble_ok(".equ LIMIT, 32\nmain:\nnop\n");
    let json = output::symbols_json(&assembly.symbol_table).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let names: Vec<&str> = parsed
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"LIMIT"));
    assert!(names.contains(&"main"));
    assert!(names.contains(&"STACK_TOP"));
}
