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

//! Declarative encoding table for the ZX16 instruction set.
//!
//! Every true instruction maps to an ordered list of [`Field`]s. Constants
//! carry the fixed opcode/funct bits, operand fields consume one token each,
//! and immediate fields know their own bit placement (contiguous or split) and
//! signed/unsigned bounds. The second pass encodes any instruction by walking
//! this list; nothing about an individual mnemonic lives in code.

use crate::token::TokenKind;
use std::collections::HashMap;
use std::sync::LazyLock;

// Well-known addresses of the ZX16 memory map.
pub const RESET_VECTOR: u32 = 0x0000;
pub const INT_VECTORS: u32 = 0x0000;
pub const CODE_START: u32 = 0x0020;
pub const MMIO_BASE: u32 = 0xF000;
pub const MMIO_SIZE: u32 = 0x1000;
pub const STACK_TOP: u32 = 0xEFFE;
pub const MEM_SIZE: usize = 0x10000;

pub const DEFAULT_SYMBOLS: &[(&str, u32)] = &[
    ("RESET_VECTOR", RESET_VECTOR),
    ("INT_VECTORS", INT_VECTORS),
    ("CODE_START", CODE_START),
    ("MMIO_BASE", MMIO_BASE),
    ("MMIO_SIZE", MMIO_SIZE),
    ("STACK_TOP", STACK_TOP),
    ("MEM_SIZE", MEM_SIZE as u32),
];

/// One allocation of a split immediate: logical bits `imm_lo..=imm_hi` land in
/// word bits `word_lo..=word_hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmSlice {
    pub word_lo: u8,
    pub word_hi: u8,
    pub imm_lo: u8,
    pub imm_hi: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Contiguous { lo: u8, hi: u8 },
    Split(Vec<ImmSlice>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmediateSpec {
    pub width: u8,
    pub signed: bool,
    pub min: i32,
    pub max: i32,
    pub placement: Placement,
}

impl ImmediateSpec {
    fn contiguous(lo: u8, hi: u8, signed: bool) -> Self {
        Self::with_bounds(hi - lo + 1, signed, Placement::Contiguous { lo, hi })
    }

    fn split(slices: Vec<ImmSlice>, signed: bool) -> Self {
        let width = slices.iter().map(|s| s.imm_hi - s.imm_lo + 1).sum();
        Self::with_bounds(width, signed, Placement::Split(slices))
    }

    fn with_bounds(width: u8, signed: bool, placement: Placement) -> Self {
        let (min, max) = if signed {
            (-(1 << (width - 1)), (1 << (width - 1)) - 1)
        } else {
            (0, (1 << width) - 1)
        };
        Self {
            width,
            signed,
            min,
            max,
            placement,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Fixed bits occupying word bits `lo..=hi`. Emits bits, consumes nothing.
    Constant { lo: u8, hi: u8, bits: u16 },
    /// Register operand encoded into word bits `lo..=hi`.
    Register { lo: u8, hi: u8 },
    /// Immediate operand with data-driven placement and bounds.
    Immediate(ImmediateSpec),
    /// Required syntactic token; consumes a token, emits no bits.
    Punctuation(TokenKind),
}

// Table-building helpers, named after the slot they fill.

fn op(bits: u16) -> Field {
    Field::Constant { lo: 0, hi: 2, bits }
}

fn funct3(bits: u16) -> Field {
    Field::Constant { lo: 3, hi: 5, bits }
}

fn funct4(bits: u16) -> Field {
    Field::Constant {
        lo: 12,
        hi: 15,
        bits,
    }
}

fn con(lo: u8, hi: u8, bits: u16) -> Field {
    Field::Constant { lo, hi, bits }
}

fn reg(lo: u8, hi: u8) -> Field {
    Field::Register { lo, hi }
}

fn imm(lo: u8, hi: u8) -> Field {
    Field::Immediate(ImmediateSpec::contiguous(lo, hi, true))
}

fn imm_split(slices: Vec<ImmSlice>, signed: bool) -> Field {
    Field::Immediate(ImmediateSpec::split(slices, signed))
}

fn slice(word_lo: u8, word_hi: u8, imm_lo: u8, imm_hi: u8) -> ImmSlice {
    ImmSlice {
        word_lo,
        word_hi,
        imm_lo,
        imm_hi,
    }
}

fn comma() -> Field {
    Field::Punctuation(TokenKind::Comma)
}

fn lparen() -> Field {
    Field::Punctuation(TokenKind::LParen)
}

fn rparen() -> Field {
    Field::Punctuation(TokenKind::RParen)
}

// R-type: [opcode 0-2][funct3 3-5][rd/rs1 6-8][rs2 9-11][funct4 12-15]
fn r_type(f3: u16, f4: u16) -> Vec<Field> {
    vec![
        op(0b000),
        funct3(f3),
        reg(6, 8),
        comma(),
        reg(9, 11),
        funct4(f4),
    ]
}

// I-type: [opcode 0-2][funct3 3-5][rd 6-8][imm7 9-15]
fn i_type(f3: u16) -> Vec<Field> {
    vec![op(0b001), funct3(f3), reg(6, 8), comma(), imm(9, 15)]
}

// Shift immediates carry a sub-opcode in the top three bits.
fn shift_type(sub: u16) -> Vec<Field> {
    vec![
        op(0b001),
        funct3(0b011),
        reg(6, 8),
        comma(),
        imm(9, 12),
        con(13, 15, sub),
    ]
}

// B-type: [opcode 0-2][funct3 3-5][rs1 6-8][rs2 9-11][off4 12-15]
fn b_type(f3: u16) -> Vec<Field> {
    vec![
        op(0b010),
        funct3(f3),
        reg(6, 8),
        comma(),
        reg(9, 11),
        comma(),
        imm(12, 15),
    ]
}

// bz/bnz compare against zero and omit rs2.
fn bz_type(f3: u16) -> Vec<Field> {
    vec![op(0b010), funct3(f3), reg(6, 8), comma(), imm(12, 15)]
}

// S/L-type share the `op rd, off(rs)` shape: [opcode][funct3][rd/rs1 6-8]
// [rs2 9-11][off4 12-15].
fn mem_type(opcode: u16, f3: u16) -> Vec<Field> {
    vec![
        op(opcode),
        funct3(f3),
        reg(6, 8),
        comma(),
        imm(12, 15),
        lparen(),
        reg(9, 11),
        rparen(),
    ]
}

// U-type: logical immediate bits 7-15 land in word bits 3-5 and 9-14.
fn u_type(flag: u16) -> Vec<Field> {
    vec![
        op(0b110),
        reg(6, 8),
        comma(),
        imm_split(vec![slice(3, 5, 7, 9), slice(9, 14, 10, 15)], false),
        con(15, 15, flag),
    ]
}

pub static INSTRUCTION_FORMAT: LazyLock<HashMap<&'static str, Vec<Field>>> = LazyLock::new(|| {
    let mut table = HashMap::new();

    // R-type (opcode 000)
    table.insert("add", r_type(0b000, 0b0000));
    table.insert("sub", r_type(0b000, 0b0001));
    table.insert("slt", r_type(0b001, 0b0010));
    table.insert("sltu", r_type(0b010, 0b0011));
    table.insert("sll", r_type(0b011, 0b0100));
    table.insert("srl", r_type(0b011, 0b0101));
    table.insert("sra", r_type(0b011, 0b0110));
    table.insert("or", r_type(0b100, 0b0111));
    table.insert("and", r_type(0b101, 0b1000));
    table.insert("xor", r_type(0b110, 0b1001));
    table.insert("mv", r_type(0b111, 0b1010));
    // jr takes a single register; rs2 is hardwired to zero.
    table.insert(
        "jr",
        vec![
            op(0b000),
            funct3(0b000),
            reg(6, 8),
            con(9, 11, 0b000),
            funct4(0b1011),
        ],
    );
    table.insert("jalr", r_type(0b000, 0b1100));

    // I-type (opcode 001)
    table.insert("addi", i_type(0b000));
    table.insert("slti", i_type(0b001));
    table.insert("sltui", i_type(0b010));
    table.insert("slli", shift_type(0b001));
    table.insert("srli", shift_type(0b010));
    table.insert("srai", shift_type(0b100));
    table.insert("ori", i_type(0b100));
    table.insert("andi", i_type(0b101));
    table.insert("xori", i_type(0b110));
    table.insert("li", i_type(0b111));

    // B-type (opcode 010)
    table.insert("beq", b_type(0b000));
    table.insert("bne", b_type(0b001));
    table.insert("bz", bz_type(0b010));
    table.insert("bnz", bz_type(0b011));
    table.insert("blt", b_type(0b100));
    table.insert("bge", b_type(0b101));
    table.insert("bltu", b_type(0b110));
    table.insert("bgeu", b_type(0b111));

    // S-type (opcode 011): op rs1, off(rs2)
    table.insert("sb", mem_type(0b011, 0b000));
    table.insert("sw", mem_type(0b011, 0b001));

    // L-type (opcode 100): op rd, off(rs1)
    table.insert("lb", mem_type(0b100, 0b000));
    table.insert("lw", mem_type(0b100, 0b001));
    table.insert("lbu", mem_type(0b100, 0b100));

    // J-type (opcode 101). The plain jump drops logical bit 0 of the halved
    // offset; jal shares word bits 3-5 between rd and the low immediate bits.
    table.insert(
        "j",
        vec![
            op(0b101),
            imm_split(vec![slice(3, 5, 1, 3), slice(9, 14, 4, 9)], true),
            con(15, 15, 0),
        ],
    );
    table.insert(
        "jal",
        vec![
            op(0b101),
            reg(3, 5),
            comma(),
            imm_split(vec![slice(3, 5, 0, 2), slice(9, 14, 3, 8)], true),
            con(15, 15, 1),
        ],
    );

    // U-type (opcode 110)
    table.insert("lui", u_type(0));
    table.insert("auipc", u_type(1));

    // SYS-type (opcode 111)
    table.insert("ecall", vec![op(0b111), imm(6, 15)]);

    table
});

/// Fixed byte sizes of the pseudo-instructions, as the first pass charges
/// them against the location counter.
pub static PSEUDO_SIZES: LazyLock<HashMap<&'static str, u32>> = LazyLock::new(|| {
    HashMap::from([
        ("li16", 4),
        ("la", 4),
        ("push", 4),
        ("pop", 4),
        ("call", 2),
        ("ret", 2),
        ("inc", 2),
        ("dec", 2),
        ("neg", 4),
        ("not", 2),
        ("clr", 2),
        ("nop", 2),
    ])
});

/// Mnemonics whose immediate is a PC-relative half-word offset when it came
/// from a label.
pub const PC_RELATIVE: &[&str] = &[
    "j", "jal", "jr", "jalr", "beq", "bne", "bz", "bnz", "blt", "bge", "bltu", "bgeu",
];

pub fn is_instruction(mnemonic: &str) -> bool {
    INSTRUCTION_FORMAT.contains_key(mnemonic)
}

pub fn is_pseudo(mnemonic: &str) -> bool {
    PSEUDO_SIZES.contains_key(mnemonic)
}
