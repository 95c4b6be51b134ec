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

//! First pass: two sweeps over the token stream.
//!
//! Sweep A collects `.equ`/`.set` constants and deletes their tokens so the
//! layout sweep never sees them. Sweep B defines labels, sizes instructions
//! and pseudo-instructions against the per-section location counters, and
//! processes the layout and data directives. The pass ends by fixing the
//! memory layout: data is packed after code, bss after data.

use crate::assembler::layout::{MemoryLayout, Section, SectionPointers, org_target};
use crate::assembler::symbol_table::{Symbol, SymbolTable, with_default_symbols};
use crate::bits;
use crate::diagnostics::Diagnostics;
use crate::isa;
use crate::token::{Token, TokenKind};

/// Everything the second pass needs: the (mutated) token stream, the symbol
/// table, and the final section bases.
#[derive(Debug)]
pub struct FirstPassResult {
    pub tokens: Vec<Token>,
    pub symbol_table: SymbolTable,
    pub memory_layout: MemoryLayout,
}

pub fn run(tokens: Vec<Token>, diag: &mut Diagnostics) -> FirstPassResult {
    let mut pass = FirstPass {
        tokens,
        pos: 0,
        symbol_table: with_default_symbols(),
        current_section: Section::Text,
        pointers: SectionPointers::default(),
        diag,
    };
    pass.collect_constants();
    pass.run_layout();

    let memory_layout = MemoryLayout::from_section_sizes(&pass.pointers);
    FirstPassResult {
        tokens: pass.tokens,
        symbol_table: pass.symbol_table,
        memory_layout,
    }
}

struct FirstPass<'a> {
    tokens: Vec<Token>,
    pos: usize,
    symbol_table: SymbolTable,
    current_section: Section,
    pointers: SectionPointers,
    diag: &'a mut Diagnostics,
}

impl FirstPass<'_> {
    // --- token cursor ---
    // The lexer guarantees a trailing Eof token; the cursor never moves past
    // it and deletion never removes it.

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + 1).min(last)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    /// Step to the next token, removing the current one from the stream.
    fn advance_and_delete(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.tokens.remove(self.pos);
        }
    }

    fn skip_to_newline(&mut self) {
        while !matches!(self.current().kind, TokenKind::Newline | TokenKind::Eof) {
            self.advance();
        }
    }

    fn error_here(&mut self, message: String) {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        let (line, column) = (token.line, token.column);
        self.diag.add_error(message, line, column);
    }

    fn define_symbol(&mut self, name: &str, value: i32, section: Section, line: usize) {
        if let Some(existing) = self.symbol_table.get(name) {
            if existing.defined {
                self.diag
                    .add_error(format!("Symbol '{}' already defined", name), line, 0);
                return;
            }
        }
        self.symbol_table.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                value,
                section,
                defined: true,
                global: false,
                line,
            },
        );
    }

    // --- sweep A: constants ---

    fn collect_constants(&mut self) {
        while self.current().kind != TokenKind::Eof {
            if self.current().kind == TokenKind::Directive
                && matches!(self.current().text.as_str(), ".equ" | ".set")
            {
                self.parse_constant();
            }
            self.advance();
        }
        self.pos = 0;
    }

    /// `.equ NAME, value` / `.set NAME, value`: defines a `const` symbol and
    /// removes all four tokens so sweep B does not re-scan them.
    fn parse_constant(&mut self) {
        let line = self.current().line;
        if self.peek().kind != TokenKind::Identifier {
            self.error_here("Expected identifier after directive".to_string());
            return;
        }
        self.advance_and_delete(); // drop the directive, land on the name
        let identifier = self.current().text.clone();
        if self.peek().kind != TokenKind::Comma {
            self.error_here("Expected comma after identifier".to_string());
            return;
        }
        self.advance_and_delete(); // drop the name, land on the comma
        if !matches!(
            self.peek().kind,
            TokenKind::Immediate | TokenKind::Character
        ) {
            self.error_here("Expected immediate or character value after comma".to_string());
            return;
        }
        self.advance_and_delete(); // drop the comma, land on the value
        let text = self.current().text.clone();
        match bits::parse_int(&text) {
            Ok(value) => self.define_symbol(&identifier, value, Section::Const, line),
            Err(_) => self.error_here(format!("Invalid numeric literal '{}'", text)),
        }
        self.advance_and_delete(); // drop the value
    }

    // --- sweep B: layout and sizing ---

    fn run_layout(&mut self) {
        while self.current().kind != TokenKind::Eof {
            match self.current().kind {
                TokenKind::Label => self.parse_label(),
                TokenKind::Identifier => self.parse_instruction_line(),
                TokenKind::Directive => self.parse_directive(),
                _ => {}
            }
            if !matches!(self.current().kind, TokenKind::Newline | TokenKind::Eof) {
                self.error_here(format!("Unexpected token '{}'", self.current().text));
            }
            self.advance();
        }
    }

    /// Labels stand on their own line; the token is removed once the symbol
    /// is defined so the second pass only ever sees code and data lines.
    fn parse_label(&mut self) {
        let token = self.current().clone();
        let value = self.pointers.get(self.current_section) as i32;
        self.define_symbol(&token.text, value, self.current_section, token.line);
        self.advance_and_delete();
    }

    fn parse_instruction_line(&mut self) {
        let mnemonic = self.current().text.to_lowercase();
        if isa::is_instruction(&mnemonic) {
            self.pointers.advance(self.current_section, 2);
        } else if let Some(size) = isa::PSEUDO_SIZES.get(mnemonic.as_str()) {
            self.pointers.advance(self.current_section, *size);
        }

        // Consume the operands; character literals become immediates here so
        // the encoder deals with one numeric token kind only.
        while !matches!(self.current().kind, TokenKind::Newline | TokenKind::Eof) {
            if self.current().kind == TokenKind::Character {
                self.tokens[self.pos].kind = TokenKind::Immediate;
            }
            self.advance();
        }
    }

    fn parse_directive(&mut self) {
        let directive = self.current().text.to_lowercase();
        let line = self.current().line;
        match directive.as_str() {
            ".text" | ".data" | ".bss" => {
                if let Some(section) = Section::from_directive(&directive) {
                    self.current_section = section;
                }
                self.advance();
            }
            ".org" => self.parse_org(line),
            ".byte" => self.parse_data_values(".byte", line, 1, 255),
            ".word" => self.parse_data_values(".word", line, 2, 65535),
            ".string" | ".ascii" => self.parse_string(&directive, line),
            ".space" => self.parse_space(line),
            ".fill" => self.parse_fill(line),
            other => {
                self.diag
                    .add_error(format!("Unknown directive '{}'", other), line, 0);
                self.advance();
            }
        }
    }

    /// `.org N`: an absolute set of the location counter, legal only in the
    /// code sections. The counters stay section-relative, so text addresses
    /// are stored minus `CODE_START`.
    fn parse_org(&mut self, line: usize) {
        if !matches!(self.current_section, Section::Text | Section::Inter) {
            self.diag.add_error(
                format!(
                    ".org directive can only be used in the .text or .inter sections, not in {}",
                    self.current_section
                ),
                line,
                0,
            );
            self.skip_to_newline();
            return;
        }
        if self.peek().kind != TokenKind::Immediate {
            self.diag
                .add_error("Expected immediate value after .org directive".to_string(), line, 0);
            self.skip_to_newline();
            return;
        }
        self.advance();
        let text = self.current().text.clone();
        match bits::parse_int(&text) {
            Ok(value) => match org_target(value) {
                Ok((section, address)) => {
                    self.current_section = section;
                    let relative = if section == Section::Inter {
                        address
                    } else {
                        address - crate::isa::CODE_START
                    };
                    self.pointers.set(section, relative);
                }
                Err(message) => self.diag.add_error(message, line, 0),
            },
            Err(_) => self.error_here(format!("Invalid numeric literal '{}'", text)),
        }
        self.advance();
    }

    fn require_data_section(&mut self, directive: &str, line: usize) -> bool {
        if !matches!(self.current_section, Section::Data | Section::Bss) {
            self.diag.add_error(
                format!(
                    "{} directive can only be used in the .data or .bss sections, not in {}",
                    directive, self.current_section
                ),
                line,
                0,
            );
            self.skip_to_newline();
            return false;
        }
        true
    }

    /// `.byte v, v, ...` and `.word v, v, ...`: range-check every value and
    /// advance the counter by the element size.
    fn parse_data_values(&mut self, directive: &str, line: usize, size: u32, max: i32) {
        if !self.require_data_section(directive, line) {
            return;
        }
        if !matches!(
            self.peek().kind,
            TokenKind::Immediate | TokenKind::Character
        ) {
            self.diag.add_error(
                format!(
                    "Expected immediate or character value after {} directive",
                    directive
                ),
                line,
                0,
            );
            self.skip_to_newline();
            return;
        }
        loop {
            self.advance(); // onto the value
            let text = self.current().text.clone();
            match bits::parse_int(&text) {
                Ok(value) if value < 0 || value > max => {
                    self.error_here(format!(
                        "Value {:#04x} is out of range for {} directive (0-{})",
                        value, directive, max
                    ));
                    self.skip_to_newline();
                    return;
                }
                Ok(_) => self.pointers.advance(self.current_section, size),
                Err(_) => {
                    self.error_here(format!("Invalid numeric literal '{}'", text));
                    self.skip_to_newline();
                    return;
                }
            }
            if self.peek().kind != TokenKind::Comma {
                break;
            }
            self.advance(); // onto the comma
            if !matches!(
                self.peek().kind,
                TokenKind::Immediate | TokenKind::Character
            ) {
                // trailing comma
                let (text, line, column) = {
                    let next = self.peek();
                    (next.text.clone(), next.line, next.column)
                };
                self.diag.add_error(
                    format!("Unexpected token '{}' after {} directive", text.trim(), directive),
                    line,
                    column,
                );
                break;
            }
        }
        self.advance();
    }

    /// `.string` reserves the characters plus a NUL terminator; `.ascii`
    /// reserves the characters only.
    fn parse_string(&mut self, directive: &str, line: usize) {
        if !self.require_data_section(directive, line) {
            return;
        }
        if self.peek().kind != TokenKind::String {
            self.diag
                .add_error(format!("Expected string after {}", directive), line, 0);
            self.skip_to_newline();
            return;
        }
        self.advance();
        let mut length = self.current().text.chars().count() as u32;
        if directive == ".string" {
            length += 1; // NUL terminator
        }
        self.pointers.advance(self.current_section, length);
        self.advance();
    }

    fn parse_space(&mut self, line: usize) {
        if !self.require_data_section(".space", line) {
            return;
        }
        if self.peek().kind != TokenKind::Immediate {
            self.diag
                .add_error("Expected size after .space directive".to_string(), line, 0);
            self.skip_to_newline();
            return;
        }
        self.advance();
        let text = self.current().text.clone();
        match bits::parse_int(&text) {
            Ok(size) if size >= 0 => self.pointers.advance(self.current_section, size as u32),
            Ok(size) => {
                self.error_here(format!("Size {} for .space directive cannot be negative", size))
            }
            Err(_) => self.error_here(format!("Invalid numeric literal '{}'", text)),
        }
        self.advance();
    }

    /// `.fill count, size, value`: `count` items of `size` bytes (1 or 2)
    /// each, `count*size` capped at the memory size, `value` within the item
    /// width.
    fn parse_fill(&mut self, line: usize) {
        if !self.require_data_section(".fill", line) {
            return;
        }
        let Some(count) = self.expect_immediate("Expected item count after .fill directive", line)
        else {
            return;
        };
        if count < 0 {
            self.error_here(format!(
                "Item count {} for .fill directive cannot be negative",
                count
            ));
            self.skip_to_newline();
            return;
        }
        if !self.expect_comma("Expected comma after item count in .fill directive", line) {
            return;
        }
        let Some(size) = self.expect_immediate("Expected fill size after comma in .fill directive", line)
        else {
            return;
        };
        if size != 1 && size != 2 {
            self.error_here(format!("Fill size must be 1 or 2 bytes, not {}", size));
            self.skip_to_newline();
            return;
        }
        if count as i64 * size as i64 > crate::isa::MEM_SIZE as i64 {
            self.error_here(format!(
                "Total size for .fill directive ({}) exceeds {} bytes",
                count as i64 * size as i64,
                crate::isa::MEM_SIZE
            ));
            self.skip_to_newline();
            return;
        }
        if !self.expect_comma("Expected comma after fill size in .fill directive", line) {
            return;
        }
        let Some(value) = self.expect_immediate("Expected fill value after comma in .fill directive", line)
        else {
            return;
        };
        let max = if size == 1 { 255 } else { 65535 };
        if value < 0 || value > max {
            self.error_here(format!(
                "Value {:#04x} is out of range for .fill directive (0-{})",
                value, max
            ));
            self.skip_to_newline();
            return;
        }
        self.pointers
            .advance(self.current_section, (count * size) as u32);
        self.advance();
    }

    fn expect_immediate(&mut self, message: &str, line: usize) -> Option<i32> {
        if self.peek().kind != TokenKind::Immediate {
            self.diag.add_error(message.to_string(), line, 0);
            self.skip_to_newline();
            return None;
        }
        self.advance();
        let text = self.current().text.clone();
        match bits::parse_int(&text) {
            Ok(value) => Some(value),
            Err(_) => {
                self.error_here(format!("Invalid numeric literal '{}'", text));
                self.skip_to_newline();
                None
            }
        }
    }

    fn expect_comma(&mut self, message: &str, line: usize) -> bool {
        if self.peek().kind != TokenKind::Comma {
            self.diag.add_error(message.to_string(), line, 0);
            self.skip_to_newline();
            return false;
        }
        self.advance();
        true
    }
}
