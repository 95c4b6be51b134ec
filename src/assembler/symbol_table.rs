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

use crate::assembler::layout::Section;
use crate::isa::DEFAULT_SYMBOLS;
use serde::Serialize;
use std::collections::HashMap;

/// A label or constant. Labels store their offset within the owning section;
/// the absolute address is `value + layout[section]`. `Const` symbols carry a
/// literal value and are never offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub value: i32,
    pub section: Section,
    pub defined: bool,
    pub global: bool,
    pub line: usize,
}

pub type SymbolTable = HashMap<String, Symbol>;

/// A fresh table pre-seeded with the well-known addresses, so source can say
/// `la x1, STACK_TOP` without defining them itself.
pub fn with_default_symbols() -> SymbolTable {
    let mut table = SymbolTable::new();
    for (name, value) in DEFAULT_SYMBOLS {
        table.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                value: *value as i32,
                section: Section::Const,
                defined: true,
                global: false,
                line: 0,
            },
        );
    }
    table
}
