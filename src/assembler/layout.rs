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

use crate::isa::{CODE_START, INT_VECTORS, MMIO_BASE};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Section {
    #[serde(rename = ".inter")]
    Inter,
    #[serde(rename = ".text")]
    Text,
    #[serde(rename = ".data")]
    Data,
    #[serde(rename = ".bss")]
    Bss,
    #[serde(rename = "const")]
    Const,
}

impl Section {
    pub fn from_directive(name: &str) -> Option<Section> {
        match name {
            ".text" => Some(Section::Text),
            ".data" => Some(Section::Data),
            ".bss" => Some(Section::Bss),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Inter => ".inter",
            Section::Text => ".text",
            Section::Data => ".data",
            Section::Bss => ".bss",
            Section::Const => "const",
        };
        f.write_str(name)
    }
}

/// Per-section location counters. During the first pass these are offsets
/// relative to each section's base; the second pass reinitializes them from
/// the computed layout and uses them as absolute write cursors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SectionPointers {
    pub inter: u32,
    pub text: u32,
    pub data: u32,
    pub bss: u32,
}

impl SectionPointers {
    pub fn get(&self, section: Section) -> u32 {
        match section {
            Section::Inter => self.inter,
            Section::Text => self.text,
            Section::Data => self.data,
            Section::Bss => self.bss,
            // const symbols carry literal values and have no cursor
            Section::Const => 0,
        }
    }

    pub fn set(&mut self, section: Section, value: u32) {
        match section {
            Section::Inter => self.inter = value,
            Section::Text => self.text = value,
            Section::Data => self.data = value,
            Section::Bss => self.bss = value,
            Section::Const => {}
        }
    }

    pub fn advance(&mut self, section: Section, by: u32) {
        self.set(section, self.get(section) + by);
    }
}

/// Base address of each section, fixed at the end of the first pass: data is
/// packed after the code, bss after data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    pub inter: u32,
    pub text: u32,
    pub data: u32,
    pub bss: u32,
}

impl MemoryLayout {
    pub fn from_section_sizes(pointers: &SectionPointers) -> Self {
        let data = pointers.text + CODE_START;
        Self {
            inter: INT_VECTORS,
            text: CODE_START,
            data,
            bss: data + pointers.data,
        }
    }

    pub fn base(&self, section: Section) -> u32 {
        match section {
            Section::Inter => self.inter,
            Section::Text => self.text,
            Section::Data => self.data,
            Section::Bss => self.bss,
            Section::Const => 0,
        }
    }

    /// Absolute write cursors for the second pass.
    pub fn pointers(&self) -> SectionPointers {
        SectionPointers {
            inter: self.inter,
            text: self.text,
            data: self.data,
            bss: self.bss,
        }
    }
}

/// Which section an `.org` directive selects, after validation: the target
/// must be even and below the MMIO window; addresses under `CODE_START` land
/// in the interrupt-vector section.
pub fn org_target(value: i32) -> Result<(Section, u32), String> {
    if value % 2 != 0 {
        return Err(format!(
            "Value {:#06x} is not aligned (not a multiple of 2) for .org directive",
            value
        ));
    }
    if value < 0 || value as u32 >= MMIO_BASE {
        return Err(format!(
            "Value {:#06x} out of range for .org directive (0-{:#06x})",
            value,
            MMIO_BASE - 1
        ));
    }
    let value = value as u32;
    if value < CODE_START {
        Ok((Section::Inter, value))
    } else {
        Ok((Section::Text, value))
    }
}
