// Compiler configuration
//
// Loaded from TOML; every field has a default so an empty file is valid.
//
//   [memory]
//   variable_start = 0x2000
//   variable_end = 0x7000
//   screen_address = 0x8000
//
//   [output]
//   halt_epilogue = true

use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::Deserialize;

use crate::dcpu_compiler::error::CompilerError;
use crate::dcpu_compiler::scope::{Address, SCREEN_ADDRESS, VARIABLE_ADDRESS_RANGE};

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    pub memory: MemoryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// First address handed out to variables and scratch slots.
    pub variable_start: Address,
    /// Last address handed out (inclusive).
    pub variable_end: Address,
    /// Base of the memory-mapped display named by `screen`.
    pub screen_address: Address,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            variable_start: *VARIABLE_ADDRESS_RANGE.start(),
            variable_end: *VARIABLE_ADDRESS_RANGE.end(),
            screen_address: SCREEN_ADDRESS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Append `:end` / `set PC, end` when the program defines no `end` routine.
    pub halt_epilogue: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            halt_epilogue: true,
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, CompilerError> {
        let config: CompilerConfig =
            toml::from_str(source).map_err(|err| CompilerError::ConfigError(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CompilerError> {
        let source = fs::read_to_string(path)
            .map_err(|err| CompilerError::IOError(format!("{}: {}", path.display(), err)))?;
        log::debug!("loaded configuration from {}", path.display());
        Self::from_toml_str(&source)
    }

    pub fn variable_range(&self) -> RangeInclusive<Address> {
        self.memory.variable_start..=self.memory.variable_end
    }

    pub fn validate(&self) -> Result<(), CompilerError> {
        let memory = &self.memory;
        if memory.variable_start > memory.variable_end {
            return Err(CompilerError::ConfigError(format!(
                "variable_start {:#06x} is above variable_end {:#06x}",
                memory.variable_start, memory.variable_end
            )));
        }
        if self.variable_range().contains(&memory.screen_address) {
            return Err(CompilerError::ConfigError(format!(
                "screen_address {:#06x} lies inside the variable range",
                memory.screen_address
            )));
        }
        Ok(())
    }
}
