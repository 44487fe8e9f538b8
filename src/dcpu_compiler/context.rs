// Per-compilation root state: the slot allocator and the label counter.

use crate::dcpu_compiler::config::CompilerConfig;
use crate::dcpu_compiler::labels::LabelGenerator;
use crate::dcpu_compiler::scope::SlotAllocator;

#[derive(Debug, Default)]
pub struct ProgramContext {
    pub slots: SlotAllocator,
    pub labels: LabelGenerator,
}

impl ProgramContext {
    pub fn new(config: &CompilerConfig) -> Self {
        ProgramContext {
            slots: SlotAllocator::new(config.variable_range(), config.memory.screen_address),
            labels: LabelGenerator::new(),
        }
    }
}
