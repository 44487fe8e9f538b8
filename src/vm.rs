use crate::dcpu_compiler::assembly::{Line, Listing, Opcode, Operand, Register, SpecialOpcode};
use indexmap::IndexMap;
use log::{debug, trace};

/// DCPU-16 address space, in words
const MEMORY_WORDS: usize = 0x10000;

/// Default instruction limit for `run`
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// Words of display memory shown by `display` (32x12 cells)
pub const DISPLAY_WORDS: usize = 0x180;

/// Executes assembly listings one line at a time.
///
/// Instructions are addressed by their index in the listing (labels don't take a slot),
/// so `PC`, return addresses and label operands are instruction indices rather than
/// word addresses. Memory, the register file and the stack behave like the DCPU-16:
/// 64K words, `PUSH`/`POP` move `SP` downward from the top of memory, conditionals skip
/// the next instruction (and any chain of conditionals after it) when they fail.
///
/// A jump to the instruction that performs it (`:end` / `set PC, end`) halts the
/// machine, as does running off the end of the listing.
pub struct Machine {
    program: Vec<Line>,
    labels: IndexMap<String, usize>,
    memory: Vec<u16>,
    registers: [u16; 8],
    pc: usize,
    sp: u16,
    stack_depth: usize,
    steps: usize,
    halted: bool,
}

impl Machine {
    /// Load a listing, resolving every label up front.
    pub fn from_listing(listing: &Listing) -> Result<Self, String> {
        let mut program = Vec::new();
        let mut labels = IndexMap::new();

        for line in listing.lines() {
            match line {
                Line::Label(name) => {
                    if labels.insert(name.clone(), program.len()).is_some() {
                        return Err(format!("Duplicate label '{}'", name));
                    }
                }
                instruction => program.push(instruction.clone()),
            }
        }

        for line in &program {
            for operand in operands(line) {
                if let Operand::Label(name) = operand {
                    if !labels.contains_key(name) {
                        return Err(format!("Unknown label '{}'", name));
                    }
                }
            }
        }

        debug!(
            "loaded {} instructions, {} labels",
            program.len(),
            labels.len()
        );

        Ok(Machine {
            program,
            labels,
            memory: vec![0; MEMORY_WORDS],
            registers: [0; 8],
            pc: 0,
            sp: 0,
            stack_depth: 0,
            steps: 0,
            halted: false,
        })
    }

    /// Parse assembly text and load it.
    pub fn assemble(source: &str) -> Result<Self, String> {
        let listing: Listing = source.parse()?;
        Self::from_listing(&listing)
    }

    pub fn read(&self, address: u16) -> u16 {
        self.memory[address as usize]
    }

    pub fn write(&mut self, address: u16, value: u16) {
        self.memory[address as usize] = value;
    }

    pub fn register(&self, register: Register) -> u16 {
        match register {
            Register::Pc => self.pc as u16,
            Register::Sp => self.sp,
            general => general.index().map(|i| self.registers[i]).unwrap_or(0),
        }
    }

    pub fn register_a(&self) -> u16 {
        self.registers[0]
    }

    /// `DISPLAY_WORDS` words of memory starting at `base`.
    pub fn display(&self, base: u16) -> &[u16] {
        let start = base as usize;
        let end = (start + DISPLAY_WORDS).min(MEMORY_WORDS);
        &self.memory[start..end]
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn label_index(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run until halted. Fails if `max_steps` instructions execute without halting.
    pub fn run(&mut self, max_steps: usize) -> Result<usize, String> {
        let start = self.steps;
        while !self.halted {
            if self.steps - start >= max_steps {
                return Err(format!(
                    "Step limit of {} exceeded at instruction {}",
                    max_steps, self.pc
                ));
            }
            self.step()?;
        }
        debug!("halted after {} steps, a = {}", self.steps, self.register_a());
        Ok(self.steps - start)
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<(), String> {
        if self.halted {
            return Ok(());
        }
        let Some(line) = self.program.get(self.pc).cloned() else {
            trace!("ran off the end at {}", self.pc);
            self.halted = true;
            return Ok(());
        };

        trace!("{:4}: {}", self.pc, line);
        let current = self.pc;
        self.steps += 1;
        self.pc += 1;

        match line {
            Line::Basic { op, b, a } => self.execute_basic(op, &b, &a, current)?,
            Line::Special {
                op: SpecialOpcode::Jsr,
                a,
            } => {
                let target = self.load(&a)?;
                let return_to = self.pc as u16;
                self.push(return_to);
                self.jump(target as usize, current);
            }
            Line::Label(_) => unreachable!("labels are stripped at load time"),
        }
        Ok(())
    }

    fn execute_basic(
        &mut self,
        op: Opcode,
        b: &Operand,
        a: &Operand,
        current: usize,
    ) -> Result<(), String> {
        // a is evaluated before b
        let a_value = self.load(a)?;

        if op.is_conditional() {
            let b_value = self.load(b)?;
            let pass = match op {
                Opcode::Ife => b_value == a_value,
                Opcode::Ifn => b_value != a_value,
                Opcode::Ifg => b_value > a_value,
                Opcode::Ifl => b_value < a_value,
                _ => unreachable!(),
            };
            if !pass {
                self.skip();
            }
            return Ok(());
        }

        let result = if op == Opcode::Set {
            a_value
        } else {
            let b_value = self.load(b)?;
            match op {
                Opcode::Add => b_value.wrapping_add(a_value),
                Opcode::Sub => b_value.wrapping_sub(a_value),
                Opcode::Mul => b_value.wrapping_mul(a_value),
                Opcode::Div => b_value.checked_div(a_value).unwrap_or(0),
                Opcode::Mod => b_value.checked_rem(a_value).unwrap_or(0),
                Opcode::And => b_value & a_value,
                Opcode::Bor => b_value | a_value,
                Opcode::Xor => b_value ^ a_value,
                Opcode::Shl => b_value.checked_shl(a_value as u32).unwrap_or(0),
                Opcode::Shr => b_value.checked_shr(a_value as u32).unwrap_or(0),
                _ => unreachable!(),
            }
        };

        self.store(b, result, current)
    }

    /// Skip the next instruction, and keep going while skipping conditionals.
    fn skip(&mut self) {
        while let Some(line) = self.program.get(self.pc) {
            self.pc += 1;
            match line {
                Line::Basic { op, .. } if op.is_conditional() => continue,
                _ => break,
            }
        }
    }

    fn jump(&mut self, target: usize, current: usize) {
        if target == current {
            trace!("halt loop at {}", current);
            self.halted = true;
        }
        self.pc = target;
    }

    fn load(&mut self, operand: &Operand) -> Result<u16, String> {
        match operand {
            Operand::Register(reg) => Ok(self.register(*reg)),
            Operand::Indirect(reg) => Ok(self.read(self.register(*reg))),
            Operand::Memory(address) => Ok(self.read(*address)),
            Operand::Address(value) | Operand::Literal(value) => Ok(*value),
            Operand::Label(name) => self
                .label_index(name)
                .map(|index| index as u16)
                .ok_or_else(|| format!("Unknown label '{}'", name)),
            Operand::Pop => self.pop(),
            Operand::Push => Err("PUSH cannot be read".to_string()),
        }
    }

    fn store(&mut self, operand: &Operand, value: u16, current: usize) -> Result<(), String> {
        match operand {
            Operand::Register(Register::Pc) => self.jump(value as usize, current),
            Operand::Register(Register::Sp) => self.sp = value,
            Operand::Register(reg) => {
                if let Some(index) = reg.index() {
                    self.registers[index] = value;
                }
            }
            Operand::Indirect(reg) => {
                let address = self.register(*reg);
                self.write(address, value);
            }
            Operand::Memory(address) => self.write(*address, value),
            Operand::Push => self.push(value),
            Operand::Pop => return Err("POP cannot be written".to_string()),
            // writes to literals are silently dropped
            Operand::Address(_) | Operand::Literal(_) | Operand::Label(_) => {}
        }
        Ok(())
    }

    fn push(&mut self, value: u16) {
        self.sp = self.sp.wrapping_sub(1);
        self.memory[self.sp as usize] = value;
        self.stack_depth += 1;
    }

    fn pop(&mut self) -> Result<u16, String> {
        if self.stack_depth == 0 {
            return Err(format!("Stack underflow at instruction {}", self.pc - 1));
        }
        let value = self.memory[self.sp as usize];
        self.sp = self.sp.wrapping_add(1);
        self.stack_depth -= 1;
        Ok(value)
    }
}

fn operands(line: &Line) -> Vec<&Operand> {
    match line {
        Line::Basic { b, a, .. } => vec![b, a],
        Line::Special { a, .. } => vec![a],
        Line::Label(_) => Vec::new(),
    }
}

#[cfg(test)]
#[path = "vm_tests.rs"]
mod tests;
