//! DCPU-16 assembly model and listing emitter
//!
//! The lowering engine builds a [`Listing`] of typed [`Line`]s; `Display` turns it into
//! the textual assembly, one instruction or label per line. The same types parse text
//! back (`FromStr`) so the listing machine in [`crate::vm`] can execute what we emit.
//!
//! # Conventions
//!
//! - Basic instructions are written `mnemonic b, a`: `b` is the destination,
//!   `a` the source (`set [0x2000], a` stores the accumulator).
//! - Labels stand on their own line and start with `:`.
//! - Conditional instructions (`ife`, `ifn`, `ifg`, `ifl`) skip the next instruction
//!   when their test fails.
//! - Memory operands are written as four-digit hex in brackets, e.g. `[0x2000]`;
//!   address literals (reference mode) as bare hex, integer literals in decimal.

use std::fmt;
use std::str::FromStr;

use crate::dcpu_compiler::scope::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    A,
    B,
    C,
    X,
    Y,
    Z,
    I,
    J,
    Pc,
    Sp,
}

impl Register {
    /// Index into the general-purpose register file, `None` for PC/SP.
    pub fn index(self) -> Option<usize> {
        match self {
            Register::A => Some(0),
            Register::B => Some(1),
            Register::C => Some(2),
            Register::X => Some(3),
            Register::Y => Some(4),
            Register::Z => Some(5),
            Register::I => Some(6),
            Register::J => Some(7),
            Register::Pc | Register::Sp => None,
        }
    }

    fn from_name(name: &str) -> Option<Register> {
        match name.to_ascii_lowercase().as_str() {
            "a" => Some(Register::A),
            "b" => Some(Register::B),
            "c" => Some(Register::C),
            "x" => Some(Register::X),
            "y" => Some(Register::Y),
            "z" => Some(Register::Z),
            "i" => Some(Register::I),
            "j" => Some(Register::J),
            "pc" => Some(Register::Pc),
            "sp" => Some(Register::Sp),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Register::A => "a",
            Register::B => "b",
            Register::C => "c",
            Register::X => "x",
            Register::Y => "y",
            Register::Z => "z",
            Register::I => "i",
            Register::J => "j",
            Register::Pc => "PC",
            Register::Sp => "SP",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    /// `[a]` - memory at the address held in a register
    Indirect(Register),
    /// `[0x2000]` - memory at a fixed address
    Memory(Address),
    /// `0x2000` - an address used as a value
    Address(Address),
    /// `42`
    Literal(u16),
    Label(String),
    Push,
    Pop,
}

impl Operand {
    pub const A: Operand = Operand::Register(Register::A);
    pub const PC: Operand = Operand::Register(Register::Pc);
    pub const AT_A: Operand = Operand::Indirect(Register::A);

    pub fn label(name: &str) -> Operand {
        Operand::Label(name.to_string())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "{}", reg),
            Operand::Indirect(reg) => write!(f, "[{}]", reg),
            Operand::Memory(address) => write!(f, "[{:#06x}]", address),
            Operand::Address(address) => write!(f, "{:#06x}", address),
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Label(name) => write!(f, "{}", name),
            Operand::Push => write!(f, "PUSH"),
            Operand::Pop => write!(f, "POP"),
        }
    }
}

impl FromStr for Operand {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty operand".to_string());
        }

        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            let inner = inner.trim();
            if let Some(reg) = Register::from_name(inner) {
                return Ok(Operand::Indirect(reg));
            }
            return parse_number(inner)
                .map(Operand::Memory)
                .ok_or_else(|| format!("unsupported memory operand '{}'", text));
        }

        if let Some(reg) = Register::from_name(text) {
            return Ok(Operand::Register(reg));
        }

        match text.to_ascii_uppercase().as_str() {
            "PUSH" => return Ok(Operand::Push),
            "POP" => return Ok(Operand::Pop),
            _ => {}
        }

        if text.starts_with("0x") || text.starts_with("0X") {
            return parse_number(text)
                .map(Operand::Address)
                .ok_or_else(|| format!("invalid hex literal '{}'", text));
        }
        if text.chars().all(|ch| ch.is_ascii_digit()) {
            return text
                .parse::<u16>()
                .map(Operand::Literal)
                .map_err(|_| format!("literal '{}' does not fit in a word", text));
        }
        if text.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
            return Ok(Operand::Label(text.to_string()));
        }

        Err(format!("unrecognised operand '{}'", text))
    }
}

fn parse_number(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<u16>().ok()
    }
}

/// Two-operand ("basic") instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// set b, a - b = a
    Set,
    /// add b, a - b = b + a
    Add,
    /// sub b, a - b = b - a
    Sub,
    /// mul b, a - b = b * a
    Mul,
    /// div b, a - b = b / a (0 when a is 0)
    Div,
    /// mod b, a - b = b % a (0 when a is 0)
    Mod,
    /// and b, a - bitwise and
    And,
    /// bor b, a - bitwise or
    Bor,
    /// xor b, a - bitwise exclusive or
    Xor,
    /// shl b, a - b = b << a
    Shl,
    /// shr b, a - b = b >> a (logical)
    Shr,
    /// ife b, a - run next instruction only if b == a
    Ife,
    /// ifn b, a - run next instruction only if b != a
    Ifn,
    /// ifg b, a - run next instruction only if b > a (unsigned)
    Ifg,
    /// ifl b, a - run next instruction only if b < a (unsigned)
    Ifl,
}

const OPCODE_TABLE: &[(Opcode, &str)] = &[
    (Opcode::Set, "set"),
    (Opcode::Add, "add"),
    (Opcode::Sub, "sub"),
    (Opcode::Mul, "mul"),
    (Opcode::Div, "div"),
    (Opcode::Mod, "mod"),
    (Opcode::And, "and"),
    (Opcode::Bor, "bor"),
    (Opcode::Xor, "xor"),
    (Opcode::Shl, "shl"),
    (Opcode::Shr, "shr"),
    (Opcode::Ife, "ife"),
    (Opcode::Ifn, "ifn"),
    (Opcode::Ifg, "ifg"),
    (Opcode::Ifl, "ifl"),
];

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        OPCODE_TABLE
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, name)| *name)
            .unwrap_or("???")
    }

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        let name = name.to_ascii_lowercase();
        OPCODE_TABLE
            .iter()
            .find(|(_, mnemonic)| *mnemonic == name)
            .map(|(op, _)| *op)
    }

    pub fn is_conditional(self) -> bool {
        matches!(self, Opcode::Ife | Opcode::Ifn | Opcode::Ifg | Opcode::Ifl)
    }
}

/// One-operand ("special") instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialOpcode {
    /// jsr a - push the return address, jump to a
    Jsr,
}

impl SpecialOpcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            SpecialOpcode::Jsr => "jsr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Label(String),
    Basic { op: Opcode, b: Operand, a: Operand },
    Special { op: SpecialOpcode, a: Operand },
}

impl Line {
    pub fn label(name: &str) -> Line {
        Line::Label(name.to_string())
    }

    pub fn basic(op: Opcode, b: Operand, a: Operand) -> Line {
        Line::Basic { op, b, a }
    }

    pub fn set(b: Operand, a: Operand) -> Line {
        Line::basic(Opcode::Set, b, a)
    }

    /// `set PC, label`
    pub fn jump(label: &str) -> Line {
        Line::set(Operand::PC, Operand::label(label))
    }

    /// `set PC, POP`
    pub fn ret() -> Line {
        Line::set(Operand::PC, Operand::Pop)
    }

    pub fn jsr(target: &str) -> Line {
        Line::Special {
            op: SpecialOpcode::Jsr,
            a: Operand::label(target),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Line::Label(name) => write!(f, ":{}", name),
            Line::Basic { op, b, a } => write!(f, "{} {}, {}", op.mnemonic(), b, a),
            Line::Special { op, a } => write!(f, "{} {}", op.mnemonic(), a),
        }
    }
}

impl FromStr for Line {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if let Some(name) = text.strip_prefix(':') {
            let name = name.trim();
            if name.is_empty() {
                return Err("empty label".to_string());
            }
            return Ok(Line::label(name));
        }

        let (mnemonic, rest) = match text.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic, rest.trim()),
            None => (text, ""),
        };

        if mnemonic.eq_ignore_ascii_case(SpecialOpcode::Jsr.mnemonic()) {
            return Ok(Line::Special {
                op: SpecialOpcode::Jsr,
                a: rest.parse()?,
            });
        }

        let op = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| format!("unknown mnemonic '{}'", mnemonic))?;
        let (b, a) = rest
            .split_once(',')
            .ok_or_else(|| format!("'{}' needs two operands", mnemonic))?;

        Ok(Line::basic(op, b.parse()?, a.parse()?))
    }
}

/// Ordered instruction stream produced by one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    lines: Vec<Line>,
}

impl Listing {
    pub fn new() -> Self {
        Listing { lines: Vec::new() }
    }

    pub fn push(&mut self, line: Line) {
        log::trace!("emit {}", line);
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            Line::Label(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl FromStr for Listing {
    type Err = String;

    /// Parse assembly text; blank lines and `;` comments are ignored.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut listing = Listing::new();
        for (number, raw) in text.lines().enumerate() {
            let code = raw.split(';').next().unwrap_or("").trim();
            if code.is_empty() {
                continue;
            }
            let line = code
                .parse::<Line>()
                .map_err(|err| format!("line {}: {}", number + 1, err))?;
            listing.lines.push(line);
        }
        Ok(listing)
    }
}
