// Lowering Engine - Expression Lowering
//
// Value mode: result in `a`. Reference mode: storage address in `a`.

use crate::dcpu_compiler::assembly::{Line, Opcode, Operand};
use crate::dcpu_compiler::ast::{BinOp, BoolOp, CmpOp, Expr, ExprKind, UnaryOp};
use crate::dcpu_compiler::error::CompilerError;
use crate::dcpu_compiler::labels::{BOOLOP_TAG, COMPARE_TAG, DONE_SUFFIX, SKIP_SUFFIX};
use crate::dcpu_compiler::lowering::{Lowerer, EXIT_BUILTIN, END_ROUTINE};
use crate::dcpu_compiler::scope::ScopeId;

/// Machine tests for a comparison; the result is true if any test passes.
fn compare_tests(op: CmpOp) -> &'static [Opcode] {
    match op {
        CmpOp::Eq => &[Opcode::Ife],
        CmpOp::NotEq => &[Opcode::Ifn],
        CmpOp::Lt => &[Opcode::Ifl],
        CmpOp::LtE => &[Opcode::Ifl, Opcode::Ife],
        CmpOp::Gt => &[Opcode::Ifg],
        CmpOp::GtE => &[Opcode::Ifg, Opcode::Ife],
    }
}

fn arithmetic_opcode(op: BinOp) -> Option<Opcode> {
    match op {
        BinOp::Add => Some(Opcode::Add),
        BinOp::Sub => Some(Opcode::Sub),
        BinOp::Mult => Some(Opcode::Mul),
        BinOp::Div => Some(Opcode::Div),
        BinOp::Mod => Some(Opcode::Mod),
        BinOp::BitAnd => Some(Opcode::And),
        BinOp::BitOr => Some(Opcode::Bor),
        BinOp::BitXor => Some(Opcode::Xor),
        BinOp::LShift => Some(Opcode::Shl),
        BinOp::RShift => Some(Opcode::Shr),
        BinOp::Pow => None,
    }
}

impl<'a> Lowerer<'a> {
    /// Emit code leaving the value of `expr` in `a`.
    pub fn lower_value(&mut self, expr: &Expr, scope: ScopeId) -> Result<(), CompilerError> {
        match &expr.kind {
            ExprKind::Num(value) => {
                self.emit(Line::set(Operand::A, Operand::Literal(*value)));
                Ok(())
            }
            ExprKind::Name(name) => {
                let address = self.slot_address(name, scope, expr.pos)?;
                self.emit(Line::set(Operand::A, Operand::Memory(address)));
                Ok(())
            }
            ExprKind::Subscript { .. } => {
                self.lower_reference(expr, scope)?;
                self.emit(Line::set(Operand::A, Operand::AT_A));
                Ok(())
            }
            ExprKind::Call { func } => self.lower_call(func, expr),
            ExprKind::BinOp { left, op, right } => self.lower_binop(left, *op, right, expr, scope),
            ExprKind::UnaryOp { op, operand } => self.lower_unary(*op, operand, expr, scope),
            ExprKind::BoolOp { op, values } => self.lower_boolop(*op, values, scope),
            ExprKind::Compare { left, comparisons } => {
                self.lower_compare(left, comparisons, expr, scope)
            }
        }
    }

    /// Emit code leaving the address of `expr` in `a`. Only names and indexed
    /// accesses denote storage.
    pub fn lower_reference(&mut self, expr: &Expr, scope: ScopeId) -> Result<(), CompilerError> {
        match &expr.kind {
            ExprKind::Name(name) => {
                let address = self.slot_address(name, scope, expr.pos)?;
                self.emit(Line::set(Operand::A, Operand::Address(address)));
                Ok(())
            }
            ExprKind::Subscript { value, index } => {
                self.lower_value(index, scope)?;
                self.with_scratch(expr.pos, |this, slot| {
                    this.emit(Line::set(Operand::Memory(slot), Operand::A));
                    this.lower_reference(value, scope)?;
                    this.emit(Line::basic(Opcode::Add, Operand::A, Operand::Memory(slot)));
                    Ok(())
                })
            }
            other => Err(CompilerError::InvalidReferenceTarget(
                other.describe().to_string(),
                expr.pos,
            )),
        }
    }

    fn lower_call(&mut self, func: &str, expr: &Expr) -> Result<(), CompilerError> {
        if func == EXIT_BUILTIN {
            self.emit(Line::jump(END_ROUTINE));
            return Ok(());
        }
        if !self.functions.contains_key(func) {
            return Err(CompilerError::UndefinedFunction(func.to_string(), expr.pos));
        }
        if self.live_scratch > 0 {
            log::warn!(
                "call to '{}' at {} while {} scratch slot(s) are live; the routine may overwrite them",
                func,
                expr.pos,
                self.live_scratch
            );
        }
        self.emit(Line::jsr(func));
        Ok(())
    }

    fn lower_binop(
        &mut self,
        left: &Expr,
        op: BinOp,
        right: &Expr,
        expr: &Expr,
        scope: ScopeId,
    ) -> Result<(), CompilerError> {
        let opcode = arithmetic_opcode(op)
            .ok_or_else(|| CompilerError::UnsupportedOperator(op.to_string(), expr.pos))?;

        self.lower_value(left, scope)?;
        self.with_scratch(expr.pos, |this, slot| {
            this.emit(Line::set(Operand::Memory(slot), Operand::A));
            this.lower_value(right, scope)?;
            this.emit(Line::basic(opcode, Operand::Memory(slot), Operand::A));
            this.emit(Line::set(Operand::A, Operand::Memory(slot)));
            Ok(())
        })
    }

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        expr: &Expr,
        scope: ScopeId,
    ) -> Result<(), CompilerError> {
        match op {
            UnaryOp::Not => {
                self.lower_value(operand, scope)?;
                self.emit(Line::basic(Opcode::Xor, Operand::A, Operand::Literal(1)));
                Ok(())
            }
            UnaryOp::Neg => Err(CompilerError::UnsupportedOperator(
                op.to_string(),
                expr.pos,
            )),
        }
    }

    /// Short-circuit: after each operand but the last, jump to the shared skip label
    /// once the result is decided (`a == 0` for and, `a == 1` for or).
    fn lower_boolop(
        &mut self,
        op: BoolOp,
        values: &[Expr],
        scope: ScopeId,
    ) -> Result<(), CompilerError> {
        let decided = match op {
            BoolOp::And => 0,
            BoolOp::Or => 1,
        };
        let tag = self.next_tag(BOOLOP_TAG);
        let skip = format!("{}{}", tag, SKIP_SUFFIX);
        log::debug!("{:?} over {} operands as {}", op, values.len(), tag);

        for (i, value) in values.iter().enumerate() {
            self.lower_value(value, scope)?;
            if i + 1 < values.len() {
                self.emit(Line::basic(Opcode::Ife, Operand::A, Operand::Literal(decided)));
                self.emit(Line::jump(&skip));
            }
        }
        self.emit(Line::label(&skip));
        Ok(())
    }

    /// `l op0 c0 op1 c1 ...` is `l op0 c0 and c0 op1 c1 and ...`; each operand is
    /// evaluated once. `L` holds the left side of the current stage, `R` the right.
    fn lower_compare(
        &mut self,
        left: &Expr,
        comparisons: &[(CmpOp, Expr)],
        expr: &Expr,
        scope: ScopeId,
    ) -> Result<(), CompilerError> {
        let done = if comparisons.len() > 1 {
            Some(format!("{}{}", self.next_tag(COMPARE_TAG), DONE_SUFFIX))
        } else {
            None
        };

        self.lower_value(left, scope)?;
        self.with_scratch(expr.pos, |this, lhs| {
            this.emit(Line::set(Operand::Memory(lhs), Operand::A));
            this.with_scratch(expr.pos, |this, rhs| {
                for (i, (op, operand)) in comparisons.iter().enumerate() {
                    this.lower_value(operand, scope)?;
                    this.emit(Line::set(Operand::Memory(rhs), Operand::A));
                    this.emit(Line::set(Operand::A, Operand::Literal(0)));
                    for test in compare_tests(*op) {
                        this.emit(Line::basic(*test, Operand::Memory(lhs), Operand::Memory(rhs)));
                        this.emit(Line::set(Operand::A, Operand::Literal(1)));
                    }

                    if let Some(done) = done.as_deref() {
                        if i + 1 < comparisons.len() {
                            this.emit(Line::basic(Opcode::Ife, Operand::A, Operand::Literal(0)));
                            this.emit(Line::jump(done));
                            this.emit(Line::set(Operand::Memory(lhs), Operand::Memory(rhs)));
                        }
                    }
                }
                Ok(())
            })
        })?;

        if let Some(done) = done {
            self.emit(Line::label(&done));
        }
        Ok(())
    }
}
