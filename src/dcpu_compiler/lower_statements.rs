// Lowering Engine - Statement Lowering

use crate::dcpu_compiler::assembly::{Line, Opcode, Operand};
use crate::dcpu_compiler::ast::{Expr, SourcePos, Stmt, StmtKind};
use crate::dcpu_compiler::error::CompilerError;
use crate::dcpu_compiler::labels::{ELSE_SUFFIX, END_SUFFIX, IF_TAG, LOOP_TAG, START_SUFFIX};
use crate::dcpu_compiler::lowering::{Lowerer, END_ROUTINE, START_ROUTINE};
use crate::dcpu_compiler::scope::ScopeId;

impl<'a> Lowerer<'a> {
    pub fn lower_statement(&mut self, stmt: &Stmt, scope: ScopeId) -> Result<(), CompilerError> {
        match &stmt.kind {
            StmtKind::FunctionDef { name, body } => self.lower_function(name, body, stmt, scope),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.lower_value(value, scope)?;
                }
                self.emit(Line::ret());
                Ok(())
            }
            StmtKind::If { test, body, orelse } => self.lower_if(test, body, orelse, stmt.pos, scope),
            StmtKind::While { test, body } => self.lower_loop(test, body, None, stmt.pos, scope),
            StmtKind::For {
                init,
                test,
                step,
                body,
            } => {
                self.lower_statement(init, scope)?;
                self.lower_loop(test, body, Some(step.as_ref()), stmt.pos, scope)
            }
            StmtKind::Assign { targets, value } => self.lower_assign(targets, value, stmt.pos, scope),
            StmtKind::Expr(expr) => self.lower_value(expr, scope),
        }
    }

    fn lower_block(&mut self, body: &[Stmt], scope: ScopeId) -> Result<(), CompilerError> {
        for stmt in body {
            self.lower_statement(stmt, scope)?;
        }
        Ok(())
    }

    fn lower_function(
        &mut self,
        name: &str,
        body: &[Stmt],
        stmt: &Stmt,
        scope: ScopeId,
    ) -> Result<(), CompilerError> {
        log::debug!("lowering routine '{}' at {}", name, stmt.pos);
        self.emit(Line::label(name));
        self.in_child_scope(scope, stmt.pos, |this, inner| this.lower_block(body, inner))?;

        let returned = matches!(body.last().map(|s| &s.kind), Some(StmtKind::Return(_)));
        let entry_or_exit = name == START_ROUTINE || name == END_ROUTINE;
        if !returned && !entry_or_exit {
            self.emit(Line::ret());
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        test: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
        pos: SourcePos,
        scope: ScopeId,
    ) -> Result<(), CompilerError> {
        let tag = self.next_tag(IF_TAG);
        let else_label = format!("{}{}", tag, ELSE_SUFFIX);
        let end_label = format!("{}{}", tag, END_SUFFIX);

        self.lower_value(test, scope)?;
        self.emit(Line::basic(Opcode::Ifn, Operand::A, Operand::Literal(1)));
        self.emit(Line::jump(&else_label));
        self.in_child_scope(scope, pos, |this, inner| this.lower_block(body, inner))?;
        self.emit(Line::jump(&end_label));
        self.emit(Line::label(&else_label));
        self.in_child_scope(scope, pos, |this, inner| this.lower_block(orelse, inner))?;
        self.emit(Line::label(&end_label));
        Ok(())
    }

    /// While loop; a for loop passes its step, which runs after the body in the
    /// body's scope.
    fn lower_loop(
        &mut self,
        test: &Expr,
        body: &[Stmt],
        step: Option<&Stmt>,
        pos: SourcePos,
        scope: ScopeId,
    ) -> Result<(), CompilerError> {
        let tag = self.next_tag(LOOP_TAG);
        let start_label = format!("{}{}", tag, START_SUFFIX);
        let end_label = format!("{}{}", tag, END_SUFFIX);

        self.emit(Line::label(&start_label));
        self.lower_value(test, scope)?;
        self.emit(Line::basic(Opcode::Ifn, Operand::A, Operand::Literal(1)));
        self.emit(Line::jump(&end_label));
        self.in_child_scope(scope, pos, |this, inner| {
            this.lower_block(body, inner)?;
            if let Some(step) = step {
                this.lower_statement(step, inner)?;
            }
            Ok(())
        })?;
        self.emit(Line::jump(&start_label));
        self.emit(Line::label(&end_label));
        Ok(())
    }

    fn lower_assign(
        &mut self,
        targets: &[Expr],
        value: &Expr,
        pos: SourcePos,
        scope: ScopeId,
    ) -> Result<(), CompilerError> {
        self.lower_value(value, scope)?;
        self.with_scratch(pos, |this, slot| {
            this.emit(Line::set(Operand::Memory(slot), Operand::A));
            for target in targets {
                this.lower_reference(target, scope)?;
                this.emit(Line::set(Operand::AT_A, Operand::Memory(slot)));
            }
            Ok(())
        })
    }
}
