// Lowering Engine - syntax tree to DCPU-16 instructions
//
// Walks the tree depth-first and appends to a Listing. Expressions are lowered in one of
// two modes: value mode leaves the result in register `a`, reference mode leaves the
// address of the storage location in `a`. Everything else lives in memory: named
// variables get slots from the SlotAllocator, intermediate results get scratch slots
// that are returned as soon as their last use has been emitted.
//
// Expression lowering lives in lower_expressions.rs, statements in lower_statements.rs.

use indexmap::IndexMap;

use crate::dcpu_compiler::assembly::{Line, Listing, Operand};
use crate::dcpu_compiler::ast::{Module, SourcePos, Stmt, StmtKind};
use crate::dcpu_compiler::context::ProgramContext;
use crate::dcpu_compiler::error::CompilerError;
use crate::dcpu_compiler::labels::is_generated_label;
use crate::dcpu_compiler::scope::{Address, ScopeId};

/// Routine that `exit()` jumps to; also the halt label of the epilogue.
pub const END_ROUTINE: &str = "end";

/// Entry routine; like `end` it never gets an implicit return.
pub const START_ROUTINE: &str = "start";

/// Builtin call that jumps to `end` instead of calling a routine.
pub const EXIT_BUILTIN: &str = "exit";

pub struct Lowerer<'a> {
    pub(super) ctx: &'a mut ProgramContext,
    pub(super) listing: Listing,
    /// Every routine the module defines, name -> definition site.
    pub(super) functions: IndexMap<String, SourcePos>,
    /// Scratch slots held by enclosing expressions at the current emit point.
    pub(super) live_scratch: usize,
    halt_epilogue: bool,
}

impl<'a> Lowerer<'a> {
    pub fn new(ctx: &'a mut ProgramContext) -> Self {
        Lowerer {
            ctx,
            listing: Listing::new(),
            functions: IndexMap::new(),
            live_scratch: 0,
            halt_epilogue: true,
        }
    }

    /// Append `:end` / `set PC, end` to modules that define no `end` routine.
    pub fn with_halt_epilogue(mut self, enabled: bool) -> Self {
        self.halt_epilogue = enabled;
        self
    }

    pub fn lower_module(mut self, module: &Module) -> Result<Listing, CompilerError> {
        // PASS 1: register every routine so calls may precede definitions
        self.collect_functions(&module.body)?;
        log::debug!(
            "registered {} routines: {:?}",
            self.functions.len(),
            self.functions.keys().collect::<Vec<_>>()
        );

        // PASS 2: statements in source order, in the program scope
        let root = self.ctx.slots.root();
        for stmt in &module.body {
            self.lower_statement(stmt, root)?;
        }

        if self.halt_epilogue && !self.functions.contains_key(END_ROUTINE) {
            log::debug!("no '{}' routine defined; appending halt loop", END_ROUTINE);
            self.emit(Line::label(END_ROUTINE));
            self.emit(Line::jump(END_ROUTINE));
        }

        Ok(self.listing)
    }

    fn collect_functions(&mut self, body: &[Stmt]) -> Result<(), CompilerError> {
        for stmt in body {
            match &stmt.kind {
                StmtKind::FunctionDef { name, body } => {
                    check_routine_name(name, stmt.pos)?;
                    if self.functions.contains_key(name) {
                        log::warn!("routine '{}' redefined at {}", name, stmt.pos);
                    }
                    self.functions.entry(name.clone()).or_insert(stmt.pos);
                    self.collect_functions(body)?;
                }
                StmtKind::If { body, orelse, .. } => {
                    self.collect_functions(body)?;
                    self.collect_functions(orelse)?;
                }
                StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                    self.collect_functions(body)?;
                }
                StmtKind::Return(_) | StmtKind::Assign { .. } | StmtKind::Expr(_) => {}
            }
        }
        Ok(())
    }

    pub(super) fn emit(&mut self, line: Line) {
        self.listing.push(line);
    }

    pub(super) fn next_tag(&mut self, prefix: &str) -> String {
        self.ctx.labels.next_tag(prefix)
    }

    /// Run `body` with a scratch slot; the slot is released whatever `body` returns.
    pub(super) fn with_scratch<T>(
        &mut self,
        pos: SourcePos,
        body: impl FnOnce(&mut Self, Address) -> Result<T, CompilerError>,
    ) -> Result<T, CompilerError> {
        let slot = self.ctx.slots.allocate_scratch().map_err(|err| err.at(pos))?;
        self.live_scratch += 1;
        let result = body(self, slot);
        self.live_scratch -= 1;
        self.ctx.slots.release_scratch(slot);
        result
    }

    /// Run `body` in a fresh child of `parent`; the child is closed on every exit path.
    pub(super) fn in_child_scope<T>(
        &mut self,
        parent: ScopeId,
        pos: SourcePos,
        body: impl FnOnce(&mut Self, ScopeId) -> Result<T, CompilerError>,
    ) -> Result<T, CompilerError> {
        let scope = self.ctx.slots.open_child(parent).map_err(|err| err.at(pos))?;
        let result = body(self, scope);
        let closed = self.ctx.slots.close(scope).map_err(|err| err.at(pos));
        let value = result?;
        closed?;
        Ok(value)
    }

    pub(super) fn slot_address(
        &mut self,
        name: &str,
        scope: ScopeId,
        pos: SourcePos,
    ) -> Result<Address, CompilerError> {
        if let Some(address) = self.ctx.slots.special_address(name) {
            return Ok(address);
        }
        self.ctx
            .slots
            .resolve(name, scope)
            .map(|slot| slot.address)
            .map_err(|err| err.at(pos))
    }
}

/// A routine name becomes a label and a `jsr` operand, so it must read back as a
/// label and stay clear of the generated jump targets.
fn check_routine_name(name: &str, pos: SourcePos) -> Result<(), CompilerError> {
    let clash = match name.parse::<Operand>() {
        Ok(Operand::Label(_)) if is_generated_label(name) => "a generated jump label",
        Ok(Operand::Label(_)) => return Ok(()),
        Ok(Operand::Register(_)) => "a register",
        Ok(Operand::Push) | Ok(Operand::Pop) => "a stack operand",
        _ => "an assembler operand",
    };
    Err(CompilerError::ReservedRoutineName(
        name.to_string(),
        clash.to_string(),
        pos,
    ))
}

#[cfg(test)]
#[path = "lowering_tests.rs"]
mod tests;
