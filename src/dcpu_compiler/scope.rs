// Lexical-scope slot allocator
//
// Every source variable lives at a fixed word address. Scopes form a tree stored in an
// arena; children point at their parent by index and lookups walk upward. A binding is
// tagged with the scope that first asked for it (its origin) and is cached in that
// scope's tables, so closing the scope finds and releases exactly what it introduced.

use std::fmt;
use std::ops::RangeInclusive;

use bitvec::prelude::*;
use indexmap::IndexMap;

use crate::dcpu_compiler::ast::SourcePos;
use crate::dcpu_compiler::error::CompilerError;

pub type Address = u16;

/// Default range for named variables and scratch slots (inclusive).
pub const VARIABLE_ADDRESS_RANGE: RangeInclusive<Address> = 0x2000..=0x7000;

/// Start of the memory-mapped display.
pub const SCREEN_ADDRESS: Address = 0x8000;

/// Reserved identifier that names the display.
pub const SCREEN_NAME: &str = "screen";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub address: Address,
    /// Scope that first requested this binding.
    pub origin: ScopeId,
}

/// A resolved binding: identity plus the address it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub var: VarId,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    MemoryExhausted,
    RootScopeClose,
    UnknownScope(ScopeId),
}

impl SlotError {
    /// Attach the position of the node whose lowering needed the slot.
    pub fn at(self, pos: SourcePos) -> CompilerError {
        match self {
            SlotError::MemoryExhausted => CompilerError::MemoryExhausted(pos),
            SlotError::RootScopeClose => CompilerError::UnboundScopeOperation(
                "the program scope cannot be closed".to_string(),
                pos,
            ),
            SlotError::UnknownScope(scope) => CompilerError::UnboundScopeOperation(
                format!("{} is not an open scope", scope),
                pos,
            ),
        }
    }
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlotError::MemoryExhausted => write!(f, "memory exhausted"),
            SlotError::RootScopeClose => write!(f, "the program scope cannot be closed"),
            SlotError::UnknownScope(scope) => write!(f, "{} is not an open scope", scope),
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    vars_by_address: IndexMap<Address, VarId>,
    vars_by_name: IndexMap<String, Vec<VarId>>,
}

#[derive(Debug)]
pub struct SlotAllocator {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
    /// One bit per address in the range; set while bound or held as scratch.
    occupied: BitVec,
    base: Address,
    screen_address: Address,
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new(VARIABLE_ADDRESS_RANGE, SCREEN_ADDRESS)
    }
}

impl SlotAllocator {
    /// Create an allocator whose root scope owns `range`.
    pub fn new(range: RangeInclusive<Address>, screen_address: Address) -> Self {
        let (start, end) = range.into_inner();
        let len = if start <= end {
            (end - start) as usize + 1
        } else {
            0
        };

        SlotAllocator {
            scopes: vec![Scope::default()],
            variables: Vec::new(),
            occupied: bitvec![0; len],
            base: start,
            screen_address,
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.0]
    }

    /// Number of addresses currently bound or held as scratch.
    pub fn occupied_count(&self) -> usize {
        self.occupied.count_ones()
    }

    pub fn is_occupied(&self, address: Address) -> bool {
        address
            .checked_sub(self.base)
            .and_then(|offset| self.occupied.get(offset as usize).map(|bit| *bit))
            .unwrap_or(false)
    }

    pub fn open_child(&mut self, parent: ScopeId) -> Result<ScopeId, SlotError> {
        self.check(parent)?;
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        log::trace!("opened {} under {}", id, parent);
        Ok(id)
    }

    /// Release every binding `scope` introduced, here and in every ancestor caching it.
    pub fn close(&mut self, scope: ScopeId) -> Result<(), SlotError> {
        self.check(scope)?;
        let parent = self.scopes[scope.0]
            .parent
            .ok_or(SlotError::RootScopeClose)?;

        let owned: Vec<VarId> = self.scopes[scope.0]
            .vars_by_name
            .values()
            .flatten()
            .copied()
            .collect();

        for var in owned {
            let mut cursor = Some(parent);
            while let Some(ancestor) = cursor {
                self.unregister(ancestor, var);
                cursor = self.scopes[ancestor.0].parent;
            }
        }

        let closed = &mut self.scopes[scope.0];
        closed.vars_by_address.clear();
        closed.vars_by_name.clear();
        log::trace!("closed {}", scope);
        Ok(())
    }

    /// Address of `name` as seen from `scope`, allocating on first use.
    pub fn resolve(&mut self, name: &str, scope: ScopeId) -> Result<Slot, SlotError> {
        self.check(scope)?;
        let var = self.resolve_from(name, scope, scope)?;
        Ok(Slot {
            var,
            address: self.variables[var.0].address,
        })
    }

    pub fn allocate_scratch(&mut self) -> Result<Address, SlotError> {
        let address = self.allocate()?;
        log::trace!("scratch {:#06x} acquired", address);
        Ok(address)
    }

    pub fn release_scratch(&mut self, address: Address) {
        log::trace!("scratch {:#06x} released", address);
        self.free(address);
    }

    /// Fixed address for reserved device names (only `screen`).
    pub fn special_address(&self, name: &str) -> Option<Address> {
        if name.eq_ignore_ascii_case(SCREEN_NAME) {
            Some(self.screen_address)
        } else {
            None
        }
    }

    fn resolve_from(
        &mut self,
        name: &str,
        scope: ScopeId,
        origin: ScopeId,
    ) -> Result<VarId, SlotError> {
        let mut local = None;
        if let Some(candidates) = self.scopes[scope.0].vars_by_name.get(name) {
            for &var in candidates {
                let owner = self.variables[var.0].origin;
                if owner == origin {
                    return Ok(var);
                } else if owner == scope {
                    local = Some(var);
                }
            }
        }
        if let Some(var) = local {
            return Ok(var);
        }

        if let Some(parent) = self.scopes[scope.0].parent {
            let var = self.resolve_from(name, parent, origin)?;
            if self.variables[var.0].origin == scope {
                self.register(scope, var);
            }
            return Ok(var);
        }

        let address = self.allocate()?;
        let var = VarId(self.variables.len());
        self.variables.push(Variable {
            name: name.to_string(),
            address,
            origin,
        });
        self.register(scope, var);
        log::debug!("bound '{}' to {:#06x} for {}", name, address, origin);
        Ok(var)
    }

    fn register(&mut self, scope: ScopeId, var: VarId) {
        let variable = &self.variables[var.0];
        let table = &mut self.scopes[scope.0];
        table.vars_by_address.insert(variable.address, var);
        table
            .vars_by_name
            .entry(variable.name.clone())
            .or_default()
            .push(var);
    }

    fn unregister(&mut self, scope: ScopeId, var: VarId) {
        let name = self.variables[var.0].name.clone();
        let address = self.variables[var.0].address;
        let table = &mut self.scopes[scope.0];

        if let Some(list) = table.vars_by_name.get_mut(&name) {
            list.retain(|candidate| *candidate != var);
            if list.is_empty() {
                table.vars_by_name.shift_remove(&name);
            }
        }

        if table.vars_by_address.get(&address) == Some(&var) {
            table.vars_by_address.shift_remove(&address);
            // the root's table is the free pool
            if table.parent.is_none() {
                self.free(address);
            }
        }
    }

    fn allocate(&mut self) -> Result<Address, SlotError> {
        let offset = self
            .occupied
            .first_zero()
            .ok_or(SlotError::MemoryExhausted)?;
        self.occupied.set(offset, true);
        Ok(self.base + offset as Address)
    }

    fn free(&mut self, address: Address) {
        if let Some(offset) = address.checked_sub(self.base) {
            if (offset as usize) < self.occupied.len() {
                self.occupied.set(offset as usize, false);
            }
        }
    }

    fn check(&self, scope: ScopeId) -> Result<(), SlotError> {
        if scope.0 < self.scopes.len() {
            Ok(())
        } else {
            Err(SlotError::UnknownScope(scope))
        }
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
