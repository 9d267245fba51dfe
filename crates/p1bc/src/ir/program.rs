//! The root compilation unit: every module reachable from the top-level
//! source file, keyed so cross-module references can be resolved by id
//! rather than by name once lowering is done.

use crate::ir::entities::ModuleId;
use crate::ir::module::Module;
use p1bc_entity::PrimaryMap;

/// All modules in a compilation, in the order they were first referenced.
/// Module 0 is always the top-level file.
pub struct Program {
    pub modules: PrimaryMap<ModuleId, Module>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            modules: PrimaryMap::new(),
        }
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        self.modules.push(module)
    }

    pub fn top_level(&self) -> ModuleId {
        self.modules.keys().next().expect("empty program")
    }
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_is_first_added_module() {
        let mut p = Program::new();
        let m0 = p.add_module(Module::new("Main"));
        p.add_module(Module::new("sub"));
        assert_eq!(p.top_level(), m0);
    }
}
