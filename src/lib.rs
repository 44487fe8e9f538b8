pub mod dcpu_compiler;
pub mod vm;
