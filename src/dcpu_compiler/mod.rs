// DCPU-16 Compiler Module
// Source text -> tokens -> syntax tree -> DCPU-16 assembly listing

pub mod assembly;
pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod labels;
pub mod lexer;
mod lower_expressions;
mod lower_statements;
pub mod lowering;
pub mod parser;
pub mod scope;

pub use config::CompilerConfig;
pub use error::CompilerError;

use assembly::Listing;
use ast::Module;
use context::ProgramContext;

/// Main compiler structure
pub struct DcpuCompiler {
    config: CompilerConfig,
}

impl Default for DcpuCompiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl DcpuCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        DcpuCompiler { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile source text to the assembly listing text.
    pub fn compile(&self, source: &str) -> Result<String, CompilerError> {
        Ok(self.compile_to_listing(source)?.to_string())
    }

    pub fn compile_to_listing(&self, source: &str) -> Result<Listing, CompilerError> {
        // Phase 1: Lexical Analysis
        let mut lexer = lexer::Lexer::new(source);
        let tokens = lexer.tokenize()?;

        // Phase 2: Parsing
        let mut parser = parser::Parser::new(tokens);
        let module = parser.parse()?;
        log::info!("parsed {} top-level statements", module.body.len());

        // Phase 3: Lowering
        self.compile_module(&module)
    }

    /// Lower an already-built tree. Each call gets its own allocator and label counter.
    pub fn compile_module(&self, module: &Module) -> Result<Listing, CompilerError> {
        self.config.validate()?;

        let mut ctx = ProgramContext::new(&self.config);
        let listing = lowering::Lowerer::new(&mut ctx)
            .with_halt_epilogue(self.config.output.halt_epilogue)
            .lower_module(module)?;

        log::info!(
            "emitted {} lines, {} slots still bound",
            listing.len(),
            ctx.slots.occupied_count()
        );
        Ok(listing)
    }
}
