pub mod ast;
mod chunk;
mod compiler;
mod debug;
mod error;
pub mod memory;
mod parser;
mod pipeline;
mod source;
mod tokenizer;
mod value;
mod vm;

pub use chunk::{Chunk, OpCode, SourceLocation};
pub use compiler::{CompilerVisitor, FRAME_MAX, Program, STACK_MAX};
pub use debug::{disassemble_chunk, disassemble_program};
pub use error::{
    ErrorMessageFormat, ErrorReporter, NativeFunctionError, SableCompilerError, SableErrorKind,
    SablePipelineError, SableRuntimeError, Trace,
};
pub use memory::{ObjHandle, ObjectHeap, ObjectKind};
pub use parser::Parser;
pub use pipeline::CompilerPipeline;
pub use source::SourceMap;
pub use tokenizer::{Token, TokenType, Tokenizer};
pub use value::{Value, ValueKind};
pub use vm::{RuntimeResult, Vm};

#[cfg(test)]
pub mod tests;
