use crate::{
    ErrorMessageFormat, SablePipelineError, SourceMap,
    compiler::{CompilerVisitor, Program},
    memory::ObjectHeap,
    parser::Parser,
};

/// Source-to-bytecode facade: tokenize, parse, compile, and format any
/// accumulated diagnostics. The compiled script function lives on the heap
/// passed in, ready for `Vm::interpret`.
pub struct CompilerPipeline<'a> {
    source_map: SourceMap,
    heap: &'a mut ObjectHeap,
    error_message_format: ErrorMessageFormat,
    persistent_roots: Vec<crate::Value>,
}

impl<'a> CompilerPipeline<'a> {
    pub fn new(source_map: SourceMap, heap: &'a mut ObjectHeap) -> Self {
        Self {
            source_map,
            heap,
            error_message_format: ErrorMessageFormat::Minimal,
            persistent_roots: Vec::new(),
        }
    }

    pub fn error_message_format(mut self, format: ErrorMessageFormat) -> Self {
        self.error_message_format = format;
        self
    }

    /// Values that must survive any collection triggered during this
    /// compile. A REPL passes its VM's roots here, since its heap already
    /// holds live state from earlier lines.
    pub fn persistent_roots(mut self, roots: impl IntoIterator<Item = crate::Value>) -> Self {
        self.persistent_roots.extend(roots);
        self
    }

    pub fn run(self) -> Result<Program, SablePipelineError> {
        let Self {
            source_map,
            heap,
            error_message_format,
            persistent_roots,
        } = self;

        let mut parser = Parser::new(&source_map);
        let program = parser.parse();
        let errors = parser.into_reporter();

        CompilerVisitor::new(&source_map, heap)
            .with_roots(persistent_roots)
            .compile(&program, errors)
            .map_err(|errors| format_errors(errors, &source_map, error_message_format))
    }
}

fn format_errors(
    errors: SablePipelineError,
    source_map: &SourceMap,
    format: ErrorMessageFormat,
) -> SablePipelineError {
    let formatted = errors
        .into_errors()
        .into_iter()
        .map(|error| match format {
            ErrorMessageFormat::Verbose => error.into_formatted(source_map),
            ErrorMessageFormat::Compact => error.into_short_formatted(source_map),
            ErrorMessageFormat::Minimal => error,
        })
        .collect();

    SablePipelineError::new(formatted)
}
