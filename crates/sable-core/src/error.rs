use crate::{SourceMap, ast::SourceSpan, chunk::SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorMessageFormat {
    Verbose,
    Compact,
    Minimal,
}

/// Every diagnostic accumulated by a failed compile, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct SablePipelineError(Vec<SableCompilerError>);

impl SablePipelineError {
    pub fn new(errors: Vec<SableCompilerError>) -> Self {
        Self(errors)
    }

    pub fn all(&self) -> &[SableCompilerError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<SableCompilerError> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Copy)]
pub enum SableErrorKind {
    Syntax,
    Compile,
}

impl std::fmt::Display for SableErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "Syntax Error"),
            Self::Compile => write!(f, "Compile Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SableCompilerError {
    pub message: String,
    pub span: SourceSpan,
    pub kind: SableErrorKind,
}

impl SableCompilerError {
    pub fn new_syntax_error(message: String, span: SourceSpan) -> Self {
        Self {
            message,
            span,
            kind: SableErrorKind::Syntax,
        }
    }

    pub fn new_compile_error(message: String, span: SourceSpan) -> Self {
        Self {
            message,
            span,
            kind: SableErrorKind::Compile,
        }
    }

    pub fn into_formatted(self, source_map: &SourceMap) -> Self {
        let message = pretty_print_error(source_map, self.kind, &self.message, self.span);

        Self { message, ..self }
    }

    pub fn into_short_formatted(self, source_map: &SourceMap) -> Self {
        let line = source_map.get_line_number(self.span.start);
        let col = source_map.get_column_number(self.span.start);
        let message = format!(
            "{} at line {}, column {}: {}",
            self.kind, line, col, self.message
        );

        Self { message, ..self }
    }
}

impl std::fmt::Display for SableCompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SableCompilerError {}

#[derive(Debug, Clone)]
pub struct NativeFunctionError(pub String);

impl NativeFunctionError {
    pub fn new(message: &str) -> Self {
        Self(message.to_string())
    }

    pub fn into_runtime_error(self, loc: SourceLocation) -> SableRuntimeError {
        SableRuntimeError::new(self.0, loc)
    }
}

impl From<&'static str> for NativeFunctionError {
    fn from(value: &'static str) -> Self {
        NativeFunctionError::new(value)
    }
}

/// One entry of a runtime stack trace: the active function and the source
/// position of the instruction it was executing.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    callee: String,
    loc: SourceLocation,
}

impl Trace {
    pub fn new(callee: &str, loc: SourceLocation) -> Self {
        Self {
            callee: callee.to_string(),
            loc,
        }
    }
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "  at {} (line {}, column {})",
            self.callee, self.loc.line, self.loc.col
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SableRuntimeError {
    pub message: String,
    pub stack_trace: Vec<Trace>,
}

impl SableRuntimeError {
    pub fn new(message: String, loc: SourceLocation) -> Self {
        Self {
            message: format!(
                "Runtime Error at line {}, column {}: {}",
                loc.line, loc.col, message
            ),
            stack_trace: Vec::new(),
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: Vec<Trace>) -> Self {
        self.stack_trace = stack_trace;
        self
    }
}

impl std::fmt::Display for SableRuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.stack_trace.is_empty() {
            writeln!(f)?;
            writeln!(f, "Stack trace:")?;
            for trace in &self.stack_trace {
                writeln!(f, "{}", trace)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for SableRuntimeError {}

/// Collects diagnostics across the whole frontend and compiler so a single
/// pass can surface every error it finds.
#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    errors: Vec<SableCompilerError>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn report_error(&mut self, error: SableCompilerError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[SableCompilerError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<SableCompilerError> {
        std::mem::take(&mut self.errors)
    }
}

/// Pretty print a single error with source context
pub fn pretty_print_error(
    source_map: &SourceMap,
    kind: SableErrorKind,
    message: &str,
    span: SourceSpan,
) -> String {
    let mut output = String::new();

    let line_num = source_map.get_line_number(span.start);
    let col_num = source_map.get_column_number(span.start);

    output.push_str(&format!(
        "{} at line {}, column {}: {}\n",
        kind, line_num, col_num, message
    ));

    let line_str: String = source_map.get_line(line_num).iter().collect();
    let padding = " ".repeat(line_num.to_string().len());

    output.push_str(&format!(" {} | {}\n", line_num, line_str));

    let pointer = create_error_pointer(source_map, span, &line_str, col_num);
    output.push_str(&format!(" {} | {}\n", padding, pointer));

    output
}

fn create_error_pointer(
    source_map: &SourceMap,
    span: SourceSpan,
    line_str: &str,
    col_num: u32,
) -> String {
    let mut pointer = String::new();

    for i in 1..col_num {
        let ch = line_str.chars().nth((i - 1) as usize).unwrap_or(' ');
        pointer.push(if ch == '\t' { '\t' } else { ' ' });
    }

    let start_col = source_map.get_column_number(span.start) as usize;
    let end_col = source_map.get_column_number(span.end.saturating_sub(1)) as usize;

    if start_col >= end_col || span.start == span.end {
        pointer.push('^');
    } else {
        for i in 0..(end_col - start_col + 1) {
            pointer.push(if i == 0 { '^' } else { '~' });
        }
    }

    pointer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_accumulates_errors() {
        let mut reporter = ErrorReporter::new();
        assert!(!reporter.has_errors());

        reporter.report_error(SableCompilerError::new_syntax_error(
            "Expect expression.".to_string(),
            SourceSpan::new(4, 5),
        ));
        reporter.report_error(SableCompilerError::new_compile_error(
            "Too many constants in one chunk.".to_string(),
            SourceSpan::new(9, 10),
        ));

        assert!(reporter.has_errors());
        assert_eq!(reporter.errors().len(), 2);

        let taken = reporter.take_errors();
        assert_eq!(taken.len(), 2);
        assert!(!reporter.has_errors());
    }

    #[test]
    fn formatted_error_points_at_the_span() {
        let source_map = SourceMap::from_source("var x = ;".to_string());
        let error = SableCompilerError::new_syntax_error(
            "Expect expression.".to_string(),
            SourceSpan::new(8, 9),
        )
        .into_formatted(&source_map);

        assert!(error.message.contains("Syntax Error at line 1, column 9"));
        assert!(error.message.contains("var x = ;"));
        assert!(error.message.contains('^'));
    }

    #[test]
    fn runtime_error_displays_stack_trace() {
        let error = SableRuntimeError::new(
            "Operands must be numbers.".to_string(),
            SourceLocation::new(3, 7),
        )
        .with_stack_trace(vec![
            Trace::new("inner", SourceLocation::new(3, 7)),
            Trace::new("<script>", SourceLocation::new(10, 1)),
        ]);

        let rendered = error.to_string();
        assert!(rendered.contains("Runtime Error at line 3, column 7"));
        assert!(rendered.contains("at inner (line 3, column 7)"));
        assert!(rendered.contains("at <script> (line 10, column 1)"));
    }
}
