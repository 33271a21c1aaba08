//! Call-stack traces.

use qcvm_foundation::FuncRef;

use crate::view::ProgramView;

/// One level of the call stack at the moment of a trace.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    /// Function executing at this level.
    pub function: FuncRef,
    /// Statement executing at this level.
    pub statement: usize,
}

/// Renders frames (innermost first) as `file : function statement N`.
///
/// Statement numbers are relative to the function's first statement.
/// Frames naming a function the program does not have render as
/// placeholders rather than failing, and an empty stack renders as
/// `<NO STACK>`.
#[must_use]
pub fn format_stack(view: &ProgramView<'_>, frames: &[StackFrame], max_frames: usize) -> Vec<String> {
    if frames.is_empty() {
        return vec!["<NO STACK>".to_string()];
    }
    let mut lines: Vec<String> = frames
        .iter()
        .take(max_frames)
        .map(|frame| match view.program.function(frame.function) {
            Some(func) if !frame.function.is_null() => {
                let rel = func
                    .entry()
                    .map_or(frame.statement, |e| frame.statement.saturating_sub(e));
                format!("{:>12} : {} statement {rel}", func.file, func.name)
            }
            _ => "<NO FUNCTION>".to_string(),
        })
        .collect();
    if frames.len() > max_frames {
        lines.push(format!("... {} more frames", frames.len() - max_frames));
    }
    lines
}
