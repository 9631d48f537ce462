//! Call-stack bookkeeping and native stack safety for deep recursion.

use std::rc::Rc;

/// Maximum number of nested calls before evaluation is aborted.
pub const MAX_CALL_DEPTH: usize = 8192;

/// Frames shown in a runtime error trace before the rest are elided.
const TRACE_LIMIT: usize = 16;

/// One active call. Frames form a singly linked list from the innermost
/// call back to the outermost one.
#[derive(Debug)]
pub struct StackFrame {
    pub callee: String,
    pub line: usize,
    pub parent: Option<Rc<StackFrame>>,
}

impl StackFrame {
    pub fn new(callee: impl Into<String>, line: usize, parent: Option<Rc<StackFrame>>) -> Self {
        StackFrame {
            callee: callee.into(),
            line,
            parent,
        }
    }

    /// Callee names, innermost first. Very deep stacks are cut short with a
    /// `... N more` marker.
    pub fn trace(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut skipped = 0usize;
        let mut frame = Some(self);

        while let Some(current) = frame {
            if names.len() < TRACE_LIMIT {
                names.push(current.callee.clone());
            } else {
                skipped += 1;
            }
            frame = current.parent.as_deref();
        }

        if skipped > 0 {
            names.push(format!("... {} more", skipped));
        }

        names
    }
}

/// Ensure sufficient stack space is available before executing `f`.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Minimum stack space to keep available (100KB red zone).
    const RED_ZONE: usize = 100 * 1024;

    /// Stack space to allocate when growing (1MB).
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_lists_innermost_first() {
        let outer = Rc::new(StackFrame::new("outer", 1, None));
        let inner = StackFrame::new("inner", 2, Some(outer));

        assert_eq!(inner.trace(), vec!["inner", "outer"]);
    }

    #[test]
    fn long_traces_are_elided() {
        let mut frame = None;
        for i in 0..20 {
            frame = Some(Rc::new(StackFrame::new(format!("f{}", i), i, frame)));
        }

        let trace = frame.map(|f| f.trace()).unwrap_or_default();

        assert_eq!(trace.len(), TRACE_LIMIT + 1);
        assert_eq!(trace[0], "f19");
        assert_eq!(trace[TRACE_LIMIT], "... 4 more");
    }

    #[test]
    fn deep_recursion_survives_with_stack_growth() {
        fn depth(n: usize) -> usize {
            ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
        }

        assert_eq!(depth(100_000), 100_000);
    }
}
