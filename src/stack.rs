// File: src/stack.rs
//
// Stack growth for the recursive parser and evaluator. Deeply nested
// parentheses or blocks recurse once per level; instead of overflowing the
// thread's stack, more is allocated on the heap when the remainder gets low.

/// Grow the stack when less than this remains
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first growing the stack if it is close to exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: u32) -> u32 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn test_deep_recursion_completes() {
        assert_eq!(depth(200_000), 200_000);
    }
}
