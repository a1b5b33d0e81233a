//! Peephole pass merging adjacent `push` instructions.
//!
//! The assembler encodes one `push` with many operands in a single
//! action record, so `push 'a'` followed by `push 'b'` collapses to
//! `push 'a', 'b'`. Merging repeats at the same spot, which lets whole
//! runs collapse into one line; the first line's indentation survives.

const PUSH_PREFIX: &str = "push ";

pub fn coalesce_pushes(lines: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(previous) = merged.last_mut()
            && is_push(previous)
            && is_push(&line)
        {
            previous.push_str(", ");
            previous.push_str(push_operands(&line));
            continue;
        }
        merged.push(line);
    }
    merged
}

fn is_push(line: &str) -> bool {
    line.trim_start().starts_with(PUSH_PREFIX)
}

fn push_operands(line: &str) -> &str {
    &line.trim_start()[PUSH_PREFIX.len()..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_merges_adjacent_pushes() {
        assert_eq!(
            coalesce_pushes(lines(&["push 'a'", "push 'b'", "setVariable"])),
            lines(&["push 'a', 'b'", "setVariable"])
        );
    }

    #[test]
    fn test_merges_whole_runs() {
        assert_eq!(
            coalesce_pushes(lines(&["push 'a'", "push 'b'", "push 123", "setVariable"])),
            lines(&["push 'a', 'b', 123", "setVariable"])
        );
    }

    #[test]
    fn test_non_push_breaks_the_run() {
        assert_eq!(
            coalesce_pushes(lines(&[
                "push 'atv'",
                "getVariable",
                "push 'bar'",
                "push 1",
                "setMember",
            ])),
            lines(&[
                "push 'atv'",
                "getVariable",
                "push 'bar', 1",
                "setMember",
            ])
        );
    }

    #[test]
    fn test_keeps_first_line_indentation() {
        assert_eq!(
            coalesce_pushes(lines(&["  push 1", "  push 2"])),
            lines(&["  push 1, 2"])
        );
    }

    #[test]
    fn test_multi_operand_lines_keep_merging() {
        assert_eq!(
            coalesce_pushes(lines(&["push 1, 2", "push 3, 4"])),
            lines(&["push 1, 2, 3, 4"])
        );
    }

    #[test]
    fn test_idempotent() {
        let input = lines(&[
            "push 'a'",
            "push 'b'",
            "getVariable",
            "push 1",
            "push 2",
            "add",
        ]);
        let once = coalesce_pushes(input);
        let twice = coalesce_pushes(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_untouched_without_adjacent_pushes() {
        let input = lines(&["pop", "push 1", "not", "push 2", "return"]);
        assert_eq!(coalesce_pushes(input.clone()), input);
    }
}
