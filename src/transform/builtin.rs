// src/transform/builtin.rs

//! In-process transform implementations.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Maximum nesting depth for `@@include` before giving up.
const MAX_INCLUDE_DEPTH: usize = 32;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@@include\(\s*['"]([^'"]+)['"]\s*(?:,\s*\{[^)]*\}\s*)?\)"#)
        .expect("include directive pattern is valid")
});

/// At-rules whose block holds rules rather than declarations.
const RULE_BLOCK_AT_RULES: &[&str] = &["@media", "@supports", "@document", "@layer", "@container"];

/// Minify a stylesheet.
///
/// Removes every comment (including `/*! ... */`), collapses whitespace runs
/// and drops whitespace next to `{ } ; , >` and after `:` / `(`. Inside a
/// declaration block the space before `:` goes too; in selectors it is kept
/// (`a :hover` differs from `a:hover`). The last `;` of a block is dropped.
/// String literals are copied verbatim.
pub fn minify_css(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut pending_space = false;
    // One entry per open block: true when it holds declarations.
    let mut blocks: Vec<bool> = Vec::new();
    let mut prelude_start = 0;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                pending_space = true;
            }
            '"' | '\'' => {
                flush_space(&mut out, &mut pending_space, c, false);
                out.push(c);
                let mut escaped = false;
                for n in chars.by_ref() {
                    out.push(n);
                    if escaped {
                        escaped = false;
                    } else if n == '\\' {
                        escaped = true;
                    } else if n == c {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => pending_space = true,
            _ => {
                let in_declarations = blocks.last() == Some(&true);
                flush_space(&mut out, &mut pending_space, c, in_declarations);
                match c {
                    '{' => {
                        let prelude = out.get(prelude_start..).unwrap_or("");
                        blocks.push(!is_rule_block(prelude));
                    }
                    '}' => {
                        blocks.pop();
                        if out.ends_with(';') {
                            out.pop();
                        }
                    }
                    _ => {}
                }
                out.push(c);
                if matches!(c, '{' | '}' | ';') {
                    prelude_start = out.len();
                }
            }
        }
    }

    out
}

fn is_rule_block(prelude: &str) -> bool {
    let prelude = prelude.trim_start().to_ascii_lowercase();
    RULE_BLOCK_AT_RULES.iter().any(|at| {
        prelude
            .strip_prefix(at)
            .is_some_and(|rest| rest.is_empty() || !rest.starts_with(|ch: char| ch.is_alphanumeric() || ch == '-'))
    })
}

fn flush_space(out: &mut String, pending_space: &mut bool, next: char, in_declarations: bool) {
    if *pending_space {
        let tight_after = out
            .chars()
            .last()
            .is_none_or(|last| matches!(last, '{' | '}' | ';' | ',' | '>' | ':' | '('));
        let tight_before = matches!(next, '{' | '}' | ';' | ',' | '>' | ')')
            || (next == ':' && in_declarations);
        if !tight_after && !tight_before {
            out.push(' ');
        }
    }
    *pending_space = false;
}

/// Expand `@@include('relative/path.html')` directives.
///
/// Paths are resolved against the directory of the including file. Every
/// line of the included content after the first is indented like the line
/// holding the directive. Includes nest; cycles are an error. An optional
/// context object after the path is accepted and ignored.
pub fn expand_includes(path: &Path, contents: &str) -> Result<String, String> {
    let origin = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut stack = vec![origin];
    expand(path, contents, &mut stack)
}

fn expand(path: &Path, contents: &str, stack: &mut Vec<PathBuf>) -> Result<String, String> {
    if stack.len() > MAX_INCLUDE_DEPTH {
        return Err(format!(
            "include depth exceeds {MAX_INCLUDE_DEPTH} at {}",
            path.display()
        ));
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut out = String::with_capacity(contents.len());
    let mut last = 0;

    for caps in INCLUDE_RE.captures_iter(contents) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&contents[last..whole.start()]);
        last = whole.end();

        let target = dir.join(target.as_str());
        let canonical = std::fs::canonicalize(&target)
            .map_err(|e| format!("cannot include {}: {e}", target.display()))?;
        if stack.contains(&canonical) {
            return Err(format!("include cycle through {}", target.display()));
        }

        let text = std::fs::read_to_string(&canonical)
            .map_err(|e| format!("cannot include {}: {e}", target.display()))?;

        stack.push(canonical);
        let expanded = expand(&target, &text, stack)?;
        stack.pop();

        let expanded = expanded
            .strip_suffix("\r\n")
            .or_else(|| expanded.strip_suffix('\n'))
            .unwrap_or(&expanded);
        let indent = line_indent(contents, whole.start());
        out.push_str(&indent_following_lines(expanded, indent));
    }

    out.push_str(&contents[last..]);
    Ok(out)
}

/// Leading whitespace of the line containing byte offset `at`.
fn line_indent(contents: &str, at: usize) -> &str {
    let line_start = contents[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &contents[line_start..at];
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

fn indent_following_lines(text: &str, indent: &str) -> String {
    if indent.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}
