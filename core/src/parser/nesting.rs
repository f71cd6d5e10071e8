//! Nesting depth guard
//!
//! The grammar and the evaluator are recursive descent, so every bracket or
//! prefix operator costs stack on the worker. This scan runs on raw text
//! before parsing and finds the first point where brackets, template
//! substitutions and chains of `!`, `-`, `typeof` or `await` nest deeper
//! than the allowed limit.
//!
//! Strings and comments are skipped. Mismatched closers are ignored here;
//! the bracket-balance rule reports them.

/// Deepest nesting a script may use
pub const MAX_NESTING_DEPTH: usize = 64;

/// Where a script first exceeded the nesting limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestingOverflow {
    pub limit: usize,
    /// 1-indexed
    pub line: usize,
    /// 1-indexed
    pub col: usize,
}

impl NestingOverflow {
    pub fn message(&self) -> String {
        format!(
            "Nesting too deep: expressions may nest at most {} levels",
            self.limit
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Bracket(char),
    Template,
    Substitution,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    cost: usize,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            col: 0,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_string(&mut self, quote: char) {
        while let Some(ch) = self.bump() {
            match ch {
                '\\' => {
                    self.bump();
                }
                '\n' => return,
                c if c == quote => return,
                _ => {}
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                return;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        while let Some(ch) = self.bump() {
            if ch == '*' && self.eat('/') {
                return;
            }
        }
    }

    fn take_word(&mut self, first: char) -> String {
        let mut word = String::from(first);
        while let Some(ch) = self.peek() {
            if !is_word_char(ch) {
                break;
            }
            word.push(ch);
            self.bump();
        }
        word
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Words after which a `-` is a negation rather than a subtraction
fn is_operator_keyword(word: &str) -> bool {
    matches!(
        word,
        "return" | "throw" | "case" | "in" | "of" | "else" | "do" | "new" | "void" | "delete"
    )
}

fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Scan `source` and report the first point nesting exceeds `limit`
pub fn find_nesting_overflow(source: &str, limit: usize) -> Option<NestingOverflow> {
    let mut cursor = Cursor::new(source);
    let mut stack: Vec<Frame> = Vec::new();
    let mut depth = 0usize;
    // Prefix operators waiting for their operand
    let mut run = 0usize;
    let mut after_operand = false;

    let overflow = |cursor: &Cursor| NestingOverflow {
        limit,
        line: cursor.line,
        col: cursor.col,
    };

    while let Some(ch) = cursor.bump() {
        if let Some(Frame {
            kind: FrameKind::Template,
            ..
        }) = stack.last()
        {
            match ch {
                '\\' => {
                    cursor.bump();
                }
                '`' => {
                    if let Some(frame) = stack.pop() {
                        depth -= frame.cost;
                    }
                    after_operand = true;
                }
                '$' if cursor.eat('{') => {
                    stack.push(Frame {
                        kind: FrameKind::Substitution,
                        cost: 1,
                    });
                    depth += 1;
                    if depth > limit {
                        return Some(overflow(&cursor));
                    }
                    run = 0;
                    after_operand = false;
                }
                _ => {}
            }
            continue;
        }

        match ch {
            c if c.is_whitespace() => {}
            '/' if cursor.eat('/') => cursor.skip_line_comment(),
            '/' if cursor.eat('*') => cursor.skip_block_comment(),
            '"' | '\'' => {
                cursor.skip_string(ch);
                run = 0;
                after_operand = true;
            }
            '`' | '(' | '[' | '{' => {
                let kind = if ch == '`' {
                    FrameKind::Template
                } else {
                    FrameKind::Bracket(closer_for(ch))
                };
                let cost = 1 + run;
                stack.push(Frame { kind, cost });
                depth += cost;
                if depth > limit {
                    return Some(overflow(&cursor));
                }
                run = 0;
                after_operand = false;
            }
            ')' | ']' | '}' => {
                let closes = match stack.last().map(|f| f.kind) {
                    Some(FrameKind::Bracket(close)) => close == ch,
                    Some(FrameKind::Substitution) => ch == '}',
                    _ => false,
                };
                if closes {
                    if let Some(frame) = stack.pop() {
                        depth -= frame.cost;
                    }
                }
                run = 0;
                after_operand = ch != '}';
            }
            '!' if cursor.peek() != Some('=') => {
                run += 1;
                if depth + run > limit {
                    return Some(overflow(&cursor));
                }
                after_operand = false;
            }
            '-' if cursor.eat('-') => {}
            '-' if cursor.peek() != Some('=') && !after_operand => {
                run += 1;
                if depth + run > limit {
                    return Some(overflow(&cursor));
                }
            }
            c if is_word_char(c) => {
                let word = cursor.take_word(c);
                if word == "typeof" || word == "await" {
                    run += 1;
                    if depth + run > limit {
                        return Some(overflow(&cursor));
                    }
                    after_operand = false;
                } else {
                    run = 0;
                    after_operand = !is_operator_keyword(&word);
                }
            }
            _ => {
                run = 0;
                after_operand = false;
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parens(depth: usize) -> String {
        format!("{}1{}", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn test_ordinary_script_passes() {
        let script = r#"
export default async (ctx) => {
  const items = [{ a: [1, 2] }, { a: [3] }]
  // ((((((((
  const text = "))))(((("
  return items.map((i) => !i.a.length ? -1 : typeof i.a[0])
}
"#;
        assert_eq!(find_nesting_overflow(script, MAX_NESTING_DEPTH), None);
    }

    #[test]
    fn test_parentheses_at_limit() {
        assert_eq!(find_nesting_overflow(&parens(8), 8), None);
        let overflow = find_nesting_overflow(&parens(9), 8).expect("Too deep");
        assert_eq!((overflow.line, overflow.col), (1, 9));
    }

    #[test]
    fn test_prefix_chain_counts() {
        let script = format!("{}true", "!".repeat(2000));
        assert!(find_nesting_overflow(&script, MAX_NESTING_DEPTH).is_some());
        assert_eq!(find_nesting_overflow("!!!!true", 4), None);
        assert!(find_nesting_overflow("- - - - -1", 4).is_some());
    }

    #[test]
    fn test_subtraction_is_not_a_prefix() {
        assert_eq!(find_nesting_overflow("a - b - c - d - e - f", 2), None);
        assert_eq!(find_nesting_overflow("x -= 1; i--", 1), None);
    }

    #[test]
    fn test_template_substitutions_nest() {
        assert_eq!(find_nesting_overflow("`a ${ `b ${c}` }`", 4), None);
        assert!(find_nesting_overflow("`a ${ `b ${ (c) }` }`", 4).is_some());
    }

    #[test]
    fn test_brackets_in_template_text_are_ignored() {
        assert_eq!(find_nesting_overflow("`((((((((`", 2), None);
    }
}
