/// Split a script into batches separated by lines that contain only `GO`.
pub(super) fn split_on_go(raw: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut buf = String::new();
    for line in raw.lines() {
        if line.trim().eq_ignore_ascii_case("go") {
            batches.push(std::mem::take(&mut buf));
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    batches.push(buf);

    batches
        .into_iter()
        .map(|batch| batch.trim().to_string())
        .filter(|batch| !batch.is_empty())
        .collect()
}

/// Split a MySQL script into statements.
///
/// A statement ends at the current delimiter when it appears outside string
/// literals, quoted identifiers and comments.  The delimiter is `;` until a
/// `DELIMITER` line changes it; a custom delimiter is not part of the
/// statement sent to the server.  In the body of a `CREATE PROCEDURE`,
/// `FUNCTION`, `TRIGGER` or `EVENT`, a `;` inside an open compound block
/// (`BEGIN`, `IF`, `CASE`, `LOOP`, `WHILE`, `REPEAT`) does not end the
/// statement.
///
/// Comments between statements are dropped; comments inside a statement are
/// sent with it.
pub(super) fn split_on_terminator(raw: &str) -> Vec<String> {
    let bytes = raw.as_bytes();
    let mut statements = Vec::new();
    let mut delimiter = ";".to_string();
    let mut start: Option<usize> = None;
    let mut compound = Compound::default();
    let mut push = |sql: &str| {
        let sql = sql.trim();
        if !sql.is_empty() {
            statements.push(sql.to_string());
        }
    };

    let mut i = 0;
    while i < bytes.len() {
        let rest = &raw[i..];
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                start.get_or_insert(i);
                i = skip_quoted(bytes, i);
                continue;
            }
            b'#' => {
                i = line_end(bytes, i);
                continue;
            }
            b'-' if rest.starts_with("--")
                && bytes.get(i + 2).is_none_or(|b| b.is_ascii_whitespace()) =>
            {
                i = line_end(bytes, i);
                continue;
            }
            b'/' if rest.starts_with("/*") => {
                i = rest[2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            _ => {}
        }

        let Some(from) = start else {
            if bytes[i].is_ascii_whitespace() {
                i += 1;
            } else if let Some((custom, next)) = delimiter_directive(raw, i) {
                delimiter = custom;
                i = next;
            } else {
                start = Some(i);
            }
            continue;
        };

        if rest.starts_with(delimiter.as_str()) && (delimiter != ";" || !compound.is_open()) {
            let end = if delimiter == ";" { i + 1 } else { i };
            push(&raw[from..end]);
            start = None;
            compound = Compound::default();
            i += delimiter.len();
            continue;
        }

        if is_word_start(bytes[i]) {
            let end = word_end(bytes, i);
            compound.word(&raw[i..end], &raw[end..]);
            i = end;
            continue;
        }
        i += 1;
    }
    if let Some(from) = start {
        push(&raw[from..]);
    }

    statements
}

// Index just past the closing quote, honoring backslash escapes.
fn skip_quoted(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote != b'`' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |n| from + n)
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'@')
}

fn word_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| !(b.is_ascii_alphanumeric() || matches!(b, b'_' | b'@' | b'.')))
        .map_or(bytes.len(), |n| from + n)
}

// `DELIMITER <token>` on a line of its own, returning the token and the
// index of the end of the line.
fn delimiter_directive(raw: &str, at: usize) -> Option<(String, usize)> {
    let end = line_end(raw.as_bytes(), at);
    let line = raw[at..end].trim();
    let (keyword, token) = line.split_once(char::is_whitespace)?;
    if !keyword.eq_ignore_ascii_case("delimiter") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some((token.to_string(), end))
}

/// Tracks compound blocks in the body of a stored program.
#[derive(Debug, Default)]
struct Compound {
    routine: Routine,
    depth: usize,
    after_end: bool,
}

#[derive(Debug, Default, PartialEq)]
enum Routine {
    #[default]
    Unknown,
    Maybe,
    Yes,
    No,
}

impl Compound {
    fn is_open(&self) -> bool {
        self.routine == Routine::Yes && self.depth > 0
    }

    fn word(&mut self, word: &str, rest: &str) {
        let word = word.to_ascii_uppercase();
        match self.routine {
            Routine::Unknown => {
                self.routine = if word == "CREATE" {
                    Routine::Maybe
                } else {
                    Routine::No
                };
                return;
            }
            Routine::Maybe => {
                match word.as_str() {
                    "PROCEDURE" | "FUNCTION" | "TRIGGER" | "EVENT" => self.routine = Routine::Yes,
                    "TABLE" | "VIEW" | "INDEX" | "DATABASE" | "SCHEMA" | "USER" | "ROLE" => {
                        self.routine = Routine::No
                    }
                    _ => {}
                }
                return;
            }
            Routine::No => return,
            Routine::Yes => {}
        }

        let after_end = std::mem::take(&mut self.after_end);
        let next = rest.trim_start();
        let call = next.starts_with('(');
        match word.as_str() {
            "IF" | "CASE" | "LOOP" | "WHILE" | "REPEAT" if after_end => {}
            "END" => {
                self.depth = self.depth.saturating_sub(1);
                self.after_end = true;
            }
            "BEGIN" | "CASE" | "LOOP" | "WHILE" => self.depth += 1,
            "IF" | "REPEAT" if !call && !guard_clause(next) => self.depth += 1,
            _ => {}
        }
    }
}

// `IF EXISTS` and `IF NOT EXISTS` are clauses, not blocks.
fn guard_clause(next: &str) -> bool {
    let word = next
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    word.eq_ignore_ascii_case("exists") || word.eq_ignore_ascii_case("not")
}
