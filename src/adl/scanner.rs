// This module implements the line-oriented scanner of the architecture description language.
// The whole source lives in the session arena, so every token handed out is a slice of it and
// shares the model's lifetime. The cursor always sits on one line; the current character reads
// as '\n' at the end of a line and as 0 at end of file, which keeps the grammar code free of
// bounds checks. Whitespace skipping understands both comment styles and, when asked, runs the
// conditional-compilation preprocessor so untaken text is skipped as if it were blank. Opaque
// C++ text (expressions, %{ %} blocks) is captured verbatim, optionally wrapped in #line
// markers. Recording a diagnostic abandons the rest of the current line, which is the only
// error recovery the grammar needs.

//! Cursor, token readers and error reporting for description files.

use bumpalo::Bump;

use crate::adl::preproc::{PreprocError, Preprocessor, MAX_NESTING};
use crate::core::{AdlError, Diagnostic, DiagnosticKind, Diagnostics};

/// Marker appended to captured code when `#line` markers are enabled.
pub const END_LINE_MARKER: &str = "\n#line 999999\n";

/// Characters allowed in identifiers besides alphanumerics.
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b':' || b == b'#'
}

/// True if `token` is an optionally signed decimal integer surrounded by blanks.
pub fn is_int_token(token: &str) -> Option<i64> {
    let trimmed = token.trim_matches(|c: char| c <= ' ');
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Parenthesized expressions and hex literals are accepted wherever a
/// local operand name could appear.
pub fn is_literal_constant(param: &str) -> bool {
    if param.starts_with('(') {
        return true;
    }
    match param.strip_prefix("0x").or_else(|| param.strip_prefix("0X")) {
        Some(hex) => hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

pub struct Scanner<'a> {
    arena: &'a Bump,
    src: &'a str,
    pos: usize,
    line_start: usize,
    /// Index of the terminating '\n', or the source length.
    line_end: usize,
    line: usize,
    eof: bool,
    file_name: String,
    location_markers: bool,
    preproc: Preprocessor<'a>,
    diags: Diagnostics,
    fatal: Option<AdlError>,
}

impl<'a> Scanner<'a> {
    pub fn new(arena: &'a Bump, src: &'a str, file_name: &str, location_markers: bool) -> Self {
        let line_end = src.find('\n').unwrap_or(src.len());
        Self {
            arena,
            src,
            pos: 0,
            line_start: 0,
            line_end,
            line: 1,
            eof: src.is_empty(),
            file_name: file_name.to_string(),
            location_markers,
            preproc: Preprocessor::new(),
            diags: Diagnostics::new(),
            fatal: None,
        }
    }

    // ----- cursor -----

    pub fn cur(&self) -> u8 {
        if self.eof {
            0
        } else if self.pos >= self.line_end {
            b'\n'
        } else {
            self.src.as_bytes()[self.pos]
        }
    }

    pub fn peek(&self) -> u8 {
        let i = self.pos + 1;
        if self.eof || i > self.line_end {
            0
        } else if i == self.line_end {
            b'\n'
        } else {
            self.src.as_bytes()[i]
        }
    }

    /// True when the cursor sits on `%}`.
    pub fn at_block_end(&self) -> bool {
        self.cur() == b'%' && self.peek() == b'}'
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn location_markers(&self) -> bool {
        self.location_markers
    }

    pub fn next_char(&mut self) {
        if !self.eof && self.pos < self.line_end {
            self.pos += 1;
        }
    }

    pub fn next_line(&mut self) {
        if self.eof {
            return;
        }
        if self.line_end + 1 >= self.src.len() {
            self.eof = true;
            self.pos = self.src.len();
            return;
        }
        self.line_start = self.line_end + 1;
        self.line_end = self.src[self.line_start..]
            .find('\n')
            .map_or(self.src.len(), |i| self.line_start + i);
        self.pos = self.line_start;
        self.line += 1;
    }

    pub fn next_char_or_line(&mut self) {
        if self.cur() == b'\n' {
            self.next_line();
        } else {
            self.next_char();
        }
    }

    /// Abandon the rest of the current line.
    pub fn skip_to_eol(&mut self) {
        if !self.eof {
            self.pos = self.line_end;
        }
    }

    fn text(&self, start: usize, end: usize) -> &'a str {
        let src: &'a str = self.src;
        let end = end.min(src.len());
        src.get(start.min(end)..end).unwrap_or("")
    }

    /// Current offset, for later [`Scanner::slice_from`].
    pub fn mark(&self) -> usize {
        self.pos
    }

    pub fn slice_from(&self, start: usize) -> &'a str {
        self.text(start, self.pos)
    }

    pub fn rest_of_line(&self) -> &'a str {
        self.text(self.pos, self.line_end)
    }

    /// Only blanks precede the cursor on its line.
    pub fn at_line_head(&self) -> bool {
        self.text(self.line_start, self.pos).bytes().all(|b| b <= b' ')
    }

    pub fn alloc_str(&self, s: &str) -> &'a str {
        self.arena.alloc_str(s)
    }

    // ----- diagnostics -----

    fn error_context(&self) -> String {
        let bytes = self.src.as_bytes();
        let pos = self.pos.min(self.line_end);
        let head = String::from_utf8_lossy(&bytes[self.line_start.min(pos)..pos]);
        let tail_start = (pos + 1).min(self.line_end);
        let tail = String::from_utf8_lossy(&bytes[tail_start..self.line_end]);
        format!("{}>>>{}<<<{}", head, self.cur() as char, tail)
    }

    /// Record a diagnostic at the current line and skip the rest of it.
    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let context = if kind == DiagnosticKind::Syntax && !self.eof {
            Some(self.error_context())
        } else {
            None
        };
        self.diags.push(Diagnostic {
            kind,
            file: self.file_name.clone(),
            line: self.line,
            message: message.into(),
            context,
        });
        self.skip_to_eol();
    }

    /// Record a diagnostic attributed to an earlier line without moving.
    pub fn report_at(&mut self, kind: DiagnosticKind, line: usize, message: impl Into<String>) {
        self.diags.push(Diagnostic {
            kind,
            file: self.file_name.clone(),
            line,
            message: message.into(),
            context: None,
        });
    }

    pub fn syntax_error(&mut self, message: impl Into<String>) {
        self.report(DiagnosticKind::Syntax, message);
    }

    pub fn semantic_error(&mut self, message: impl Into<String>) {
        self.report(DiagnosticKind::Semantic, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.report(DiagnosticKind::Warning, message);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diags
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diags)
    }

    pub fn take_fatal(&mut self) -> Option<AdlError> {
        self.fatal.take()
    }

    pub fn preproc(&self) -> &Preprocessor<'a> {
        &self.preproc
    }

    pub fn preproc_mut(&mut self) -> &mut Preprocessor<'a> {
        &mut self.preproc
    }

    // ----- whitespace and preprocessing -----

    pub fn skip_ws(&mut self) {
        self.skip_ws_common(true);
    }

    pub fn skip_ws_no_preproc(&mut self) {
        self.skip_ws_common(false);
    }

    fn skip_ws_common(&mut self, do_preproc: bool) {
        loop {
            if self.eof {
                return;
            }
            let c = self.cur();
            if c == b'\n' {
                if !do_preproc {
                    return;
                }
                self.next_line();
                continue;
            }
            if c == b'/' && self.peek() == b'/' {
                self.pos = self.line_end;
                continue;
            }
            if c == b'/' && self.peek() == b'*' {
                self.skip_block_comment();
                continue;
            }
            if do_preproc && c == b'#' {
                if !self.handle_preproc() {
                    return;
                }
                continue;
            }
            let taken = !do_preproc || self.preproc.is_taken();
            if c > b' ' && taken {
                return;
            }
            if !taken && (c == b'"' || c == b'\'') {
                self.skip_untaken_string(c);
                continue;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        loop {
            if self.eof {
                self.syntax_error("end-of-file detected inside comment");
                return;
            }
            match self.cur() {
                b'\n' => self.next_line(),
                b'*' if self.peek() == b'/' => {
                    self.pos += 2;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_untaken_string(&mut self, quote: u8) {
        loop {
            self.pos += 1;
            let c = self.cur();
            if c == quote {
                self.pos += 1;
                return;
            }
            if c == b'\\' {
                self.pos += 1;
            }
            let c = self.cur();
            if c == b'\n' || c == 0 {
                self.syntax_error("newline in string");
                return;
            }
        }
    }

    fn begin_if(&mut self, taken: bool) {
        if let Err(PreprocError::TooDeep) = self.preproc.begin_if(taken) {
            log::error!("{}({}): #ifdef nesting too deep", self.file_name, self.line);
            self.fatal = Some(AdlError::PreprocessorNesting {
                file: self.file_name.clone(),
                line: self.line,
                limit: MAX_NESTING,
            });
            self.eof = true;
            self.pos = self.src.len();
        }
    }

    fn ensure_end_of_line(&mut self) {
        self.skip_ws_no_preproc();
        let c = self.cur();
        if c != b'\n' && c != 0 {
            self.syntax_error(format!("garbage char '{}' at end of line", c as char));
        } else {
            self.next_char_or_line();
        }
    }

    /// Process a directive at '#'. Returns `false` only for a taken
    /// `#define`/`#undef`/`#line`, leaving the cursor on the '#'.
    fn handle_preproc(&mut self) -> bool {
        let hash = self.pos;
        let prefix = self.text(self.line_start, hash);
        if prefix.bytes().any(|b| b > b' ') {
            self.syntax_error("'#' must be at beginning of line");
            return true;
        }
        self.next_char();
        self.skip_ws_no_preproc();
        let start_ident = self.pos;
        if self.cur() == b'\n' || self.eof {
            self.syntax_error("expected preprocessor command, got end of line");
            return true;
        }
        let Some(cmd) = self.ident_no_preproc() else {
            return true;
        };
        match cmd {
            "ifdef" | "ifndef" => {
                let flag = self.ident_no_preproc();
                self.ensure_end_of_line();
                let defined =
                    self.preproc.is_taken() && flag.is_some_and(|f| self.preproc.is_defined(f));
                self.begin_if(if cmd == "ifdef" { defined } else { !defined });
            }
            "if" => {
                if self.preproc.is_taken() {
                    let rest = self.rest_of_line().trim();
                    self.syntax_error(format!("unimplemented: #if {}", rest));
                }
                self.next_line();
                self.begin_if(true);
            }
            "else" => match self.preproc.invert() {
                Ok(()) => self.ensure_end_of_line(),
                Err(e) => self.syntax_error(e.message()),
            },
            "endif" => match self.preproc.end() {
                Ok(()) => self.ensure_end_of_line(),
                Err(e) => self.syntax_error(e.message()),
            },
            _ if self.preproc.is_taken() => {
                if start_ident != hash + 1 {
                    self.syntax_error("no space allowed after # in #define or #undef");
                    return true;
                }
                self.pos = hash;
                return false;
            }
            _ => {}
        }
        true
    }

    /// `#line N ["file"]`, cursor after the directive name.
    pub fn line_directive(&mut self) {
        let line = self.int();
        self.skip_ws_no_preproc();
        let mut file = None;
        if self.cur() == b'"' {
            self.next_char();
            let start = self.pos;
            loop {
                match self.cur() {
                    b'\n' | 0 => {
                        self.syntax_error("missing '\"' at end of #line directive");
                        return;
                    }
                    b'"' => {
                        file = Some(self.slice_from(start));
                        self.next_char();
                        self.skip_ws_no_preproc();
                        break;
                    }
                    _ => self.next_char(),
                }
            }
        }
        self.ensure_end_of_line();
        if let Some(file) = file {
            self.file_name = file.to_string();
        }
        if let Some(line) = line {
            // The cursor already moved to the line following the directive.
            self.line = line.max(0) as usize;
        }
    }

    /// `#define NAME VALUE`, cursor after the directive name.
    pub fn define_directive(&mut self) {
        let flag = self.ident_no_preproc();
        self.skip_ws_no_preproc();
        let def = self.ident_no_preproc();
        if let (Some(flag), Some(def)) = (flag, def) {
            self.preproc.define(flag, def);
        }
        self.skip_ws_no_preproc();
        if self.cur() != b'\n' && !self.eof {
            self.syntax_error("non-identifier in preprocessor definition");
        }
    }

    /// `#undef NAME`, cursor after the directive name.
    pub fn undef_directive(&mut self) {
        let flag = self.ident_no_preproc();
        self.skip_ws_no_preproc();
        self.ensure_end_of_line();
        if let Some(flag) = flag {
            self.preproc.undefine(flag);
        }
    }

    // ----- tokens -----

    pub fn ident(&mut self) -> Option<&'a str> {
        self.ident_common(true)
    }

    pub fn ident_no_preproc(&mut self) -> Option<&'a str> {
        self.ident_common(false)
    }

    fn ident_common(&mut self, do_preproc: bool) -> Option<&'a str> {
        if self.eof {
            return None;
        }
        self.skip_ws_common(do_preproc);
        if self.eof {
            return None;
        }
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut end = start;
        while end < self.line_end && is_ident_byte(bytes[end]) {
            end += 1;
        }
        if start == end {
            let rest = String::from_utf8_lossy(&bytes[start.min(self.line_end)..self.line_end]);
            let shown = if rest.len() > 24 {
                let cut: String = rest.chars().take(20).collect();
                format!("{}[...]", cut)
            } else {
                rest.into_owned()
            };
            self.syntax_error(format!("Identifier expected, but found '{}'.", shown));
            return None;
        }
        self.pos = end;
        let token = self.text(start, end);
        if !do_preproc {
            return Some(token);
        }
        let Some(def1) = self.preproc.get(token).filter(|d| *d != token) else {
            return Some(token);
        };
        let Some(def2) = self.preproc.get(def1).filter(|d| *d != def1) else {
            return Some(def1);
        };
        if let Some(def3) = self.preproc.get(def2) {
            if def3 != def2 && def3 != def1 {
                self.syntax_error(format!(
                    "unimplemented: using {} defined as {} => {} => {}",
                    token, def1, def2, def3
                ));
            }
        }
        Some(def2)
    }

    /// Optionally signed decimal integer.
    pub fn int(&mut self) -> Option<i64> {
        if self.eof {
            return None;
        }
        self.skip_ws();
        let start = self.pos;
        if self.cur() == b'-' {
            self.next_char();
        }
        while self.cur().is_ascii_digit() {
            self.next_char();
        }
        match self.slice_from(start).parse::<i64>() {
            Ok(value) => Some(value),
            Err(_) => {
                self.syntax_error(format!("integer expected at {}", self.cur() as char));
                None
            }
        }
    }

    /// One of `==`, `!=`, `<=`, `>=`.
    pub fn relation(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let start = self.pos;
        let first = self.cur();
        let second = self.peek();
        if matches!(first, b'=' | b'!' | b'<' | b'>') && second == b'=' {
            self.next_char();
            self.next_char();
            return Some(self.slice_from(start));
        }
        let shown = self.text(start, (start + 2).min(self.line_end));
        self.syntax_error(format!("relational operator expected at {}", shown));
        None
    }

    /// Opaque text up to one of `stops` at parenthesis depth zero.
    pub fn expr(&mut self, desc: &str, stops: &str) -> Option<&'a str> {
        let start = self.pos;
        let mut depth = 0usize;
        while depth > 0 || !stops.as_bytes().contains(&self.cur()) {
            match self.cur() {
                b'(' => {
                    depth += 1;
                    self.next_char();
                }
                b')' => {
                    if depth == 0 {
                        self.syntax_error(format!(
                            "too many )'s, did not find {} after {}",
                            stops, desc
                        ));
                        return None;
                    }
                    depth -= 1;
                    self.next_char();
                }
                q @ (b'"' | b'\'') => loop {
                    self.next_char();
                    let c = self.cur();
                    if c == q {
                        self.next_char();
                        break;
                    }
                    if c == b'\\' {
                        self.next_char();
                    }
                    if self.cur() == b'\n' || self.cur() == 0 {
                        self.syntax_error(format!("newline in string in {}", desc));
                        return None;
                    }
                },
                b'%' if matches!(self.peek(), b'{' | b'}') => {
                    let c = self.peek() as char;
                    self.syntax_error(format!("unexpected %{} in {}", c, desc));
                    return None;
                }
                0 => {
                    self.syntax_error(format!("unexpected EOF in {}", desc));
                    return None;
                }
                _ => {
                    let before = (self.pos, self.line);
                    self.skip_ws();
                    if before == (self.pos, self.line) {
                        self.next_char();
                    }
                }
            }
        }
        Some(self.slice_from(start))
    }

    /// `( expr )`. Non-integer text is wrapped in `#line` markers on request.
    pub fn paren_expr(&mut self, desc: &str, with_location: bool) -> Option<&'a str> {
        let line = self.line;
        if self.cur() != b'(' {
            return None;
        }
        self.next_char();
        let token = self.expr(desc, ")")?;
        if self.cur() == b')' {
            self.next_char();
        }
        if with_location && self.location_markers && is_int_token(token).is_none() {
            let wrapped = format!("{}{}{}", self.line_marker(line), token, END_LINE_MARKER);
            return Some(self.alloc_str(&wrapped));
        }
        Some(token)
    }

    /// Identifier, or a parenthesized literal expression.
    pub fn ident_or_literal(&mut self, desc: &str) -> Option<&'a str> {
        self.skip_ws();
        if self.cur() != b'(' {
            return self.ident();
        }
        let param = self.paren_expr(desc, false)?;
        if param.starts_with('(') {
            Some(param)
        } else {
            Some(self.alloc_str(&format!("({})", param)))
        }
    }

    pub fn line_marker(&self, line: usize) -> String {
        format!("\n#line {} \"{}\"\n", line, self.file_name)
    }

    /// Verbatim text between `%{` and `%}`; cursor on the '%'.
    pub fn cpp_block(&mut self, desc: &str) -> Option<&'a str> {
        if self.cur() != b'%' {
            return None;
        }
        self.next_char();
        if self.cur() != b'{' {
            self.syntax_error(format!("missing '{{' in {}", desc));
            return None;
        }
        self.next_char();
        self.skip_ws_no_preproc();
        let start = self.pos;
        let line = self.line;
        while !self.at_block_end() && !self.eof {
            self.next_char_or_line();
        }
        if self.eof {
            self.syntax_error(format!("invalid termination of {}", desc));
            return None;
        }
        let block = self.slice_from(start);
        self.next_char();
        self.next_char();
        if self.location_markers {
            let wrapped = format!("{}{}{}", self.line_marker(line), block, END_LINE_MARKER);
            return Some(self.alloc_str(&wrapped));
        }
        Some(block)
    }

    /// Replacement variable. With `keep_dollar` the returned text starts
    /// with every `$`; otherwise the first one is dropped.
    pub fn rep_var(&mut self, keep_dollar: bool) -> Option<&'a str> {
        if self.cur() != b'$' {
            return None;
        }
        let start = self.pos;
        self.next_char();
        let body = self.pos;
        for _ in 0..2 {
            if self.cur() == b'$' {
                self.next_char();
            }
        }
        if self.cur() == b'$' {
            self.syntax_error("Replacement variables and field specifiers can not start with '$$$$'");
            return None;
        }
        let name_start = self.pos;
        let bytes = self.src.as_bytes();
        let mut stop = name_start;
        while stop < self.line_end && is_ident_byte(bytes[stop]) {
            stop += 1;
        }
        if stop == name_start {
            let c = self.cur() as char;
            self.syntax_error(format!("Identifier expected, but found '{}'.", c));
            return None;
        }
        self.pos = stop;
        Some(self.text(if keep_dollar { start } else { body }, stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner<'a>(arena: &'a Bump, text: &str) -> Scanner<'a> {
        let src = arena.alloc_str(text);
        Scanner::new(arena, src, "test.ad", false)
    }

    #[test]
    fn test_cursor_sentinels() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "ab\nc");
        assert_eq!(s.cur(), b'a');
        s.next_char();
        s.next_char();
        assert_eq!(s.cur(), b'\n');
        s.next_char_or_line();
        assert_eq!((s.cur(), s.line()), (b'c', 2));
        s.next_char();
        s.next_line();
        assert!(s.is_eof());
        assert_eq!(s.cur(), 0);
    }

    #[test]
    fn test_comments_are_whitespace() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "// line\n  /* block\n still */ name");
        assert_eq!(s.ident(), Some("name"));
        assert_eq!(s.line(), 3);
    }

    #[test]
    fn test_unterminated_comment() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "/* open\n");
        s.skip_ws();
        assert_eq!(
            s.diagnostics().count_containing("end-of-file detected inside comment"),
            1
        );
    }

    #[test]
    fn test_ident_error_truncates_context() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "(abcdefghijklmnopqrstuvwxyz");
        assert_eq!(s.ident(), None);
        let d = s.diagnostics().iter().next().unwrap();
        assert_eq!(
            d.message,
            "Identifier expected, but found '(abcdefghijklmnopqrs[...]'."
        );
        assert!(d.context.as_deref().unwrap().starts_with(">>>(<<<"));
    }

    #[test]
    fn test_define_substitution() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "A");
        s.preproc_mut().define("A", "B");
        s.preproc_mut().define("B", "C");
        assert_eq!(s.ident(), Some("C"));

        let mut s = scanner(&arena, "A");
        s.preproc_mut().define("A", "B");
        s.preproc_mut().define("B", "C");
        s.preproc_mut().define("C", "D");
        s.ident();
        assert_eq!(
            s.diagnostics()
                .count_containing("unimplemented: using A defined as B => C => D"),
            1
        );
    }

    #[test]
    fn test_ifdef_else_selects_branch() {
        let arena = Bump::new();
        let mut s = scanner(
            &arena,
            "#ifdef UNDEFINED\nfirst \"skipped ' string\"\n#else\nsecond\n#endif\n",
        );
        assert_eq!(s.ident(), Some("second"));
        s.skip_ws();
        assert!(s.is_eof());
        assert!(s.diagnostics().is_empty());
        assert_eq!(s.preproc().depth(), 0);
    }

    #[test]
    fn test_directive_errors() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "#else\n#ifdef X junk\n#endif\nx #endif\n");
        s.skip_ws();
        let diags = s.diagnostics();
        assert_eq!(diags.count_containing("#else without #ifdef"), 1);
        assert_eq!(diags.count_containing("garbage char 'j' at end of line"), 1);
    }

    #[test]
    fn test_nesting_is_fatal() {
        let arena = Bump::new();
        let text = "#ifdef X\n".repeat(MAX_NESTING + 1);
        let mut s = scanner(&arena, &text);
        s.skip_ws();
        assert!(s.is_eof());
        assert!(matches!(
            s.take_fatal(),
            Some(AdlError::PreprocessorNesting { limit: 20, .. })
        ));
    }

    #[test]
    fn test_taken_define_returns_to_caller() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "\n#define X Y\n");
        assert_eq!(s.ident(), Some("#define"));
        s.define_directive();
        assert_eq!(s.preproc().get("X"), Some("Y"));
    }

    #[test]
    fn test_int_and_relation() {
        let arena = Bump::new();
        let mut s = scanner(&arena, " -12 <= x");
        assert_eq!(s.int(), Some(-12));
        assert_eq!(s.relation(), Some("<="));

        let mut s = scanner(&arena, "< x");
        assert_eq!(s.relation(), None);
        assert_eq!(s.diagnostics().count_containing("relational operator expected"), 1);
    }

    #[test]
    fn test_expr_balances_parens_and_strings() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "(f(a, \")\") + 1);");
        assert_eq!(s.paren_expr("predicate", false), Some("f(a, \")\") + 1"));
        assert_eq!(s.cur(), b';');

        let mut s = scanner(&arena, "a ) ,");
        assert_eq!(s.expr("reg_def", ","), None);
        assert_eq!(
            s.diagnostics()
                .count_containing("too many )'s, did not find , after reg_def"),
            1
        );
    }

    #[test]
    fn test_cpp_block_with_markers() {
        let arena = Bump::new();
        let src = arena.alloc_str("%{ int x;\n  x++; %} tail");
        let mut s = Scanner::new(&arena, src, "cpu.ad", true);
        let block = s.cpp_block("source block").unwrap();
        assert_eq!(
            block,
            "\n#line 1 \"cpu.ad\"\nint x;\n  x++; \n#line 999999\n"
        );
        assert_eq!(s.ident(), Some("tail"));
    }

    #[test]
    fn test_cpp_block_unterminated() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "%{ never closed\n");
        assert_eq!(s.cpp_block("source block"), None);
        assert_eq!(
            s.diagnostics()
                .count_containing("invalid termination of source block"),
            1
        );
    }

    #[test]
    fn test_rep_vars() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "$dst $$template $$$$bad");
        assert_eq!(s.rep_var(false), Some("dst"));
        s.skip_ws();
        assert_eq!(s.rep_var(true), Some("$$template"));
        s.skip_ws();
        assert_eq!(s.rep_var(true), None);
        assert_eq!(s.diagnostics().count_containing("'$$$$'"), 1);
    }

    #[test]
    fn test_literal_constants() {
        assert!(is_literal_constant("0x1F"));
        assert!(is_literal_constant("(1 << 3)"));
        assert!(!is_literal_constant("0xZZ"));
        assert!(!is_literal_constant("dst"));
        assert_eq!(is_int_token(" 42 "), Some(42));
        assert_eq!(is_int_token("x"), None);
    }

    #[test]
    fn test_line_directive() {
        let arena = Bump::new();
        let mut s = scanner(&arena, "#line 100 \"other.ad\"\nnext");
        assert_eq!(s.ident(), Some("#line"));
        s.line_directive();
        assert_eq!(s.file_name(), "other.ad");
        assert_eq!(s.ident(), Some("next"));
        assert_eq!(s.line(), 100);
    }
}
