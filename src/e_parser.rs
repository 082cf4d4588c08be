//! Line-buffered state machine that turns javac's human-oriented output into
//! [`Diagnostic`] records.
//!
//! javac writes three kinds of blocks:
//!
//! * positioned blocks: `File.java:12: message`, the offending source line,
//!   a caret line pointing at the column, then indented detail lines;
//! * keyword blocks introduced by `error: `, `warning: ` or `Note: `
//!   (or one of their localized spellings);
//! * free text: verbose `[...]` lines, the `N errors` summary, launcher
//!   failures and, when the compiler crashes, a Java stack trace.
//!
//! Lines are fed one at a time. A block stays open while continuation lines are
//! indented and is closed by the next unindented line, a blank line or the end
//! of the stream.

use crate::e_types::{Diagnostic, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, BufRead};

// compiler.warn.warning in javac's compiler.properties (en, ja, zh_CN)
const WARNING_PREFIXES: &[&str] = &["warning: ", "\u{8b66}\u{544a}: ", "\u{8b66}\u{544a}\u{ff1a} "];

// compiler.note.note
const NOTE_PREFIXES: &[&str] = &["Note: ", "\u{6ce8}: ", "\u{6ce8}\u{610f}\u{ff1a} "];

const ERROR_PREFIXES: &[&str] = &["error: "];

// compiler.misc.verbose
const MISC_PREFIXES: &[&str] = &["["];

// javac.msg.bug always links one of these, whatever the JVM locale.
const BUGREPORT_URLS: &[&str] = &["java.sun.com/webapps/bugreport", "bugreport.java.com"];

const COLON: &[char] = &[':'];
const EOL: &[char] = &['\r', '\n'];

/// Matches roughly 95% of the exception names the JDK throws (checked against JDK 21).
static STACK_TRACE_FIRST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?:[A-Za-z0-9_+.-]+\.)[A-Za-z0-9_$]*?(?:",
        r"Exception|Error|Throwable|Failure|Result|Abort|Fault|ThreadDeath|Overflow|Warning|",
        r"NotSupported|NotFound|BadArgs|BadClassFile|Illegal|Invalid|Unexpected|Unchecked|Unmatched[A-Za-z0-9_]+",
        r").*$"
    ))
    .expect("valid stack trace header regex")
});

/// `Caused by:` lines, stack frames and `... N more` elisions.
static STACK_TRACE_OTHER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:Caused by:\s.*|\s*at .*|\s*\.\.\.\s\d+\smore)$")
        .expect("valid stack trace continuation regex")
});

/// Launcher failures: `javac:` usage errors, VM and boot layer initialization errors.
static JAVAC_OR_JVM_ERROR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A(?:javac:|Error occurred during initialization of (?:boot layer|VM))")
        .expect("valid launcher error regex")
});

/// What the parser is currently accumulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// No classified block is open. The buffer may hold narrative lines that are
    /// either salvaged as a stack trace or dropped when the block is finalized.
    Idle,
    /// A block opened by a keyword prefix; the value is its working severity.
    Prefixed(Severity),
    /// The buffer contains a caret line and will be read as a positioned diagnostic.
    Pointer,
}

/// Incremental parser over the merged stdout/stderr text of one javac run.
#[derive(Debug)]
pub struct DiagnosticParser {
    exit_code: i32,
    state: BlockState,
    buffer: String,
    trailing_trace: usize,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticParser {
    pub fn new(exit_code: i32) -> Self {
        DiagnosticParser {
            exit_code,
            state: BlockState::Idle,
            buffer: String::new(),
            trailing_trace: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Diagnostics emitted so far, in order of appearance.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of consecutive stack-trace shaped lines ending at the last line fed.
    pub fn trailing_trace_lines(&self) -> usize {
        self.trailing_trace
    }

    pub fn feed_line(&mut self, line: &str) {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            self.finalize_block();
            self.track_stack_trace(line);
            return;
        }

        self.track_stack_trace(line);

        if !starts_with_whitespace(line) {
            self.close_block();
        }

        if let Some((severity, _)) = classify_prefix(line) {
            self.buffer.clear();
            self.buffer.push_str(line);
            self.buffer.push('\n');
            self.state = BlockState::Prefixed(severity);
            return;
        }

        if self.buffer.is_empty() && starts_with_any(line, MISC_PREFIXES).is_some() {
            // verbose output was requested
            self.diagnostics
                .push(Diagnostic::unlocated(Severity::Other, line));
            return;
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        if line.ends_with('^') {
            self.state = BlockState::Pointer;
        }
    }

    /// Finalizes whatever is still pending and returns every diagnostic.
    pub fn finish(mut self) -> Vec<Diagnostic> {
        self.finalize_block();
        self.diagnostics
    }

    fn track_stack_trace(&mut self, line: &str) {
        let is_trace = (self.trailing_trace == 0 && STACK_TRACE_FIRST_LINE.is_match(line))
            || STACK_TRACE_OTHER_LINE.is_match(line);
        if is_trace {
            self.trailing_trace += 1;
        } else {
            self.trailing_trace = 0;
        }
    }

    /// Emits a pending positioned or keyword block because an unindented line started.
    fn close_block(&mut self) {
        match self.state {
            BlockState::Idle => return,
            BlockState::Pointer => {
                let diagnostic = parse_positioned(self.exit_code, &self.buffer);
                self.diagnostics.push(diagnostic);
            }
            BlockState::Prefixed(severity) => {
                let diagnostic = prefixed_diagnostic(severity, &self.buffer);
                self.diagnostics.push(diagnostic);
            }
        }
        self.buffer.clear();
        self.state = BlockState::Idle;
    }

    /// Emits the pending block at a blank line or at the end of the stream.
    fn finalize_block(&mut self) {
        if !self.buffer.is_empty() {
            if JAVAC_OR_JVM_ERROR.is_match(&self.buffer) {
                self.diagnostics
                    .push(Diagnostic::unlocated(Severity::Error, self.buffer.as_str()));
            } else {
                match self.state {
                    BlockState::Pointer => {
                        let diagnostic = parse_positioned(self.exit_code, &self.buffer);
                        self.diagnostics.push(diagnostic);
                    }
                    BlockState::Prefixed(severity) => {
                        let diagnostic = prefixed_diagnostic(severity, &self.buffer);
                        self.diagnostics.push(diagnostic);
                    }
                    BlockState::Idle if self.trailing_trace > 0 => {
                        let diagnostic = salvage_stack_trace(&self.buffer, self.trailing_trace);
                        self.diagnostics.push(diagnostic);
                    }
                    BlockState::Idle => {
                        log::trace!("discarding unclassified compiler output: {:?}", self.buffer);
                    }
                }
            }
        }
        self.buffer.clear();
        self.state = BlockState::Idle;
    }
}

/// Parses a complete output text.
pub fn parse_output(exit_code: i32, text: &str) -> Vec<Diagnostic> {
    let mut parser = DiagnosticParser::new(exit_code);
    for line in text.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

/// Parses output read line by line from `reader`.
///
/// Lines are decoded lossily, so output in a legacy console encoding still
/// yields its diagnostics. Only read failures are returned.
pub fn parse_stream<R: BufRead>(exit_code: i32, reader: R) -> io::Result<Vec<Diagnostic>> {
    let mut parser = DiagnosticParser::new(exit_code);
    for line in reader.split(b'\n') {
        parser.feed_line(&String::from_utf8_lossy(&line?));
    }
    Ok(parser.finish())
}

fn starts_with_whitespace(line: &str) -> bool {
    line.starts_with(|c: char| c == ' ' || c == '\t')
}

fn starts_with_any<'p>(line: &str, prefixes: &[&'p str]) -> Option<&'p str> {
    prefixes.iter().copied().find(|prefix| line.starts_with(prefix))
}

/// Severity and matched keyword for lines such as `warning: ...` or `Note: ...`.
fn classify_prefix(line: &str) -> Option<(Severity, &'static str)> {
    if let Some(prefix) = starts_with_any(line, ERROR_PREFIXES) {
        Some((Severity::Error, prefix))
    } else if let Some(prefix) = starts_with_any(line, WARNING_PREFIXES) {
        Some((Severity::Warning, prefix))
    } else {
        starts_with_any(line, NOTE_PREFIXES).map(|prefix| (Severity::Note, prefix))
    }
}

fn prefixed_diagnostic(severity: Severity, buffer: &str) -> Diagnostic {
    let text = buffer.trim();
    let message = match classify_prefix(text) {
        Some((_, prefix)) => &text[prefix.len()..],
        None => text,
    };
    Diagnostic::unlocated(severity, message.trim())
}

/// Keeps the last `trace_lines` buffered lines, plus the crash-report header
/// right above them when it links the bug report page.
fn salvage_stack_trace(buffer: &str, trace_lines: usize) -> Diagnostic {
    let lines: Vec<&str> = buffer.lines().collect();
    let mut first = lines.len().saturating_sub(trace_lines);

    // The annotation processor variant of the crash header has no locale
    // independent marker and spans several lines, so it is not folded in.
    if first > 0 {
        let header = lines[first - 1];
        if BUGREPORT_URLS.iter().any(|url| header.contains(url)) {
            first -= 1;
        }
    }

    Diagnostic::unlocated(Severity::Error, lines[first..].join("\n"))
}

#[derive(Debug, PartialEq, Eq)]
enum PositionError {
    NoMoreTokens,
    Malformed,
}

/// Splits on runs of delimiters. The delimiter set may change between calls.
struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Tokens { text, pos: 0 }
    }

    fn next_token(&mut self, delims: &[char]) -> Result<&'a str, PositionError> {
        let rest = &self.text[self.pos..];
        let skipped = rest
            .find(|c: char| !delims.contains(&c))
            .ok_or(PositionError::NoMoreTokens)?;
        let start = self.pos + skipped;
        let tail = &self.text[start..];
        let len = tail.find(|c: char| delims.contains(&c)).unwrap_or(tail.len());
        self.pos = start + len;
        Ok(&tail[..len])
    }

    fn has_more_tokens(&self, delims: &[char]) -> bool {
        self.text[self.pos..].chars().any(|c| !delims.contains(&c))
    }
}

/// Reads one positioned block:
///
/// ```text
/// <file>:<line>: <message>
/// <source line>
/// <caret line>
/// [detail lines...]
/// ```
///
/// The file may itself contain colons; everything before the first integer
/// token is the file. The start column is the caret offset; the end column is
/// the next space in the source line at or after it, or the line length.
///
/// Malformed blocks never fail: they come back as unlocated diagnostics quoting
/// the raw text.
pub fn parse_positioned(exit_code: i32, block: &str) -> Diagnostic {
    let mut is_error = exit_code != 0;
    match read_positioned(exit_code, block, &mut is_error) {
        Ok(diagnostic) => diagnostic,
        Err(err) => {
            let severity = if is_error {
                Severity::Error
            } else {
                Severity::Warning
            };
            let reason = match err {
                PositionError::NoMoreTokens => "no more tokens - could not parse error message: ",
                PositionError::Malformed => "could not parse error message: ",
            };
            log::debug!("{}{:?}", reason, block);
            Diagnostic::unlocated(severity, format!("{}{}", reason, block))
        }
    }
}

fn read_positioned(
    exit_code: i32,
    block: &str,
    is_error: &mut bool,
) -> Result<Diagnostic, PositionError> {
    let mut tokens = Tokens::new(block);

    // Newer javac releases print extra tokens before the file; everything up to
    // the line indicator is glued back together as the file name.
    let mut file: Option<String> = None;
    let line = loop {
        let token = tokens.next_token(COLON)?;
        if let Ok(line) = token.parse::<i32>() {
            break line;
        }
        match file.as_mut() {
            Some(file) => {
                file.push(':');
                file.push_str(token);
            }
            None => file = Some(token.to_string()),
        }
    };

    let mut file = file.ok_or(PositionError::Malformed)?;
    // annotation processing round markers: `[round 1 ...]` on the line above
    if let Some(bracket) = file.rfind(']') {
        let rest = &file[bracket + 1..];
        let rest = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);
        file = rest.to_string();
    }

    let msg = tokens.next_token(EOL)?;
    let mut msg = msg.get(2..).ok_or(PositionError::Malformed)?;

    match starts_with_any(msg, WARNING_PREFIXES) {
        Some(prefix) => {
            *is_error = false;
            msg = &msg[prefix.len()..];
        }
        None => *is_error = exit_code != 0,
    }

    let mut message = String::from(msg);
    message.push('\n');

    let mut context = tokens.next_token(EOL)?;
    let mut pointer: Option<&str> = None;

    loop {
        let msg_line = tokens.next_token(EOL)?;
        if pointer.is_some() {
            message.push_str(msg_line);
            message.push('\n');
        } else if msg_line.ends_with('^') {
            pointer = Some(msg_line);
        } else {
            message.push_str(context);
            message.push('\n');
            context = msg_line;
        }
        if !tokens.has_more_tokens(EOL) {
            break;
        }
    }

    let pointer = pointer.ok_or(PositionError::Malformed)?;
    let start_column = pointer
        .chars()
        .position(|c| c == '^')
        .ok_or(PositionError::Malformed)?;
    let end_column = context
        .chars()
        .enumerate()
        .skip(start_column)
        .find(|(_, c)| *c == ' ')
        .map(|(idx, _)| idx)
        .unwrap_or_else(|| context.chars().count());

    let severity = if *is_error {
        Severity::Error
    } else {
        Severity::Warning
    };

    Ok(Diagnostic::positioned(
        severity,
        file,
        line,
        start_column,
        end_column,
        message.trim(),
    ))
}
