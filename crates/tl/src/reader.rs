//! The reader.
//!
//! Turns source text into values, one top-level value per call. It is a
//! single pass over the bytes driven by a small state machine; nested lists
//! are tracked with an explicit stack of open-list frames rather than native
//! recursion, so nesting depth is bounded only by memory.
//!
//! ```text
//! list    := '(' value* ['.' value] ')'
//! value   := list | string | number | symbol | literal
//! string  := '"' byte* '"'
//! number  := ['+' | '-'] digit+ ['.' digit+]
//! symbol  := ident ('.' ident)*
//! literal := '#true' | '#false' | '#nil'
//! ```
//!
//! The end of the input acts like one trailing space, so a final token does
//! not need a delimiter after it. On any error everything built so far is
//! freed before the error is returned.

use crate::error::{Error, ParseError, ParseErrorKind, Result};
use crate::heap::Heap;
use crate::value::{NodeId, Value};

/// Result of reading one value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parsed {
    /// The value, or `None` if the input held only whitespace.
    pub value: Option<Value>,
    /// Bytes used, up to and including the value's last byte. A delimiter
    /// that ended a token is not counted.
    pub consumed: usize,
}

/// Reads one value from the start of `src`.
///
/// # Errors
///
/// [`Error::Parse`] for malformed input, [`Error::OutOfMemory`] if the heap
/// refuses an allocation. Nothing read so far stays allocated.
pub fn parse(heap: &mut Heap, src: &[u8]) -> Result<Parsed> {
    let mut reader = Reader::new(heap);
    match reader.run(src) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            reader.abandon();
            Err(err)
        }
    }
}

/// Whitespace between tokens.
#[must_use]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Bytes that may start an identifier segment.
#[must_use]
pub fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
        || matches!(
            b,
            b'_' | b'!' | b'~' | b'$' | b'%' | b'^' | b':' | b'/' | b'?' | b'&' | b'*' | b'=' | b'<' | b'>' | b'+' | b'-'
        )
}

/// Bytes that may continue an identifier segment.
#[must_use]
pub fn is_ident(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

fn is_delimiter(b: u8) -> bool {
    is_whitespace(b) || b == b'(' || b == b')'
}

/// Bytes that end a literal, number or symbol and start over in `Scan`.
fn ends_token(b: u8) -> bool {
    is_delimiter(b) || b == b'"' || b == b'#'
}

fn fail(kind: ParseErrorKind, offset: usize) -> Error {
    tl_log::debug!("parse error at byte {offset}: {kind}");
    Error::Parse(ParseError { kind, offset })
}

fn parse_number(text: &[u8], real: bool) -> Option<Value> {
    let text = std::str::from_utf8(text).ok()?;
    if real {
        if text.ends_with('.') {
            return None;
        }
        text.parse().ok().map(Value::Double)
    } else {
        text.parse().ok().map(Value::Int)
    }
}

/// Where the tail of an open list stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// Elements are still being appended.
    Open,
    /// `.` seen; the next value becomes the tail.
    Marked,
    /// The tail value is in; only `)` may follow.
    Filled,
}

/// One open list.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Last cell of the list so far.
    node: NodeId,
    /// The list has no element yet (`node` is its first cell).
    head_empty: bool,
    tail: Tail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scan,
    Literal { start: usize },
    Str { start: usize },
    Number { start: usize, real: bool },
    Sign { start: usize },
    Symbol { start: usize, segment: usize },
    Dot { at: usize },
}

enum Step {
    Advance,
    /// Look at the same byte again in the new state.
    Reprocess,
    Done(Value, usize),
}

struct Reader<'h> {
    heap: &'h mut Heap,
    frames: Vec<Frame>,
    root: Option<NodeId>,
    state: State,
}

impl<'h> Reader<'h> {
    fn new(heap: &'h mut Heap) -> Self {
        Self { heap, frames: Vec::new(), root: None, state: State::Scan }
    }

    fn run(&mut self, src: &[u8]) -> Result<Parsed> {
        let mut i = 0;
        while i <= src.len() {
            let b = src.get(i).copied().unwrap_or(b' ');
            match self.step(src, i, b)? {
                Step::Advance => i += 1,
                Step::Reprocess => {}
                Step::Done(value, consumed) => return Ok(Parsed { value: Some(value), consumed }),
            }
        }

        if let State::Str { .. } = self.state {
            return Err(fail(ParseErrorKind::UnterminatedToken, src.len()));
        }
        if !self.frames.is_empty() {
            return Err(fail(ParseErrorKind::UnterminatedList, src.len()));
        }
        Ok(Parsed { value: None, consumed: src.len() })
    }

    fn abandon(&mut self) {
        self.frames.clear();
        if let Some(root) = self.root.take() {
            self.heap.free(Value::Node(root), true);
        }
    }

    fn step(&mut self, src: &[u8], i: usize, b: u8) -> Result<Step> {
        match self.state {
            State::Scan => self.scan(i, b),

            State::Literal { start } => {
                if !ends_token(b) {
                    return Ok(Step::Advance);
                }
                self.state = State::Scan;
                let value = match &src[start + 1..i] {
                    b"true" => Value::TRUE,
                    b"false" => Value::FALSE,
                    b"nil" => Value::Nil,
                    _ => return Err(fail(ParseErrorKind::UnknownLiteral, start)),
                };
                self.finish(value, i, Step::Reprocess)
            }

            State::Str { start } => {
                if b != b'"' {
                    return Ok(Step::Advance);
                }
                self.state = State::Scan;
                let id = self.heap.string_from_bytes(&src[start..i])?;
                self.finish(Value::Str(id), i + 1, Step::Advance)
            }

            State::Number { start, real } => {
                if b.is_ascii_digit() {
                    Ok(Step::Advance)
                } else if b == b'.' {
                    if real {
                        return Err(fail(ParseErrorKind::MultipleDecimalPoints, i));
                    }
                    self.state = State::Number { start, real: true };
                    Ok(Step::Advance)
                } else if ends_token(b) {
                    self.state = State::Scan;
                    let value = parse_number(&src[start..i], real)
                        .ok_or_else(|| fail(ParseErrorKind::InvalidNumber, start))?;
                    self.finish(value, i, Step::Reprocess)
                } else if is_ident(b) {
                    Err(fail(ParseErrorKind::DigitLedSymbol, i))
                } else {
                    Err(fail(ParseErrorKind::UnexpectedChar(b), i))
                }
            }

            State::Sign { start } => {
                if b.is_ascii_digit() {
                    self.state = State::Number { start, real: false };
                    Ok(Step::Advance)
                } else {
                    self.state = State::Symbol { start, segment: start };
                    Ok(Step::Reprocess)
                }
            }

            State::Symbol { start, segment } => {
                if is_ident(b) {
                    if b.is_ascii_digit() && i == segment {
                        return Err(fail(ParseErrorKind::DigitLedSymbol, i));
                    }
                    Ok(Step::Advance)
                } else if b == b'.' {
                    if i == segment {
                        return Err(fail(ParseErrorKind::SymbolDoubleDot, i));
                    }
                    self.state = State::Symbol { start, segment: i + 1 };
                    Ok(Step::Advance)
                } else if ends_token(b) {
                    if i == segment {
                        return Err(fail(ParseErrorKind::SymbolTrailingDot, i - 1));
                    }
                    self.state = State::Scan;
                    let parts: Vec<&[u8]> = src[start..i].split(|c| *c == b'.').collect();
                    let id = self.heap.symbol_from_parts(&parts)?;
                    self.finish(Value::Symbol(id), i, Step::Reprocess)
                } else {
                    Err(fail(ParseErrorKind::UnexpectedChar(b), i))
                }
            }

            State::Dot { at } => {
                if !is_whitespace(b) {
                    return Err(fail(ParseErrorKind::StrayDot, at));
                }
                self.state = State::Scan;
                self.mark_tail(at)?;
                Ok(Step::Advance)
            }
        }
    }

    fn scan(&mut self, i: usize, b: u8) -> Result<Step> {
        match b {
            _ if is_whitespace(b) => {}
            b'(' => self.open_list(i)?,
            b')' => return self.close_list(i),
            b'"' => self.state = State::Str { start: i + 1 },
            b'#' => self.state = State::Literal { start: i },
            b'.' => self.state = State::Dot { at: i },
            b'+' | b'-' => self.state = State::Sign { start: i },
            _ if b.is_ascii_digit() => self.state = State::Number { start: i, real: false },
            _ if is_ident_start(b) => self.state = State::Symbol { start: i, segment: i },
            _ => return Err(fail(ParseErrorKind::UnexpectedChar(b), i)),
        }
        Ok(Step::Advance)
    }

    /// A completed value: returned at top level, appended inside a list.
    fn finish(&mut self, value: Value, consumed: usize, next: Step) -> Result<Step> {
        if self.frames.is_empty() {
            return Ok(Step::Done(value, consumed));
        }
        self.append(value, consumed)?;
        Ok(next)
    }

    fn open_list(&mut self, i: usize) -> Result<()> {
        let node = self.heap.cons(Value::Nil, Value::Nil)?;
        if self.frames.is_empty() {
            self.root = Some(node);
        } else {
            self.append(Value::Node(node), i)?;
        }
        self.frames.push(Frame { node, head_empty: true, tail: Tail::Open });
        Ok(())
    }

    fn close_list(&mut self, i: usize) -> Result<Step> {
        let Some(frame) = self.frames.pop() else {
            return Err(fail(ParseErrorKind::StrayCloseParen, i));
        };
        if frame.tail == Tail::Marked {
            return Err(fail(ParseErrorKind::MissingTailValue, i));
        }
        if !self.frames.is_empty() {
            return Ok(Step::Advance);
        }
        match self.root.take() {
            Some(root) => Ok(Step::Done(Value::Node(root), i + 1)),
            None => Err(fail(ParseErrorKind::StrayCloseParen, i)),
        }
    }

    /// Links `value` into the innermost open list. On failure `value` is
    /// freed, since nothing else owns it yet.
    fn append(&mut self, value: Value, at: usize) -> Result<()> {
        let top = self.frames.len() - 1;
        let frame = self.frames[top];
        let linked = match frame.tail {
            Tail::Filled => Err(fail(ParseErrorKind::TokenAfterTail, at)),
            Tail::Marked => self
                .heap
                .set_tail(frame.node, value)
                .map(|()| Frame { tail: Tail::Filled, ..frame }),
            Tail::Open if frame.head_empty => self
                .heap
                .set_head(frame.node, value)
                .map(|()| Frame { head_empty: false, ..frame }),
            Tail::Open => match self.heap.cons(value, Value::Nil) {
                Ok(next) => self
                    .heap
                    .set_tail(frame.node, Value::Node(next))
                    .map(|()| Frame { node: next, ..frame }),
                Err(err) => Err(err),
            },
        };

        match linked {
            Ok(updated) => {
                self.frames[top] = updated;
                Ok(())
            }
            Err(err) => {
                self.heap.free(value, true);
                Err(err)
            }
        }
    }

    fn mark_tail(&mut self, at: usize) -> Result<()> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(fail(ParseErrorKind::TailOutsideList, at));
        };
        if frame.head_empty {
            return Err(fail(ParseErrorKind::TailWithoutHead, at));
        }
        if frame.tail != Tail::Open {
            return Err(fail(ParseErrorKind::TailTwice, at));
        }
        frame.tail = Tail::Marked;
        Ok(())
    }
}
