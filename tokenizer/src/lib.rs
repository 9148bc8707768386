#![deny(rust_2018_idioms)]

//! An incremental tokenizer for HTML-like markup.
//!
//! Input may be split anywhere; the events produced are the same as if
//! the whole document had been fed at once.
//!
//! ```
//! use tagstream_tokenizer::{Event, Tokenizer};
//!
//! let mut tokenizer = Tokenizer::new();
//! let mut events: Vec<Event> = tokenizer.feed("<p class=x>hi</").collect();
//! events.extend(tokenizer.feed("p>"));
//! events.extend(tokenizer.finish());
//!
//! assert_eq!(
//!     events,
//!     [
//!         Event::open("p", [("class", "x")]),
//!         Event::text("hi"),
//!         Event::close("p"),
//!     ],
//! );
//! ```

use easy_ext::ext;
use log::{debug, trace};
use std::{mem, vec};

pub use matcher::DelimiterMatcher;
pub use token::{Attributes, Event};

pub mod blocking;
mod matcher;

#[ext]
impl u8 {
    #[inline]
    fn is_markup_space(&self) -> bool {
        matches!(*self, b' ' | b'\t'..=b'\r')
    }
}

/// How whitespace in text between tags is reported.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Whitespace {
    /// Runs of whitespace become a single space; whitespace at the
    /// edges of a text run, and text that is only whitespace, is dropped.
    #[default]
    Collapse,
    /// Text is reported byte-for-byte.
    Preserve,
    /// Like `Collapse`, but the space character itself is kept as
    /// content. Tabs and line breaks still separate words.
    PreserveSpaces,
}

impl Whitespace {
    #[inline]
    fn separates(self, b: u8) -> bool {
        match self {
            Self::Collapse => b.is_markup_space(),
            Self::Preserve => false,
            Self::PreserveSpaces => b != b' ' && b.is_markup_space(),
        }
    }
}

impl From<bool> for Whitespace {
    fn from(preserve: bool) -> Self {
        if preserve {
            Self::Preserve
        } else {
            Self::Collapse
        }
    }
}

/// Elements whose content is not tokenized.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RawKind {
    Comment,
    Script,
    Style,
}

impl RawKind {
    pub fn element(self) -> &'static str {
        match self {
            Self::Comment => "!--",
            Self::Script => "script",
            Self::Style => "style",
        }
    }

    pub fn end_delimiter(self) -> &'static str {
        match self {
            Self::Comment => DelimiterMatcher::END_COMMENT,
            Self::Script => DelimiterMatcher::END_SCRIPT,
            Self::Style => DelimiterMatcher::END_STYLE,
        }
    }

    fn for_element(name: &str) -> Option<Self> {
        match name {
            "!--" => Some(Self::Comment),
            "script" => Some(Self::Script),
            "style" => Some(Self::Style),
            _ => None,
        }
    }
}

/// A token that [`Tokenizer::finish`] would discard.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Incomplete {
    /// Input ended inside `<...>`.
    Tag,
    /// Input ended before the end delimiter of a raw region; `len` bytes
    /// of its content are buffered.
    Raw { kind: RawKind, len: usize },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
}

impl Quote {
    fn from_ascii_char(b: u8) -> Option<Self> {
        match b {
            b'\'' => Some(Self::Single),
            b'"' => Some(Self::Double),
            _ => None,
        }
    }

    fn to_ascii_char(self) -> u8 {
        match self {
            Self::Single => b'\'',
            Self::Double => b'"',
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Text,
    Tag,
    TagName,
    AttributeKey,
    // `None` when the value is unquoted
    AttributeValue(Option<Quote>),
    Raw(RawKind),
}

pub type Events<'a> = vec::Drain<'a, Event>;

#[derive(Debug)]
pub struct Tokenizer {
    whitespace: Whitespace,

    begin_comment: DelimiterMatcher,
    end_comment: DelimiterMatcher,
    end_script: DelimiterMatcher,
    end_style: DelimiterMatcher,

    // Only the suffix that has not been reported yet. Positions below
    // are offsets into it.
    buffer: String,
    cursor: usize,
    token_start: usize,
    state: State,

    text: Vec<String>,
    name: Option<String>,
    key: Option<String>,
    attributes: Attributes,

    is_close: bool,
    is_self_close: bool,
    has_equals: bool,

    events: Vec<Event>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::with_whitespace(Whitespace::default())
    }

    pub fn with_whitespace(whitespace: Whitespace) -> Self {
        Self {
            whitespace,

            begin_comment: DelimiterMatcher::new(DelimiterMatcher::BEGIN_COMMENT),
            end_comment: DelimiterMatcher::new(DelimiterMatcher::END_COMMENT),
            end_script: DelimiterMatcher::new(DelimiterMatcher::END_SCRIPT),
            end_style: DelimiterMatcher::new(DelimiterMatcher::END_STYLE),

            buffer: String::new(),
            cursor: 0,
            token_start: 0,
            state: State::Text,

            text: Vec::new(),
            name: None,
            key: None,
            attributes: Attributes::new(),

            is_close: false,
            is_self_close: false,
            has_equals: false,

            events: Vec::new(),
        }
    }

    pub fn whitespace(&self) -> Whitespace {
        self.whitespace
    }

    /// Tokenizes as much of the input seen so far as possible.
    ///
    /// The returned events are complete; nothing is reported twice. Text
    /// that may still continue is held back until the next tag or
    /// [`finish`](Self::finish).
    pub fn feed(&mut self, chunk: &str) -> Events<'_> {
        self.buffer.push_str(chunk);

        let mut i = self.cursor;
        while i < self.buffer.len() {
            i = self.skip_inert(i);
            if let Some(&c) = self.buffer.as_bytes().get(i) {
                self.step(i, c);
                i += 1;
            }
        }

        debug_assert!(self.token_start <= i);
        debug_assert!(self.buffer.is_char_boundary(self.token_start));

        let consumed = self.token_start;
        self.buffer.drain(..consumed);
        self.cursor = i - consumed;
        self.token_start = 0;

        self.events.drain(..)
    }

    /// Signals the end of input.
    ///
    /// Pending text is returned; an unterminated tag or raw region is
    /// dropped. The tokenizer is ready for a new document afterwards.
    pub fn finish(&mut self) -> Option<Event> {
        let text = match self.state {
            State::Text => {
                let end = self.buffer.len();
                self.take_text(end)
            }
            _ => {
                if let Some(incomplete) = self.incomplete() {
                    debug!("Discarding {:?} at end of input", incomplete);
                }
                None
            }
        };

        self.clear();
        text
    }

    /// Forgets all input and partial tokens without reporting anything.
    pub fn reset(&mut self) {
        if self.state != State::Text || !self.buffer.is_empty() || !self.text.is_empty() {
            debug!(
                "Resetting with {} buffered bytes in state {:?}",
                self.buffer.len(),
                self.state,
            );
        }

        self.clear();
    }

    /// Describes the token that [`finish`](Self::finish) would drop,
    /// if any.
    pub fn incomplete(&self) -> Option<Incomplete> {
        match self.state {
            State::Text => None,
            State::Raw(kind) => Some(Incomplete::Raw {
                kind,
                len: self.buffer.len() - self.token_start,
            }),
            _ => Some(Incomplete::Tag),
        }
    }

    fn clear(&mut self) {
        self.begin_comment.reset();
        self.end_comment.reset();
        self.end_script.reset();
        self.end_style.reset();

        self.buffer.clear();
        self.cursor = 0;
        self.token_start = 0;
        self.state = State::Text;

        self.text.clear();
        self.name = None;
        self.key = None;
        self.attributes.clear();

        self.is_close = false;
        self.is_self_close = false;
        self.has_equals = false;

        self.events.clear();
    }

    // Jumps over bytes that cannot change the state.
    #[inline]
    fn skip_inert(&self, i: usize) -> usize {
        let rest = &self.buffer.as_bytes()[i..];

        let offset = match self.state {
            State::Raw(kind) => {
                let matcher = self.end_matcher(kind);
                if matcher.is_matching() {
                    return i;
                }
                memchr::memchr(matcher.first_byte(), rest)
            }
            State::AttributeValue(Some(quote)) => memchr::memchr(quote.to_ascii_char(), rest),
            State::Text if self.whitespace == Whitespace::Preserve => memchr::memchr(b'<', rest),
            _ => return i,
        };

        offset.map_or(self.buffer.len(), |offset| i + offset)
    }

    #[inline]
    fn step(&mut self, i: usize, c: u8) {
        use State::*;

        match self.state {
            Text => {
                if self.whitespace.separates(c) {
                    self.push_text_fragment(i);
                    self.token_start = i + 1;
                } else if c == b'<' {
                    if let Some(text) = self.take_text(i) {
                        self.events.push(text);
                    }
                    self.state = Tag;
                    self.token_start = i + 1;
                }
            }

            Tag => self.step_tag(i, c),

            TagName => {
                let in_prefix = i - self.token_start < DelimiterMatcher::BEGIN_COMMENT.len();

                if in_prefix && self.begin_comment.found(c) {
                    self.name = Some(self.slice(self.token_start, i + 1));
                    self.finish_element(i);
                } else if c.is_markup_space() {
                    self.end_name(i);
                } else if c == b'/' {
                    self.is_self_close = true;
                    self.end_name(i);
                } else if c == b'>' {
                    self.end_name(i);
                    self.finish_element(i);
                }
            }

            AttributeKey => {
                if c.is_markup_space() {
                    self.end_key(i);
                } else if c == b'=' {
                    self.has_equals = true;
                    self.end_key(i);
                } else if c == b'/' {
                    self.is_self_close = true;
                    self.end_key(i);
                } else if c == b'>' {
                    self.end_key(i);
                    self.flush_bare_key();
                    self.finish_element(i);
                }
            }

            AttributeValue(Some(quote)) => {
                if c == quote.to_ascii_char() {
                    self.end_value(i, i);
                }
            }

            // Unquoted: whitespace or `>` ends the value; a `/` does too,
            // but only as the last byte before `>`.
            AttributeValue(None) => {
                if c.is_markup_space() {
                    self.end_value(i, i);
                } else if c == b'>' {
                    // `<input value=x/>`: the slash closes the element
                    let mut end = i;
                    if end > self.token_start && self.buffer.as_bytes()[end - 1] == b'/' {
                        end -= 1;
                        self.is_self_close = true;
                    }
                    self.end_value(end, i);
                    self.finish_element(i);
                }
            }

            Raw(kind) => {
                if self.end_matcher_mut(kind).found(c) {
                    self.finish_raw(kind, i);
                }
            }
        }
    }

    fn step_tag(&mut self, i: usize, c: u8) {
        use State::*;

        // Nothing inside `<...>` needs to be kept until a token begins.
        self.token_start = i + 1;

        if c == b'>' {
            self.flush_bare_key();
            self.finish_element(i);
        } else if c == b'/' && !self.has_equals {
            // `</a>` closes; `<a/>` and `<a b/>` self-close
            let has_name = self.name.is_some();
            self.is_self_close = has_name;
            self.is_close = !has_name;
        } else if c.is_markup_space() {
            // skipped
        } else if self.name.is_none() {
            self.begin_comment.reset();
            self.begin_comment.found(c);
            self.state = TagName;
            self.token_start = i;
        } else if self.key.is_none() {
            self.state = AttributeKey;
            self.token_start = i;
        } else if c == b'=' {
            self.has_equals = true;
        } else if !self.has_equals {
            self.flush_bare_key();
            self.state = AttributeKey;
            self.token_start = i;
        } else if let Some(quote) = Quote::from_ascii_char(c) {
            self.state = AttributeValue(Some(quote));
        } else {
            self.state = AttributeValue(None);
            self.token_start = i;
        }
    }

    fn end_name(&mut self, i: usize) {
        self.name = Some(self.slice(self.token_start, i));
        self.begin_comment.reset();
        self.state = State::Tag;
        self.token_start = i + 1;
    }

    fn end_key(&mut self, i: usize) {
        self.key = Some(self.slice(self.token_start, i));
        self.state = State::Tag;
        self.token_start = i + 1;
    }

    fn end_value(&mut self, value_end: usize, i: usize) {
        let value = self.slice(self.token_start, value_end);
        let key = self.key.take().unwrap_or_default();
        self.attributes.insert(key, value);
        self.has_equals = false;
        self.state = State::Tag;
        self.token_start = i + 1;
    }

    fn flush_bare_key(&mut self) {
        if let Some(key) = self.key.take() {
            self.attributes.insert(key, "");
        }
        self.has_equals = false;
    }

    fn finish_element(&mut self, i: usize) {
        let name = self.name.take().unwrap_or_default();
        let attributes = mem::take(&mut self.attributes);
        let raw = RawKind::for_element(&name);

        trace!(
            "Finishing element {:?} (close: {}, self-close: {})",
            name,
            self.is_close,
            self.is_self_close,
        );

        if self.is_close {
            self.events.push(Event::Close { name });
        } else if self.is_self_close {
            self.events.push(Event::Open {
                name: name.clone(),
                attributes,
            });
            self.events.push(Event::Close { name });
        } else {
            self.events.push(Event::Open { name, attributes });
        }

        self.is_close = false;
        self.is_self_close = false;
        self.has_equals = false;
        self.key = None;
        self.begin_comment.reset();

        self.state = match raw {
            Some(kind) => {
                self.end_matcher_mut(kind).reset();
                State::Raw(kind)
            }
            None => State::Text,
        };
        self.token_start = i + 1;
    }

    fn finish_raw(&mut self, kind: RawKind, i: usize) {
        // `i` is the last byte of the end delimiter
        let content_end = i + 1 - kind.end_delimiter().len();
        debug_assert!(self.token_start <= content_end);

        let content = &self.buffer[self.token_start..content_end];
        trace!("Finishing {:?} region of {} bytes", kind, content.len());

        if !content.is_empty() {
            self.events.push(Event::Text {
                content: content.to_owned(),
            });
        }
        self.events.push(Event::Close {
            name: kind.element().to_owned(),
        });

        self.state = State::Text;
        self.token_start = i + 1;
    }

    fn push_text_fragment(&mut self, end: usize) {
        if self.token_start < end {
            let fragment = self.slice(self.token_start, end);
            self.text.push(fragment);
        }
    }

    fn take_text(&mut self, end: usize) -> Option<Event> {
        self.push_text_fragment(end);

        let content = match self.text.len() {
            0 => return None,
            1 => self.text.pop()?,
            _ => {
                let joined = self.text.join(" ");
                self.text.clear();
                joined
            }
        };

        Some(Event::Text { content })
    }

    fn end_matcher(&self, kind: RawKind) -> &DelimiterMatcher {
        match kind {
            RawKind::Comment => &self.end_comment,
            RawKind::Script => &self.end_script,
            RawKind::Style => &self.end_style,
        }
    }

    fn end_matcher_mut(&mut self, kind: RawKind) -> &mut DelimiterMatcher {
        match kind {
            RawKind::Comment => &mut self.end_comment,
            RawKind::Script => &mut self.end_script,
            RawKind::Style => &mut self.end_style,
        }
    }

    #[inline]
    fn slice(&self, start: usize, end: usize) -> String {
        self.buffer[start..end].to_owned()
    }
}
