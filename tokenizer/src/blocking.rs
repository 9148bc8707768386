//! Tokenizing from an implementer of [`std::io::Read`].

use snafu::{ensure, ResultExt, Snafu};
use std::{
    collections::VecDeque,
    io::{self, Read},
    str,
};

use crate::{Event, Tokenizer};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to read from the input source"))]
    Io { source: io::Error },

    #[snafu(display(
        "The {} bytes of input data, starting at byte {}, was not UTF-8",
        length,
        location,
    ))]
    InputNotUtf8 { location: usize, length: usize },

    #[snafu(display(
        "The input data ended inside a UTF-8 sequence starting at byte {}",
        location,
    ))]
    IncompleteUtf8 { location: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reads and tokenizes a document in fixed-size pieces.
///
/// Multi-byte characters may straddle reads. After an error is
/// returned, no further events are produced.
#[derive(Debug)]
pub struct Parser<R> {
    source: R,
    tokenizer: Tokenizer,

    buffer: Vec<u8>,
    n_dangling_bytes: usize,
    n_retired_bytes: usize,

    events: VecDeque<Event>,
    exhausted: bool,
}

impl<R> Parser<R>
where
    R: Read,
{
    // Room for the longest incomplete UTF-8 sequence plus one new byte
    pub const MINIMUM_CAPACITY: usize = 4;
    pub const DEFAULT_CAPACITY: usize = 8 * 1024;

    pub fn new(source: R) -> Self {
        Self::with_buffer_capacity(source, Self::DEFAULT_CAPACITY)
    }

    pub fn with_buffer_capacity(source: R, capacity: usize) -> Self {
        Self::with_tokenizer(source, capacity, Tokenizer::new())
    }

    pub fn with_tokenizer(source: R, capacity: usize, tokenizer: Tokenizer) -> Self {
        assert!(
            capacity >= Self::MINIMUM_CAPACITY,
            "The capacity must be large enough to hold any UTF-8 character",
        );

        Self {
            source,
            tokenizer,

            buffer: vec![0; capacity],
            n_dangling_bytes: 0,
            n_retired_bytes: 0,

            events: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn refill(&mut self) -> Result<()> {
        let Self {
            source,
            tokenizer,
            buffer,
            n_dangling_bytes,
            n_retired_bytes,
            events,
            exhausted,
        } = self;

        let n_new_bytes = loop {
            match source.read(&mut buffer[*n_dangling_bytes..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context(IoSnafu),
            }
        };

        if n_new_bytes == 0 {
            *exhausted = true;
            ensure!(
                *n_dangling_bytes == 0,
                IncompleteUtf8Snafu {
                    location: *n_retired_bytes,
                },
            );
            events.extend(tokenizer.finish());
            return Ok(());
        }

        let n_available = *n_dangling_bytes + n_new_bytes;
        let bytes = &buffer[..n_available];

        let n_utf8_bytes = match str::from_utf8(bytes) {
            Ok(s) => s.len(),
            Err(e) => match e.error_len() {
                Some(length) => {
                    return InputNotUtf8Snafu {
                        location: *n_retired_bytes + e.valid_up_to(),
                        length,
                    }
                    .fail()
                }
                None => e.valid_up_to(),
            },
        };

        // SAFETY: We just calculated how many bytes are valid UTF-8,
        // so we don't need to do it again.
        let s = unsafe { str::from_utf8_unchecked(&bytes[..n_utf8_bytes]) };
        events.extend(tokenizer.feed(s));

        buffer.copy_within(n_utf8_bytes..n_available, 0);
        *n_dangling_bytes = n_available - n_utf8_bytes;
        *n_retired_bytes += n_utf8_bytes;

        Ok(())
    }
}

impl<R> Iterator for Parser<R>
where
    R: Read,
{
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Some(Ok(event));
            }

            if self.exhausted {
                return None;
            }

            if let Err(e) = self.refill() {
                self.exhausted = true;
                self.tokenizer.reset();
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Attributes, Whitespace};

    type Result<T = (), E = Box<dyn std::error::Error>> = std::result::Result<T, E>;

    macro_rules! assert_error {
        ($e:expr, $p:pat $(if $guard:expr)?) => {
            assert!(
                matches!($e, Err($p) $(if $guard)?),
                "Expected {}, but got {:?}",
                stringify!($p),
                $e,
            )
        };
    }

    #[test]
    fn reads_a_whole_document() -> Result {
        let events = Parser::new("<p>Hello, world</p>".as_bytes()).collect_events()?;

        assert_eq!(
            events,
            [
                Event::open("p", Attributes::new()),
                Event::text("Hello, world"),
                Event::close("p"),
            ],
        );

        Ok(())
    }

    #[test]
    fn characters_may_straddle_reads() -> Result {
        let input = "<p title='☕'>café 😊</p>";

        for capacity in Parser::<&[u8]>::MINIMUM_CAPACITY..=12 {
            let events = Parser::with_buffer_capacity(input.as_bytes(), capacity).collect_events()?;

            assert_eq!(
                events,
                [
                    Event::open("p", [("title", "☕")]),
                    Event::text("café 😊"),
                    Event::close("p"),
                ],
                "with capacity {}",
                capacity,
            );
        }

        Ok(())
    }

    #[test]
    fn trickling_source() -> Result {
        let tokenizer = Tokenizer::with_whitespace(Whitespace::Preserve);
        let parser = Parser::with_tokenizer(Trickle(b"a <b>\xC3\xA9</b>\n"), 16, tokenizer);
        let events = parser.collect_events()?;

        assert_eq!(
            events,
            [
                Event::text("a "),
                Event::open("b", Attributes::new()),
                Event::text("é"),
                Event::close("b"),
                Event::text("\n"),
            ],
        );

        Ok(())
    }

    #[test]
    fn interrupted_reads_are_retried() -> Result {
        let source = Interrupting {
            inner: "<br/>".as_bytes(),
            interrupted: false,
        };
        let events = Parser::new(source).collect_events()?;

        assert_eq!(events, [Event::open("br", Attributes::new()), Event::close("br")]);

        Ok(())
    }

    #[test]
    fn invalid_utf8_is_reported_with_its_location() {
        let mut parser = Parser::new(&b"<p>ab\xFFc</p>"[..]);

        assert_error!(
            parser.next().transpose(),
            Error::InputNotUtf8 {
                location: 5,
                length: 1
            }
        );
        assert!(parser.next().is_none());
    }

    #[test]
    fn events_before_an_error_are_delivered() {
        // The bad byte arrives in a read of its own
        let mut parser = Parser::with_buffer_capacity(&b"<p>ok</p>abc\xFF"[..], 4);

        let events: Vec<_> = parser.by_ref().take_while(|e| e.is_ok()).collect();
        assert_eq!(events.len(), 3);
        assert!(parser.next().is_none());
    }

    #[test]
    fn truncated_character_is_reported() {
        let mut parser = Parser::new(&b"caf\xC3"[..]);

        assert_error!(
            parser.next().transpose(),
            Error::IncompleteUtf8 { location: 3 }
        );
        assert!(parser.next().is_none());
    }

    #[test]
    fn io_errors_are_reported() {
        let mut parser = Parser::new(Broken);

        assert_error!(parser.next().transpose(), Error::Io { .. });
        assert!(parser.next().is_none());
    }

    #[test]
    #[should_panic(expected = "capacity must be large enough")]
    fn tiny_capacity_is_rejected() {
        Parser::with_buffer_capacity(&b""[..], 3);
    }

    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((&b, rest)), Some(slot)) => {
                    *slot = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    struct Interrupting<'a> {
        inner: &'a [u8],
        interrupted: bool,
    }

    impl Read for Interrupting<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.inner.read(buf)
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "the disk is on fire"))
        }
    }

    impl<R> Parser<R>
    where
        R: Read,
    {
        fn collect_events(self) -> super::Result<Vec<Event>> {
            self.collect()
        }
    }
}
