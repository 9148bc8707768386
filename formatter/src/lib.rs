use std::io::{self, Write};
use token::Event;

/// Writes events back out as markup.
///
/// Tokenizing the output yields the same events, as long as no
/// attribute value contains both kinds of quote.
pub struct Formatter<W> {
    output: W,
}

impl<W> Formatter<W>
where
    W: Write,
{
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    pub fn write_event(&mut self, event: &Event) -> io::Result<()> {
        let Self { output } = self;

        match event {
            Event::Open { name, .. } if name == "!--" => write!(output, "<!--"),
            Event::Open { name, attributes } => {
                write!(output, "<{}", name)?;
                for (key, value) in attributes.iter() {
                    if value.is_empty() {
                        write!(output, " {}", key)?;
                    } else {
                        let quote = if value.contains('"') { '\'' } else { '"' };
                        write!(output, " {}={}{}{}", key, quote, value, quote)?;
                    }
                }
                write!(output, ">")
            }
            Event::Close { name } if name == "!--" => write!(output, "-->"),
            Event::Close { name } => write!(output, "</{}>", name),
            Event::Text { content } => write!(output, "{}", content),
        }
    }
}
