#![deny(rust_2018_idioms)]

use argh::FromArgs;
use formatter::Formatter;
use log::{debug, info};
use std::{
    env,
    fs::File,
    io::{self, BufWriter, Read, Write},
    str::FromStr,
};
use tokenizer::{blocking::Parser, Tokenizer, Whitespace};

type Error = Box<dyn std::error::Error>;
type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Tokenize a markup document and write it back out
#[derive(Debug, FromArgs)]
struct Args {
    /// do not output the formatted markup
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// report whitespace in text exactly as written
    #[argh(switch)]
    preserve_whitespace: bool,

    /// log every event to stderr
    #[argh(switch)]
    debug: bool,

    /// how many bytes to buffer when reading and writing
    #[argh(option)]
    buffer_size: Option<usize>,

    /// the file to read
    #[argh(positional)]
    filename: String,
}

impl Args {
    const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

    fn apply_environment_variables(&mut self) {
        self.quiet = self.quiet || env::var_os("QUIET").is_some();
        self.preserve_whitespace =
            self.preserve_whitespace || env::var_os("PRESERVE_WHITESPACE").is_some();

        self.buffer_size.ambient_value("BUFFER_SIZE");
    }

    fn into_options(self) -> Options {
        let Self {
            quiet,
            preserve_whitespace,
            debug,
            buffer_size,
            filename,
        } = self;

        let buffer_size = buffer_size
            .unwrap_or(Self::DEFAULT_BUFFER_SIZE)
            .max(Parser::<File>::MINIMUM_CAPACITY);

        Options {
            quiet,
            whitespace: preserve_whitespace.into(),
            debug,
            buffer_size,
            filename,
        }
    }
}

#[derive(Debug)]
struct Options {
    quiet: bool,
    whitespace: Whitespace,
    debug: bool,
    buffer_size: usize,
    filename: String,
}

impl Options {
    fn from_env_and_command_line() -> Self {
        let mut args: Args = argh::from_env();
        args.apply_environment_variables();
        args.into_options()
    }
}

trait AmbientValue {
    fn ambient_value(&mut self, env_var_name: &str);
}

impl<T> AmbientValue for Option<T>
where
    T: FromStr,
{
    fn ambient_value(&mut self, env_var_name: &str) {
        if self.is_none() {
            if let Ok(v) = env::var(env_var_name) {
                *self = v.parse().ok();
            }
        }
    }
}

fn main() -> Result {
    let Options {
        quiet,
        whitespace,
        debug,
        buffer_size,
        filename,
    } = Options::from_env_and_command_line();

    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let file = File::open(&filename).map_err(|e| format!("Unable to open {}: {}", filename, e))?;
    info!("Tokenizing {} with {:?} whitespace", filename, whitespace);

    let parser = Parser::with_tokenizer(file, buffer_size, Tokenizer::with_whitespace(whitespace));

    let count = if quiet {
        let out = io::sink();
        let out = BufWriter::with_capacity(buffer_size, out);
        stream_output(parser, out)
    } else {
        let out = io::stdout();
        let out = out.lock();
        let out = BufWriter::with_capacity(buffer_size, out);
        stream_output(parser, out)
    }?;

    eprintln!("Parsed {} events", count);

    Ok(())
}

fn stream_output(parser: Parser<impl Read>, out: impl Write) -> Result<usize> {
    let mut count = 0;
    let mut fmt = Formatter::new(out);

    for event in parser {
        let event = event?;
        count += 1;

        debug!("{}", event);
        fmt.write_event(&event)?;
    }

    fmt.into_inner().flush()?;

    Ok(count)
}
