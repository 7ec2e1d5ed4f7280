//! Buffered byte input and the lexical primitives shared by both parsers.

use crate::{
    literal::{Literal, Variable, VARIABLE_MAX},
    memory::Vector,
};
use std::{
    fs::File,
    io::{self, BufReader, Error, ErrorKind, Read, Result},
    iter::Peekable,
};

/// A peekable iterator for bytes that records line and column information.
pub struct Input<'a> {
    /// The source of the input data
    source: Peekable<Box<dyn Iterator<Item = u8> + 'a>>,
    /// Whether to suppress warnings for this stream
    silent: bool,
    /// The current line number
    line: usize,
    /// The current column
    column: usize,
}

impl<'a> Input<'a> {
    /// Create a new `Input` from some source
    pub fn new(source: Box<dyn Iterator<Item = u8> + 'a>, silent: bool) -> Self {
        Input {
            source: source.peekable(),
            silent,
            line: 1,
            column: 1,
        }
    }
    /// Create an `Input` reading from a string; only used in tests.
    #[cfg(test)]
    pub fn from_str(input: &'a str) -> Self {
        Input::new(Box::new(input.as_bytes().iter().cloned()), true)
    }
    /// Look at the next byte without consuming it
    pub fn peek(&mut self) -> Option<u8> {
        self.source.peek().cloned()
    }
    /// Whether warnings for this stream are suppressed.
    pub fn silent(&self) -> bool {
        self.silent
    }
    /// The line of the byte that will be consumed next.
    pub fn line(&self) -> usize {
        self.line
    }
    /// The column of the byte that will be consumed next.
    pub fn column(&self) -> usize {
        self.column
    }
    /// Create an io::Error with the given message and position information.
    pub fn error(&self, why: impl std::fmt::Display) -> Error {
        Error::new(
            ErrorKind::InvalidData,
            format!("{} at line {} column {}", why, self.line, self.column),
        )
    }

    // Error messages.
    /// A numeric overflow. This should only happen for user input.
    pub const OVERFLOW: &'static str = "overflow while parsing number";
    /// Parser error ("unexpected EOF")
    pub const EOF: &'static str = "premature end of file";
    /// Parser error (`expected ...`)
    pub const NUMBER: &'static str = "expected number";
    /// Parser error (`expected ...`)
    pub const NUMBER_OR_MINUS: &'static str = "expected number or \"-\"";
    /// Parser error (`expected ...`)
    pub const VARIABLE: &'static str = "expected variable";

    /// Check if a character is a decimal digit.
    pub fn is_digit(value: u8) -> bool {
        value >= b'0' && value <= b'9'
    }

    /// Check if a character is a decimal digit or a dash.
    pub fn is_digit_or_dash(value: u8) -> bool {
        Self::is_digit(value) || value == b'-'
    }

    /// Consume space, tab, vertical tab and carriage return characters.
    pub fn skip_horizontal_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c != b' ' && c != b'\t' && c != 0x0b && c != b'\r' {
                break;
            }
            self.next();
        }
    }

    /// Skip horizontal whitespace, then consume a newline if one is present.
    ///
    /// Both input grammars are line-oriented; this detects line boundaries.
    pub fn skip_newline_if_any(&mut self) -> bool {
        self.skip_horizontal_ws();
        if self.peek() == Some(b'\n') {
            self.next();
            true
        } else {
            false
        }
    }

    /// Consume contiguous non-whitespace bytes after skipping horizontal
    /// whitespace.
    pub fn parse_word(&mut self) -> Vector<u8> {
        self.skip_horizontal_ws();
        let mut word = Vector::new();
        while let Some(c) = self.peek() {
            if c == b' ' || c == b'\t' || c == 0x0b || c == b'\r' || c == b'\n' {
                break;
            }
            word.push(c);
            self.next();
        }
        word
    }

    /// Parse a decimal number.
    ///
    /// Consumes one or more decimal digits, returning the value of the
    /// resulting number on success. Fails if there is no digit.
    pub fn parse_u64(&mut self) -> Result<u64> {
        match self.peek() {
            None => return Err(self.error(Self::NUMBER)),
            Some(c) => {
                if !Self::is_digit(c) {
                    return Err(self.error(Self::NUMBER));
                }
            }
        }
        let mut value: u64 = 0;
        while let Some(c) = self.peek() {
            if !Self::is_digit(c) {
                break;
            }
            self.next();
            value = value
                .checked_mul(10)
                .and_then(|val| val.checked_add(u64::from(c - b'0')))
                .ok_or_else(|| self.error(Self::OVERFLOW))?;
        }
        Ok(value)
    }

    /// Just like `parse_u64` but convert the result to an i32.
    pub fn parse_i32(&mut self) -> Result<i32> {
        let value = self.parse_u64()?;
        if value > u64::from(VARIABLE_MAX) {
            Err(self.error(Self::OVERFLOW))
        } else {
            Ok(value as i32)
        }
    }

    /// Parse a variable, in `[1, 2^31 - 1]`, or 0 if that is allowed.
    ///
    /// Skips horizontal whitespace first; fails on a negative number.
    pub fn parse_variable(&mut self, allow_zero: bool) -> Result<Variable> {
        self.skip_horizontal_ws();
        if self.peek() == Some(b'-') {
            return Err(self.error("expected a positive number, received \"-\""));
        }
        let value = self.parse_i32()? as u32;
        if value == 0 && !allow_zero {
            return Err(self.error(Self::VARIABLE));
        }
        Ok(Variable::new(value))
    }

    /// Parse a signed literal, encoding the sign in the least significant bit.
    ///
    /// Skips horizontal whitespace first.
    pub fn parse_literal(&mut self, allow_zero: bool) -> Result<Literal> {
        self.skip_horizontal_ws();
        match self.peek() {
            None => Err(self.error(Self::EOF)),
            Some(c) if Self::is_digit_or_dash(c) => {
                let sign = if c == b'-' {
                    self.next();
                    -1
                } else {
                    1
                };
                let number = self.parse_i32()?;
                let literal = Literal::new(sign * number);
                if literal.is_zero() && !allow_zero {
                    return Err(self.error("expected nonzero literal"));
                }
                Ok(literal)
            }
            _ => Err(self.error(Self::NUMBER_OR_MINUS)),
        }
    }

    /// Parse variables up to a terminating `0`, the end of the line, or EOF.
    ///
    /// The terminating `0` is not included in the result; its absence before
    /// the line ends is a warning, not an error.
    pub fn parse_variable_list(&mut self) -> Result<Vector<Variable>> {
        let mut variables = Vector::new();
        loop {
            self.skip_horizontal_ws();
            match self.peek() {
                None | Some(b'\n') => {
                    parse_warning!(self, "expected \"0\" delimiter before end of line");
                    break;
                }
                _ => {
                    let variable = self.parse_variable(true)?;
                    if variable == Variable(0) {
                        break;
                    }
                    variables.push(variable);
                }
            }
        }
        Ok(variables)
    }

    /// Parse literals up to a terminating `0`, the end of the line, or EOF.
    ///
    /// The terminating `0` is not included in the result; its absence before
    /// the line ends is a warning, not an error.
    pub fn parse_literal_list(&mut self) -> Result<Vector<Literal>> {
        let mut literals = Vector::new();
        loop {
            self.skip_horizontal_ws();
            match self.peek() {
                None | Some(b'\n') => {
                    parse_warning!(self, "expected \"0\" delimiter before end of line");
                    break;
                }
                _ => {
                    let literal = self.parse_literal(true)?;
                    if literal.is_zero() {
                        break;
                    }
                    literals.push(literal);
                }
            }
        }
        Ok(literals)
    }
}

impl Iterator for Input<'_> {
    type Item = u8;
    fn next(&mut self) -> Option<u8> {
        self.source.next().map(|c| {
            if c == b'\n' {
                self.line += 1;
                self.column = 0;
            }
            self.column += 1;
            c
        })
    }
}

/// Open a file for reading.
pub fn open_file(filename: &str) -> Result<File> {
    File::open(filename)
        .map_err(|err| io::Error::new(err.kind(), format!("{}: {}", filename, err)))
}

/// File extension of Zstandard archives.
const ZSTD: &str = ".zst";
/// File extension of Gzip archives.
const GZIP: &str = ".gz";
/// File extension of Bzip2 archives.
const BZIP2: &str = ".bz2";
/// File extension of XZ archives.
const XZ: &str = ".xz";
/// File extension of LZ4 archives.
const LZ4: &str = ".lz4";

/// Strip the compression format off a filename.
///
/// If the filename ends with a known archive extension,
/// return the filname without extension and the extension.
/// Otherwise return the unmodified filename and the empty string.
fn compression_format_by_extension(filename: &str) -> (&str, &str) {
    let mut basename = filename;
    let mut compression_format = "";
    for extension in &[ZSTD, GZIP, BZIP2, LZ4, XZ] {
        if filename.ends_with(extension) {
            compression_format = extension;
            basename = &filename[0..filename.len() - extension.len()];
            break;
        }
    }
    (basename, compression_format)
}

/// Return an [Input](struct.Input.html) to read from a possibly compressed file.
///
/// If the file is compressed it is transparently uncompressed.
pub fn read_compressed_file(filename: &str, silent: bool) -> Result<Input<'static>> {
    let file = open_file(filename)?;
    Ok(Input::new(
        read_from_compressed_file(file, filename)?,
        silent,
    ))
}

/// Return an Iterator to read from a possibly compressed file.
///
/// If the file is compressed it is transparently uncompressed.
fn read_from_compressed_file(
    file: File,
    filename: &str,
) -> Result<Box<dyn Iterator<Item = u8>>> {
    let (_basename, compression_format) = compression_format_by_extension(filename);
    Ok(match compression_format {
        "" => Box::new(BufReader::new(file).bytes().map(panic_on_error)),
        ZSTD => {
            let de = zstd::stream::read::Decoder::new(file)?;
            Box::new(de.bytes().map(panic_on_error))
        }
        GZIP => {
            let de = flate2::read::GzDecoder::new(file);
            Box::new(de.bytes().map(panic_on_error))
        }
        BZIP2 => {
            let de = bzip2::read::BzDecoder::new(file);
            Box::new(de.bytes().map(panic_on_error))
        }
        XZ => {
            let de = xz2::read::XzDecoder::new(file);
            Box::new(de.bytes().map(panic_on_error))
        }
        LZ4 => {
            let de = lz4::Decoder::new(file)?;
            Box::new(de.bytes().map(panic_on_error))
        }
        _ => unreachable!(),
    })
}

/// Unwraps a result, panicking on error.
///
/// Read errors from the underlying stream surface here, in the middle of
/// lexing, where we cannot propagate them.
fn panic_on_error<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|error| die!("{}", error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_line_and_column() {
        let mut input = Input::from_str("ab\ncd");
        assert_eq!((input.line(), input.column()), (1, 1));
        input.next();
        assert_eq!((input.line(), input.column()), (1, 2));
        input.next();
        input.next();
        assert_eq!((input.line(), input.column()), (2, 1));
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(Input::from_str("42").parse_u64().unwrap(), 42);
        assert!(Input::from_str("x").parse_u64().is_err());
        assert!(Input::from_str("99999999999999999999").parse_u64().is_err());
        assert!(Input::from_str("2147483648").parse_i32().is_err());
    }

    #[test]
    fn parses_literals() {
        assert_eq!(
            Input::from_str(" -3 ").parse_literal(false).unwrap(),
            Literal::new(-3)
        );
        assert_eq!(
            Input::from_str("0 ").parse_literal(true).unwrap(),
            Literal::new(0)
        );
        assert!(Input::from_str("0").parse_literal(false).is_err());
        assert!(Input::from_str("y").parse_literal(true).is_err());
    }

    #[test]
    fn parses_variables() {
        assert_eq!(
            Input::from_str("17").parse_variable(false).unwrap(),
            Variable(17)
        );
        assert!(Input::from_str("-17").parse_variable(true).is_err());
        assert!(Input::from_str("0").parse_variable(false).is_err());
    }

    #[test]
    fn literal_list_stops_at_zero() {
        let mut input = Input::from_str("1 -2 0 3");
        let list = input.parse_literal_list().unwrap();
        assert_eq!(list, vector!(Literal::new(1), Literal::new(-2)));
    }

    #[test]
    fn literal_list_stops_at_newline() {
        let mut input = Input::from_str("1 -2\n3");
        let list = input.parse_literal_list().unwrap();
        assert_eq!(list, vector!(Literal::new(1), Literal::new(-2)));
        // The newline is left for the line-oriented parsers.
        assert_eq!(input.peek(), Some(b'\n'));
    }

    #[test]
    fn variable_list_at_eof() {
        let mut input = Input::from_str("4 5");
        let list = input.parse_variable_list().unwrap();
        assert_eq!(list, vector!(Variable(4), Variable(5)));
    }
}
