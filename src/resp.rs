/// Commands travel to the server as a RESP Array of Bulk Strings, the reply
/// can be any RESP type.
///
/// RESP uses prefixed lengths to transfer bulk data, so a query text never
/// needs quoting on the wire: whatever escaping happens to literals inside it
/// is a concern of the graph query language, not of this layer.
///
/// ```terminal
/// client: "*2\r\n$12\r\nGRAPH.DELETE\r\n$6\r\nsocial\r\n"
/// server: "+Graph removed, internal execution time: 0.0312 milliseconds\r\n"
/// ```
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::value::Value;

#[derive(Debug, PartialEq, Diagnostic, Error)]
pub enum ParserError {
  #[error("unexpected byte sequence")]
  #[diagnostic(code(redisgraph::resp::unexpected_byte))]
  UnexpectedByte {
    #[source_code]
    src: String,
    #[label("here")]
    span: SourceSpan,
  },
  /// The input stops in the middle of a value. Callers reading from a socket
  /// never see this: [`parse`] reports it as `Ok(None)`.
  #[error("the input ended unexpectedly at position {position}")]
  #[diagnostic(code(redisgraph::resp::unexpected_end_of_input))]
  UnexpectedEndOfInput { position: usize },
  #[error("unexpected type")]
  #[diagnostic(code(redisgraph::resp::unexpected_type))]
  UnexpectedType {
    #[source_code]
    src: String,
    #[label("{}", message)]
    span: SourceSpan,
    message: String,
  },
  #[error("unexpected value")]
  #[diagnostic(code(redisgraph::resp::unexpected_value))]
  UnexpectedValue {
    #[source_code]
    src: String,
    #[label("{}", message)]
    span: SourceSpan,
    message: String,
  },
}

#[derive(Debug)]
struct Parser<'a> {
  /// The current position we are looking at in `input`.
  position: usize,
  input: &'a [u8],
}

impl<'a> Parser<'a> {
  fn new(input: &'a [u8]) -> Self {
    Self { input, position: 0 }
  }

  fn input_as_string(&self) -> String {
    String::from_utf8_lossy(self.input).to_string()
  }

  fn end_of_input(&self) -> ParserError {
    ParserError::UnexpectedEndOfInput {
      position: self.position,
    }
  }

  /// Returns the input byte at the current position.
  ///
  /// The current position is advanced by 1.
  fn next_byte(&mut self) -> Result<u8, ParserError> {
    let byte = self.input.get(self.position).copied();

    match byte {
      None => Err(self.end_of_input()),
      Some(byte) => {
        self.position += 1;
        Ok(byte)
      }
    }
  }

  /// Returns true when `position` points to the start of a termination: "\r\n"
  fn is_at_crlf(&self) -> bool {
    self.position + 1 < self.input.len()
      && self.input[self.position] == b'\r'
      && self.input[self.position + 1] == b'\n'
  }

  /// Tries to consume the crlf the parser is currently looking at.
  ///
  /// Returns error if the parser is looking at anything else.
  fn consume_crlf(&mut self) -> Result<(), ParserError> {
    if self.position + 2 > self.input.len() {
      return Err(self.end_of_input());
    }

    if !self.is_at_crlf() {
      return Err(ParserError::UnexpectedByte {
        src: self.input_as_string(),
        span: (self.position, 2).into(),
      });
    }

    self.position += 2;

    Ok(())
  }

  /// Returns the bytes up to the next crlf and moves past the crlf.
  fn line(&mut self) -> Result<&'a [u8], ParserError> {
    let line_starts_at = self.position;

    while !self.is_at_crlf() {
      if self.position + 1 >= self.input.len() {
        return Err(self.end_of_input());
      }
      self.position += 1;
    }

    let input = self.input;
    let line = &input[line_starts_at..self.position];

    self.consume_crlf()?;

    Ok(line)
  }

  fn value(&mut self) -> Result<Value, ParserError> {
    match self.next_byte()? {
      b'+' => self.simple_string(),
      b'-' => self.error(),
      b':' => self.int(),
      b'$' => self.bulk_string_or_null(),
      b'*' => self.array_or_null(),
      _ => Err(ParserError::UnexpectedByte {
        src: self.input_as_string(),
        span: (self.position - 1, 1).into(),
      }),
    }
  }

  fn simple_string(&mut self) -> Result<Value, ParserError> {
    let line = self.line()?;
    Ok(Value::SimpleString(String::from_utf8_lossy(line).to_string()))
  }

  fn error(&mut self) -> Result<Value, ParserError> {
    let line = self.line()?;
    Ok(Value::Error(String::from_utf8_lossy(line).to_string()))
  }

  fn parse_int(&mut self) -> Result<i64, ParserError> {
    let int_starts_at = self.position;
    let line = self.line()?;
    let lexeme = String::from_utf8_lossy(line);

    lexeme.parse::<i64>().map_err(|_| ParserError::UnexpectedType {
      src: self.input_as_string(),
      span: (int_starts_at, line.len()).into(),
      message: String::from("expected integer"),
    })
  }

  /// Parses a length prefix, where -1 stands for null.
  fn length(&mut self) -> Result<Option<usize>, ParserError> {
    let length_starts_at = self.position;
    let length = self.parse_int()?;

    match length {
      -1 => Ok(None),
      n if n >= 0 => Ok(Some(n as usize)),
      n => Err(ParserError::UnexpectedValue {
        src: self.input_as_string(),
        span: (length_starts_at, n.to_string().len()).into(),
        message: String::from("expected integer greater than or equal to -1"),
      }),
    }
  }

  fn int(&mut self) -> Result<Value, ParserError> {
    Ok(Value::Int(self.parse_int()?))
  }

  fn bulk_string_or_null(&mut self) -> Result<Value, ParserError> {
    let string_length = match self.length()? {
      None => return Ok(Value::Null),
      Some(length) => length,
    };

    let string_starts_at = self.position;

    if string_starts_at + string_length > self.input.len() {
      return Err(self.end_of_input());
    }

    self.position += string_length;

    let bytes = self.input[string_starts_at..self.position].to_vec();

    self.consume_crlf()?;

    Ok(Value::BulkString(bytes))
  }

  fn array_or_null(&mut self) -> Result<Value, ParserError> {
    let array_length = match self.length()? {
      None => return Ok(Value::Null),
      Some(length) => length,
    };

    // The length comes from the wire, don't let it size the allocation alone.
    let mut elements = Vec::with_capacity(array_length.min(self.input.len()));

    for _ in 0..array_length {
      elements.push(self.value()?);
    }

    Ok(Value::Array(elements))
  }

  /// Walks over one value without building it.
  fn skip_value(&mut self) -> Result<(), ParserError> {
    match self.next_byte()? {
      b'+' | b'-' | b':' => self.line().map(|_| ()),
      b'$' => match self.length()? {
        None => Ok(()),
        Some(string_length) => {
          if self.position + string_length > self.input.len() {
            return Err(self.end_of_input());
          }
          self.position += string_length;
          self.consume_crlf()
        }
      },
      b'*' => match self.length()? {
        None => Ok(()),
        Some(array_length) => {
          for _ in 0..array_length {
            self.skip_value()?;
          }
          Ok(())
        }
      },
      _ => Err(ParserError::UnexpectedByte {
        src: self.input_as_string(),
        span: (self.position - 1, 1).into(),
      }),
    }
  }
}

/// Returns the length of the value at the start of `input`, or `None` if
/// `input` holds only a prefix of it.
///
/// Nothing is copied, so it is cheap to call again each time more bytes
/// arrive.
pub fn check(input: &[u8]) -> Result<Option<usize>, ParserError> {
  let mut parser = Parser::new(input);

  match parser.skip_value() {
    Ok(()) => Ok(Some(parser.position)),
    Err(ParserError::UnexpectedEndOfInput { .. }) => Ok(None),
    Err(error) => Err(error),
  }
}

/// Parses one value from the start of `input`.
///
/// Returns the value and the number of bytes it occupied, or `None` if
/// `input` holds only a prefix of a value and more bytes must be read.
///
/// Values are only built once [`check`] has found the whole value in
/// `input`.
pub fn parse(input: &[u8]) -> Result<Option<(Value, usize)>, ParserError> {
  let value_length = match check(input)? {
    None => return Ok(None),
    Some(value_length) => value_length,
  };

  let mut parser = Parser::new(&input[..value_length]);
  let value = parser.value()?;

  Ok(Some((value, parser.position)))
}

/// Encodes a command as a RESP Array of Bulk Strings.
pub fn encode<I, A>(args: I) -> Vec<u8>
where
  I: IntoIterator<Item = A>,
  A: AsRef<[u8]>,
{
  let args: Vec<A> = args.into_iter().collect();

  let mut buffer = Vec::new();

  buffer.push(b'*');
  buffer.extend_from_slice(args.len().to_string().as_bytes());
  buffer.extend_from_slice(b"\r\n");

  for arg in &args {
    let arg = arg.as_ref();
    buffer.push(b'$');
    buffer.extend_from_slice(arg.len().to_string().as_bytes());
    buffer.extend_from_slice(b"\r\n");
    buffer.extend_from_slice(arg);
    buffer.extend_from_slice(b"\r\n");
  }

  buffer
}

/// Renders RESP bytes on a single log line.
pub(crate) fn escape_for_log(bytes: &[u8]) -> String {
  String::from_utf8_lossy(bytes)
    .replace('\r', "\\r")
    .replace('\n', "\\n")
}
