//! Positional query templating.
//!
//! Placeholders follow printf conventions and take the arguments in order:
//!
//! | directive | argument              | output                                  |
//! |-----------|-----------------------|-----------------------------------------|
//! | `%s`      | any                   | quoted text, or the default string form |
//! | `%d`      | integer               | decimal                                 |
//! | `%f`      | float                 | fixed point, 6 decimals                 |
//! | `%b`      | boolean               | `true` / `false`                        |
//! | `%%`      |                       | `%`                                     |
//! | `%n`      |                       | newline                                 |
//!
//! Text is wrapped in single quotes and every `'` and `"` inside it gets a
//! backslash in front. Nothing else is escaped: backslashes and control
//! characters pass through as they are. This keeps literals from breaking out
//! of their quotes, it does not make arbitrary input safe to embed.
use std::fmt;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// An argument substituted into a query template.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
  Text(String),
  Int(i64),
  Float(f64),
  Bool(bool),
  Null,
}

impl QueryArg {
  fn kind(&self) -> &'static str {
    match self {
      QueryArg::Text(_) => "text",
      QueryArg::Int(_) => "integer",
      QueryArg::Float(_) => "float",
      QueryArg::Bool(_) => "boolean",
      QueryArg::Null => "null",
    }
  }
}

/// The form a `%s` placeholder gets.
impl fmt::Display for QueryArg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryArg::Text(text) => f.write_str(&escape_text(text)),
      QueryArg::Int(i) => write!(f, "{}", i),
      // Debug keeps the decimal point on whole numbers, so 1.0 stays a float
      // in the query.
      QueryArg::Float(x) => write!(f, "{:?}", x),
      QueryArg::Bool(b) => write!(f, "{}", b),
      QueryArg::Null => f.write_str("null"),
    }
  }
}

impl From<&str> for QueryArg {
  fn from(text: &str) -> Self {
    QueryArg::Text(text.to_string())
  }
}

impl From<String> for QueryArg {
  fn from(text: String) -> Self {
    QueryArg::Text(text)
  }
}

impl From<&String> for QueryArg {
  fn from(text: &String) -> Self {
    QueryArg::Text(text.clone())
  }
}

macro_rules! impl_from_int {
  ($($ty:ty),*) => {
    $(
      impl From<$ty> for QueryArg {
        fn from(i: $ty) -> Self {
          QueryArg::Int(i64::from(i))
        }
      }
    )*
  };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for QueryArg {
  fn from(x: f32) -> Self {
    QueryArg::Float(f64::from(x))
  }
}

impl From<f64> for QueryArg {
  fn from(x: f64) -> Self {
    QueryArg::Float(x)
  }
}

impl From<bool> for QueryArg {
  fn from(b: bool) -> Self {
    QueryArg::Bool(b)
  }
}

impl<T: Into<QueryArg>> From<Option<T>> for QueryArg {
  fn from(value: Option<T>) -> Self {
    value.map_or(QueryArg::Null, Into::into)
  }
}

#[derive(Debug, PartialEq, Diagnostic, Error)]
pub enum TemplateError {
  #[error("unknown placeholder '%{directive}'")]
  #[diagnostic(
    code(redisgraph::template::unknown_directive),
    help("supported placeholders are %s, %d, %f, %b, %% and %n")
  )]
  UnknownDirective {
    #[source_code]
    src: String,
    #[label("here")]
    span: SourceSpan,
    directive: char,
  },
  #[error("the template ends with a lone '%'")]
  #[diagnostic(code(redisgraph::template::dangling_percent), help("write %% for a literal percent sign"))]
  DanglingPercent {
    #[source_code]
    src: String,
    #[label("here")]
    span: SourceSpan,
  },
  #[error("no argument for placeholder #{index}")]
  #[diagnostic(code(redisgraph::template::missing_argument))]
  MissingArgument {
    #[source_code]
    src: String,
    #[label("this placeholder has no argument")]
    span: SourceSpan,
    index: usize,
  },
  #[error("the template has {placeholders} placeholders but {args} arguments were given")]
  #[diagnostic(code(redisgraph::template::too_many_arguments))]
  TooManyArguments { placeholders: usize, args: usize },
  #[error("placeholder '%{directive}' can't format {got}")]
  #[diagnostic(code(redisgraph::template::mismatch), help("use %s to format any argument"))]
  Mismatch {
    #[source_code]
    src: String,
    #[label("expects a different argument type")]
    span: SourceSpan,
    directive: char,
    got: &'static str,
  },
}

/// Wraps `text` in single quotes, putting a backslash before each single and
/// double quote.
pub fn escape_text(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len() + 2);

  escaped.push('\'');
  for c in text.chars() {
    if c == '\'' || c == '"' {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('\'');

  escaped
}

fn render(directive: char, arg: &QueryArg) -> Option<String> {
  match (directive, arg) {
    ('s', arg) => Some(arg.to_string()),
    ('d', QueryArg::Int(i)) => Some(i.to_string()),
    ('f', QueryArg::Float(x)) => Some(format!("{:.6}", x)),
    ('b', QueryArg::Bool(b)) => Some(b.to_string()),
    _ => None,
  }
}

/// Substitutes `args` into `template`.
///
/// Every placeholder must get an argument and every argument a placeholder.
pub fn format_query(template: &str, args: &[QueryArg]) -> Result<String, TemplateError> {
  let mut formatted = String::with_capacity(template.len());
  let mut used = 0;
  let mut chars = template.char_indices();

  while let Some((start, c)) = chars.next() {
    if c != '%' {
      formatted.push(c);
      continue;
    }

    let directive = match chars.next() {
      Some((_, directive)) => directive,
      None => {
        return Err(TemplateError::DanglingPercent {
          src: template.to_string(),
          span: (start, 1).into(),
        })
      }
    };

    let span: SourceSpan = (start, 1 + directive.len_utf8()).into();

    match directive {
      '%' => formatted.push('%'),
      'n' => formatted.push('\n'),
      's' | 'd' | 'f' | 'b' => {
        let arg = args.get(used).ok_or_else(|| TemplateError::MissingArgument {
          src: template.to_string(),
          span: span.clone(),
          index: used + 1,
        })?;

        let rendered = render(directive, arg).ok_or_else(|| TemplateError::Mismatch {
          src: template.to_string(),
          span: span.clone(),
          directive,
          got: arg.kind(),
        })?;

        formatted.push_str(&rendered);
        used += 1;
      }
      directive => {
        return Err(TemplateError::UnknownDirective {
          src: template.to_string(),
          span,
          directive,
        })
      }
    }
  }

  if used < args.len() {
    return Err(TemplateError::TooManyArguments {
      placeholders: used,
      args: args.len(),
    });
  }

  Ok(formatted)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn escape() {
    let tests = vec![
      ("O'Brien", r"'O\'Brien'"),
      (r#"say "hi""#, r#"'say \"hi\"'"#),
      (r#"'"'"#, r#"'\'\"\''"#),
      ("", "''"),
      // Only quotes are escaped.
      (r"back\slash", r"'back\slash'"),
      ("tab\tnew\nline", "'tab\tnew\nline'"),
      ("Zoë", "'Zoë'"),
    ];

    for (input, expected) in tests {
      assert_eq!(expected, escape_text(input));
    }
  }

  #[test]
  fn format() {
    let tests: Vec<(&str, Vec<QueryArg>, &str)> = vec![
      (
        "MATCH (n {name:%s}) RETURN n",
        vec!["O'Brien".into()],
        r"MATCH (n {name:'O\'Brien'}) RETURN n",
      ),
      ("MATCH (n) RETURN n", vec![], "MATCH (n) RETURN n"),
      (
        "CREATE (:person {name:%s, age:%d, height:%f, alive:%b})",
        vec!["roi".into(), 32.into(), 1.8.into(), true.into()],
        "CREATE (:person {name:'roi', age:32, height:1.800000, alive:true})",
      ),
      (
        "RETURN %s, %s, %s, %s",
        vec![7.into(), 2.0.into(), false.into(), None::<i64>.into()],
        "RETURN 7, 2.0, false, null",
      ),
      ("RETURN %f", vec![3.0.into()], "RETURN 3.000000"),
      ("RETURN 100%% AS p%nLIMIT %d", vec![1.into()], "RETURN 100% AS p\nLIMIT 1"),
      ("RETURN %s", vec![Some("it's").into()], r"RETURN 'it\'s'"),
    ];

    for (template, args, expected) in tests {
      assert_eq!(Ok(String::from(expected)), format_query(template, &args));
    }
  }

  #[test]
  fn non_text_arguments_are_not_quoted() {
    let args: Vec<QueryArg> = vec![(-5).into(), 0.25.into(), u8::MAX.into()];

    assert_eq!(
      Ok(String::from("[-5, 0.25, 255]")),
      format_query("[%s, %s, %s]", &args)
    );
  }

  #[test]
  fn errors() {
    let tests: Vec<(&str, Vec<QueryArg>, TemplateError)> = vec![
      (
        "RETURN %s, %s",
        vec![1.into()],
        TemplateError::MissingArgument {
          src: String::from("RETURN %s, %s"),
          span: (11, 2).into(),
          index: 2,
        },
      ),
      (
        "RETURN 1",
        vec![1.into()],
        TemplateError::TooManyArguments {
          placeholders: 0,
          args: 1,
        },
      ),
      (
        "RETURN %d",
        vec!["1".into()],
        TemplateError::Mismatch {
          src: String::from("RETURN %d"),
          span: (7, 2).into(),
          directive: 'd',
          got: "text",
        },
      ),
      (
        "RETURN %f",
        vec![3.into()],
        TemplateError::Mismatch {
          src: String::from("RETURN %f"),
          span: (7, 2).into(),
          directive: 'f',
          got: "integer",
        },
      ),
      (
        "RETURN %x",
        vec![1.into()],
        TemplateError::UnknownDirective {
          src: String::from("RETURN %x"),
          span: (7, 2).into(),
          directive: 'x',
        },
      ),
      (
        "RETURN 5%",
        vec![],
        TemplateError::DanglingPercent {
          src: String::from("RETURN 5%"),
          span: (8, 1).into(),
        },
      ),
    ];

    for (template, args, expected) in tests {
      assert_eq!(Err(expected), format_query(template, &args), "template: {}", template);
    }
  }
}
