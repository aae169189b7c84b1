//! Tokenizer shared by the Turtle and SPARQL parsers.
//!
//! The two grammars overlap almost entirely at the lexical level (IRIs,
//! prefixed names, literals, punctuation), so one pass serves both. Keywords
//! are left as bare [`Token::Word`]s for the parsers to interpret.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
  /// `<...>`, without the angle brackets.
  Iri(String),
  /// `prefix:local`; the prefix may be empty.
  PrefixedName { prefix: String, local: String },
  /// `?name` or `$name`, without the sigil.
  Var(String),
  /// `_:label`, without the `_:`.
  Blank(String),
  /// A quoted string with escapes already resolved.
  Str(String),
  /// `@tag`: a language tag, or the `@prefix` / `@base` directives.
  LangTag(String),
  DoubleCaret,
  Integer(String),
  Decimal(String),
  Word(String),
  Punct(char),
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned {
  pub token: Token,
  pub line:  usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>> {
  let chars: Vec<char> = input.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0usize;
  let mut line = 1usize;

  let err = |line: usize, message: String| Error::Syntax { line, message };

  while i < chars.len() {
    let c = chars[i];
    match c {
      '\n' => {
        line += 1;
        i += 1;
      }
      c if c.is_whitespace() => i += 1,
      '#' => {
        while i < chars.len() && chars[i] != '\n' {
          i += 1;
        }
      }
      '<' => {
        let start = i + 1;
        let mut end = start;
        while end < chars.len() && chars[end] != '>' {
          if chars[end].is_whitespace() {
            return Err(err(line, "whitespace inside IRI".into()));
          }
          end += 1;
        }
        if end >= chars.len() {
          return Err(err(line, "unterminated IRI".into()));
        }
        tokens.push(Spanned {
          token: Token::Iri(chars[start..end].iter().collect()),
          line,
        });
        i = end + 1;
      }
      '"' | '\'' => {
        let start_line = line;
        let (value, next) = read_string(&chars, i, &mut line)
          .map_err(|m| err(start_line, m))?;
        tokens.push(Spanned { token: Token::Str(value), line: start_line });
        i = next;
      }
      '?' | '$' => {
        let (name, next) = read_while(&chars, i + 1, is_name_char);
        if name.is_empty() {
          return Err(err(line, format!("empty variable name after {c:?}")));
        }
        tokens.push(Spanned { token: Token::Var(name), line });
        i = next;
      }
      '_' if chars.get(i + 1) == Some(&':') => {
        let (label, next) = read_while(&chars, i + 2, is_name_char);
        if label.is_empty() {
          return Err(err(line, "empty blank node label".into()));
        }
        tokens.push(Spanned { token: Token::Blank(label), line });
        i = next;
      }
      '@' => {
        let (tag, next) =
          read_while(&chars, i + 1, |c| c.is_ascii_alphanumeric() || c == '-');
        if tag.is_empty() {
          return Err(err(line, "empty language tag".into()));
        }
        tokens.push(Spanned { token: Token::LangTag(tag), line });
        i = next;
      }
      '^' if chars.get(i + 1) == Some(&'^') => {
        tokens.push(Spanned { token: Token::DoubleCaret, line });
        i += 2;
      }
      c if c.is_ascii_digit()
        || ((c == '+' || c == '-')
          && chars.get(i + 1).is_some_and(char::is_ascii_digit)) =>
      {
        let (int_part, mut next) =
          read_while(&chars, i + 1, |c| c.is_ascii_digit());
        let mut lexical = format!("{c}{int_part}");
        let is_decimal = chars.get(next) == Some(&'.')
          && chars.get(next + 1).is_some_and(char::is_ascii_digit);
        if is_decimal {
          let (frac, after) = read_while(&chars, next + 1, |c| c.is_ascii_digit());
          lexical.push('.');
          lexical.push_str(&frac);
          next = after;
          tokens.push(Spanned { token: Token::Decimal(lexical), line });
        } else {
          tokens.push(Spanned { token: Token::Integer(lexical), line });
        }
        i = next;
      }
      '{' | '}' | '(' | ')' | '.' | ';' | ',' | '*' => {
        tokens.push(Spanned { token: Token::Punct(c), line });
        i += 1;
      }
      c if c.is_alphabetic() || c == '_' || c == ':' => {
        let (word, next) = read_while(&chars, i, is_name_char);
        if chars.get(next) == Some(&':') {
          let (mut local, mut after) = read_while(&chars, next + 1, |c| {
            is_name_char(c) || c == '.' || c == '%'
          });
          // A trailing dot terminates the statement, it is not part of the name.
          while local.ends_with('.') {
            local.pop();
            after -= 1;
          }
          tokens.push(Spanned {
            token: Token::PrefixedName { prefix: word, local },
            line,
          });
          i = after;
        } else {
          tokens.push(Spanned { token: Token::Word(word), line });
          i = next;
        }
      }
      other => return Err(err(line, format!("unexpected character {other:?}"))),
    }
  }

  Ok(tokens)
}

fn is_name_char(c: char) -> bool { c.is_alphanumeric() || c == '_' || c == '-' }

fn read_while(chars: &[char], start: usize, pred: impl Fn(char) -> bool) -> (String, usize) {
  let mut end = start;
  while end < chars.len() && pred(chars[end]) {
    end += 1;
  }
  (chars[start..end].iter().collect(), end)
}

/// Read a short or long (triple-quoted) string starting at `start`.
/// Returns the unescaped value and the index just past the closing quote.
fn read_string(
  chars: &[char],
  start: usize,
  line: &mut usize,
) -> Result<(String, usize), String> {
  let quote = chars[start];
  let long = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
  let mut i = if long { start + 3 } else { start + 1 };
  let mut out = String::new();

  loop {
    let Some(&c) = chars.get(i) else {
      return Err("unterminated string literal".into());
    };
    match c {
      '\\' => {
        let (escaped, next) = read_escape(chars, i)?;
        out.push(escaped);
        i = next;
      }
      c if c == quote && !long => return Ok((out, i + 1)),
      c if c == quote
        && chars.get(i + 1) == Some(&quote)
        && chars.get(i + 2) == Some(&quote) =>
      {
        return Ok((out, i + 3));
      }
      '\n' if !long => return Err("newline in short string literal".into()),
      '\n' => {
        *line += 1;
        out.push('\n');
        i += 1;
      }
      c => {
        out.push(c);
        i += 1;
      }
    }
  }
}

fn read_escape(chars: &[char], backslash: usize) -> Result<(char, usize), String> {
  let Some(&kind) = chars.get(backslash + 1) else {
    return Err("dangling escape".into());
  };
  let simple = match kind {
    't' => Some('\t'),
    'b' => Some('\u{8}'),
    'n' => Some('\n'),
    'r' => Some('\r'),
    'f' => Some('\u{c}'),
    '"' => Some('"'),
    '\'' => Some('\''),
    '\\' => Some('\\'),
    _ => None,
  };
  if let Some(c) = simple {
    return Ok((c, backslash + 2));
  }
  let width = match kind {
    'u' => 4,
    'U' => 8,
    other => return Err(format!("unknown escape \\{other}")),
  };
  let digits: String = chars
    .get(backslash + 2..backslash + 2 + width)
    .ok_or("truncated unicode escape")?
    .iter()
    .collect();
  let code = u32::from_str_radix(&digits, 16)
    .map_err(|_| format!("invalid unicode escape \\{kind}{digits}"))?;
  let c = char::from_u32(code).ok_or(format!("invalid code point {code:#x}"))?;
  Ok((c, backslash + 2 + width))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(input: &str) -> Vec<Token> {
    tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
  }

  #[test]
  fn prefixed_name_drops_statement_dot() {
    assert_eq!(kinds("us:query ."), vec![
      Token::PrefixedName { prefix: "us".into(), local: "query".into() },
      Token::Punct('.'),
    ]);
    assert_eq!(kinds("ex:a."), vec![
      Token::PrefixedName { prefix: "ex".into(), local: "a".into() },
      Token::Punct('.'),
    ]);
  }

  #[test]
  fn long_strings_keep_newlines_and_count_lines() {
    let toks = tokenize("\"\"\"select *\nwhere {}\"\"\" <x>").unwrap();
    assert_eq!(toks[0].token, Token::Str("select *\nwhere {}".into()));
    assert_eq!(toks[1].line, 2);
  }

  #[test]
  fn escapes_are_resolved() {
    assert_eq!(kinds(r#""a\"bé""#), vec![Token::Str("a\"bé".into())]);
  }

  #[test]
  fn numbers_and_signs() {
    assert_eq!(kinds("-3 4.5 7"), vec![
      Token::Integer("-3".into()),
      Token::Decimal("4.5".into()),
      Token::Integer("7".into()),
    ]);
  }

  #[test]
  fn unterminated_iri_is_an_error() {
    assert!(matches!(tokenize("<http://x"), Err(Error::Syntax { .. })));
  }
}
