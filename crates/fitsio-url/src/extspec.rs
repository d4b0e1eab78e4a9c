//! Component B — the extension-spec parser (`spec.md` §4.B, `ffexts`).

use crate::error::{Error, Result};

/// What kind of HDU a named extension spec is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HduKind {
    #[default]
    Any,
    Image,
    AsciiTable,
    BinaryTable,
}

/// A decoded `extspec` field (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSpec {
    Index(u32),
    Named {
        name: String,
        version: u32,
        kind: HduKind,
    },
}

/// Parses an extension selector (`spec.md` §4.B).
pub fn parse_extspec(s: &str) -> Result<ExtensionSpec> {
    let s = s.trim_start_matches(' ');

    if s.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        let n: u32 = digits
            .parse()
            .map_err(|_| Error::UrlParse(format!("extension number out of range: {s}")))?;
        if n > 9999 {
            return Err(Error::UrlParse(format!(
                "specified extension number is out of range: {s}"
            )));
        }
        return Ok(ExtensionSpec::Index(n));
    }

    let delims: &[char] = &[' ', ',', ':'];
    let name_end = s.find(delims).unwrap_or(s.len());
    let name = s[..name_end].to_string();

    let mut rest = s[name_end..].trim_start_matches(delims);

    let mut version = 0u32;
    if !rest.is_empty() {
        let version_end = rest.find(delims).unwrap_or(rest.len());
        if version_end > 0 {
            version = rest[..version_end]
                .parse()
                .map_err(|_| Error::UrlParse(format!("illegal EXTVER value in input URL: {s}")))?;
            rest = rest[version_end..].trim_start_matches(delims);
        }
    }

    let mut kind = HduKind::Any;
    if !rest.is_empty() {
        kind = match rest.chars().next() {
            Some('b') | Some('B') => HduKind::BinaryTable,
            Some('t') | Some('T') | Some('a') | Some('A') => HduKind::AsciiTable,
            Some('i') | Some('I') => HduKind::Image,
            _ => {
                return Err(Error::UrlParse(format!(
                    "unknown type of HDU in input URL: {s}"
                )))
            }
        };
    }

    Ok(ExtensionSpec::Named { name, version, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_index() {
        assert_eq!(parse_extspec("3").unwrap(), ExtensionSpec::Index(3));
    }

    #[test]
    fn index_out_of_range() {
        assert!(parse_extspec("10000").is_err());
    }

    #[test]
    fn index_with_leading_spaces() {
        assert_eq!(parse_extspec("  7").unwrap(), ExtensionSpec::Index(7));
    }

    #[test]
    fn named_only() {
        assert_eq!(
            parse_extspec("events").unwrap(),
            ExtensionSpec::Named {
                name: "events".to_string(),
                version: 0,
                kind: HduKind::Any,
            }
        );
    }

    #[test]
    fn named_with_version_and_kind() {
        assert_eq!(
            parse_extspec("events 2 b").unwrap(),
            ExtensionSpec::Named {
                name: "events".to_string(),
                version: 2,
                kind: HduKind::BinaryTable,
            }
        );
    }

    #[test]
    fn named_with_colon_delimiters() {
        assert_eq!(
            parse_extspec("events:2:image").unwrap(),
            ExtensionSpec::Named {
                name: "events".to_string(),
                version: 2,
                kind: HduKind::Image,
            }
        );
    }

    #[test]
    fn unknown_hdu_kind_letter_errors() {
        assert!(parse_extspec("events 2 z").is_err());
    }
}
