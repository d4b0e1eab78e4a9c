//! Component A — the URL/filename syntax parser.
//!
//! Ported faithfully from `cfileio.c`'s `ffiurl`/`ffourl`/`ffrtnm`: the
//! grammar is stateful and order-dependent (strip `+N` before looking at
//! brackets, lower-case only the row filter, delete the bin/col specs from
//! the row filter in place), so it is written here the same procedural way
//! rather than through a grammar crate. See `SPEC_FULL.md` §4.A.

use crate::error::{Error, Result};

/// The transport prefixes recognized without requiring the full `scheme://`
/// spelling (`spec.md` §4.A step 2). Order matters only in that none of
/// these is a prefix of another at the byte level, so a simple sequential
/// scan is unambiguous.
const BARE_SCHEMES: &[(&str, &str)] = &[
    ("ftp:", "ftp://"),
    ("http:", "http://"),
    ("mem:", "mem://"),
    ("shmem:", "shmem://"),
    ("file:", "file://"),
];

/// The decomposed form of an input or output URL (`spec.md` §3). All fields
/// are owned strings; an empty string means "absent", matching the
/// reference's `NULL`-terminator-at-offset-0 convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    pub urltype: String,
    pub infile: String,
    pub outfile: String,
    pub extspec: String,
    pub rowfilter: String,
    pub binspec: String,
    pub colspec: String,
}

impl ParsedUrl {
    /// Renders the parsed form back into a single URL string. Used only to
    /// exercise the round-trip testable property in `spec.md` §8; not part
    /// of the reference's public surface.
    pub fn render(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.urltype);
        s.push_str(&self.infile);
        if !self.outfile.is_empty() {
            s.push('(');
            s.push_str(&self.outfile);
            s.push(')');
        }
        if !self.extspec.is_empty() {
            s.push('[');
            s.push_str(&self.extspec);
            s.push(']');
        }
        let mut filter = self.rowfilter.clone();
        if !self.binspec.is_empty() {
            filter.push('[');
            filter.push_str(&self.binspec);
            filter.push(']');
        }
        if !self.colspec.is_empty() {
            filter.push('[');
            filter.push_str(&self.colspec);
            filter.push(']');
        }
        s.push_str(&filter);
        s
    }
}

/// Splits `url` into `(urltype, rest)` where `rest` is everything after the
/// recognized prefix. `spec.md` §4.A step 2.
fn split_prefix(url: &str) -> (String, &str) {
    if let Some(stripped) = url.strip_prefix('-') {
        return ("stdin://".to_string(), stripped);
    }

    if let Some(pos) = url.find("://") {
        let urltype = url[..pos + 3].to_string();
        return (urltype, &url[pos + 3..]);
    }

    for (bare, canonical) in BARE_SCHEMES {
        if let Some(rest) = url.strip_prefix(bare) {
            return (canonical.to_string(), rest);
        }
    }

    ("file://".to_string(), url)
}

fn trim_trailing_spaces(s: &str) -> &str {
    s.trim_end_matches(' ')
}

/// Strips a trailing `+<digits>` plus-extension shortcut from `infile`,
/// returning `(infile_without_suffix, extspec)`. Mirrors `ffiurl`'s
/// backward scan exactly, including the off-by-one-looking 4-digit cap
/// (`spec.md` §9, Open Question 1): the run of digits after `+` must be
/// 1 to 4 characters, and the `+` must not be the very first character.
fn strip_plus_extension(infile: &str) -> (&str, String) {
    let bytes = infile.as_bytes();
    let Some(plus_pos) = infile.rfind('+') else {
        return (infile, String::new());
    };
    if plus_pos == 0 {
        return (infile, String::new());
    }
    let digits = &bytes[plus_pos + 1..];
    if digits.is_empty() || digits.len() > 4 {
        return (infile, String::new());
    }
    if !digits.iter().all(|b| b.is_ascii_digit()) {
        return (infile, String::new());
    }
    (&infile[..plus_pos], infile[plus_pos + 1..].to_string())
}

/// Finds the first occurrence of a `[bin...]`/`[col...]` style tag and
/// returns the byte range of the bracketed body (without the enclosing
/// `[`/`]`), the byte index right after the `[`, and the byte index of the
/// `]`. `check_follow` validates the character immediately following the
/// tag name (used to require the optional bin-type letter be followed by a
/// space or `]`, per `spec.md` §4.A step 8).
fn find_tag<'a>(rowfilter: &'a str, tag: &str, check_follow: impl Fn(&str) -> bool) -> Option<(usize, usize)> {
    let pos = rowfilter.find(tag)?;
    let after_tag = pos + tag.len();
    if !check_follow(&rowfilter[after_tag..]) {
        return None;
    }
    let close = rowfilter[pos..].find(']')? + pos;
    Some((pos, close))
}

/// Extracts the `[bin...]` tag, if present, returning `(binspec, new_rowfilter)`.
fn extract_binspec(rowfilter: &str) -> Result<(String, String)> {
    let tag_match = find_tag(rowfilter, "[bin", |rest| {
        let mut chars = rest.chars();
        match chars.next() {
            Some('b') | Some('i') | Some('j') | Some('r') | Some('d') => {
                matches!(chars.next(), Some(' ') | Some(']') | None)
            }
            Some(' ') | Some(']') => true,
            _ => false,
        }
    });

    let Some((open, close)) = tag_match else {
        return Ok((String::new(), rowfilter.to_string()));
    };

    if rowfilter.as_bytes().get(close) != Some(&b']') {
        return Err(Error::UrlParse(format!(
            "input file URL is missing closing bracket ']': {rowfilter}"
        )));
    }

    let mut body = rowfilter[open + 1..close].to_string();
    if body.ends_with(' ') {
        body.pop();
    }

    let mut remaining = String::with_capacity(rowfilter.len());
    remaining.push_str(&rowfilter[..open]);
    remaining.push_str(&rowfilter[close + 1..]);

    Ok((body, remaining))
}

/// Extracts the `[col...]` tag, if present, returning `(colspec, new_rowfilter)`.
/// Unlike `[bin...]` there is no type-letter/follow-character check — any
/// occurrence of the literal `[col` counts, matching `ffiurl`'s `strstr`.
fn extract_colspec(rowfilter: &str) -> Result<(String, String)> {
    let Some(pos) = rowfilter.find("[col") else {
        return Ok((String::new(), rowfilter.to_string()));
    };
    let Some(close) = rowfilter[pos..].find(']').map(|i| i + pos) else {
        return Err(Error::UrlParse(format!(
            "input file URL is missing closing bracket ']': {rowfilter}"
        )));
    };

    let mut body = rowfilter[pos + 1..close].to_string();
    if body.ends_with(' ') {
        body.pop();
    }

    let mut remaining = String::with_capacity(rowfilter.len());
    remaining.push_str(&rowfilter[..pos]);
    remaining.push_str(&rowfilter[close + 1..]);

    Ok((body, remaining))
}

/// Parses a full input URL (`spec.md` §4.A, `parse_input`).
pub fn parse_input(url: &str) -> Result<ParsedUrl> {
    let url = url.trim_start_matches(' ');
    let mut parsed = ParsedUrl::default();
    if url.is_empty() {
        return Ok(parsed);
    }

    let (urltype, rest) = split_prefix(url);
    parsed.urltype = urltype;

    let paren = rest.find('(');
    let bracket = rest.find('[');

    let (infile_raw, outfile_raw, bracket): (&str, &str, Option<usize>) = match (paren, bracket) {
        (None, None) => (rest, "", None),
        (Some(p), None) => {
            let close = rest[p + 1..]
                .find(')')
                .map(|i| i + p + 1)
                .ok_or_else(|| Error::UrlParse(format!("missing closing ')': {rest}")))?;
            (&rest[..p], &rest[p + 1..close], None)
        }
        (Some(p), Some(b)) if p < b => {
            let close = rest[p + 1..]
                .find(')')
                .map(|i| i + p + 1)
                .ok_or_else(|| Error::UrlParse(format!("missing closing ')': {rest}")))?;
            (&rest[..p], &rest[p + 1..close], Some(b))
        }
        (_, Some(b)) => (&rest[..b], "", Some(b)),
    };

    let infile_trimmed = trim_trailing_spaces(infile_raw);
    let outfile_trimmed = trim_trailing_spaces(outfile_raw);

    let (infile_stripped, extspec) = strip_plus_extension(infile_trimmed);
    parsed.infile = infile_stripped.to_string();
    parsed.extspec = extspec;

    let mut outfile = outfile_trimmed.to_string();
    if outfile.starts_with('*') {
        if let Some(slash) = parsed.infile.rfind('/') {
            outfile = parsed.infile[slash + 1..].to_string();
        }
        // else: leave outfile as "*", matching the reference's quirk of
        // only substituting when the input name contains a path separator.
    }
    parsed.outfile = outfile;

    let Some(bracket_pos) = bracket else {
        return Ok(parsed);
    };

    let plus_ext_used = !parsed.extspec.is_empty();
    let mut rowfilter = if plus_ext_used {
        rest[bracket_pos..].to_string()
    } else {
        let after_open = bracket_pos + 1;
        let close = rest[after_open..]
            .find(']')
            .map(|i| i + after_open)
            .ok_or_else(|| {
                Error::UrlParse("input file URL is missing closing bracket ']'".to_string())
            })?;
        parsed.extspec = rest[after_open..close].to_string();
        rest[close + 1..].to_string()
    };

    rowfilter = trim_trailing_spaces(&rowfilter).to_string();
    rowfilter = rowfilter.to_lowercase();

    if rowfilter.is_empty() {
        return Ok(parsed);
    }

    let (binspec, rowfilter_after_bin) = extract_binspec(&rowfilter)?;
    parsed.binspec = binspec;

    let (colspec, rowfilter_after_col) = extract_colspec(&rowfilter_after_bin)?;
    parsed.colspec = colspec;

    parsed.rowfilter = rowfilter_after_col;
    Ok(parsed)
}

/// Parses an output URL (`spec.md` §4.A, `parse_output`): `-` alone means
/// `stdout://`, otherwise the prefix/outfile grammar from step 2 applies
/// with the whole remainder treated as the file name (no brackets/parens).
pub fn parse_output(url: &str) -> (String, String) {
    let url = url.trim_start_matches(' ');
    if url == "-" {
        return ("stdout://".to_string(), String::new());
    }
    let (urltype, rest) = split_prefix(url);
    (urltype, trim_trailing_spaces(rest).to_string())
}

/// Concatenates the canonical `urltype` and `infile` only, discarding any
/// extension/filter specification (`spec.md` §4.A, `parse_root`).
pub fn parse_root(url: &str) -> Result<String> {
    let parsed = parse_input(url)?;
    Ok(format!("{}{}", parsed.urltype, parsed.infile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_stdin_shortcut() {
        let p = parse_input("-").unwrap();
        assert_eq!(p.urltype, "stdin://");
        assert_eq!(p.infile, "");
        assert_eq!(p.outfile, "");
        assert_eq!(p.extspec, "");
        assert_eq!(p.rowfilter, "");
        assert_eq!(p.binspec, "");
        assert_eq!(p.colspec, "");
    }

    #[test]
    fn s2_ftp_with_cache_ext_and_bin() {
        let p = parse_input(" ftp:host/dir/f.fits(cache.fits)[2][bin x,y]").unwrap();
        assert_eq!(p.urltype, "ftp://");
        assert_eq!(p.infile, "host/dir/f.fits");
        assert_eq!(p.outfile, "cache.fits");
        assert_eq!(p.extspec, "2");
        assert_eq!(p.binspec, "bin x,y");
        assert_eq!(p.rowfilter, "");
    }

    #[test]
    fn s4_plus_extension() {
        let p = parse_input("data.fits+12").unwrap();
        assert_eq!(p.extspec, "12");
        assert_eq!(p.infile, "data.fits");
        assert_eq!(p.rowfilter, "");
    }

    #[test]
    fn plus_extension_digit_cap_not_stripped() {
        // 5-digit run: not a valid plus-extension (Open Question 1).
        let p = parse_input("data.fits+00000").unwrap();
        assert_eq!(p.extspec, "");
        assert_eq!(p.infile, "data.fits+00000");
    }

    #[test]
    fn plus_at_start_is_not_stripped() {
        let p = parse_input("+123").unwrap();
        assert_eq!(p.extspec, "");
        assert_eq!(p.infile, "+123");
    }

    #[test]
    fn property_2_no_brackets_or_parens() {
        let p = parse_input("plain/path/to/file.fits").unwrap();
        assert_eq!(p.infile, "plain/path/to/file.fits");
        assert_eq!(p.extspec, "");
        assert_eq!(p.rowfilter, "");
        assert_eq!(p.binspec, "");
        assert_eq!(p.colspec, "");
    }

    #[test]
    fn property_3_prefix_deterministic() {
        let a = parse_input("file://a").unwrap();
        let b = parse_input("file:a").unwrap();
        let c = parse_input("a").unwrap();
        assert_eq!(a.urltype, "file://");
        assert_eq!(b.urltype, "file://");
        assert_eq!(c.urltype, "file://");
        assert_eq!(a.infile, b.infile);
        assert_eq!(b.infile, c.infile);
    }

    #[test]
    fn wildcard_output_basename() {
        let p = parse_input("dir/file.fits(*)").unwrap();
        assert_eq!(p.outfile, "file.fits");
    }

    #[test]
    fn wildcard_output_without_slash_is_unchanged() {
        let p = parse_input("file.fits(*)").unwrap();
        assert_eq!(p.outfile, "*");
    }

    #[test]
    fn row_filter_lowercased() {
        let p = parse_input("a.fits[EVENTS][PI>5]").unwrap();
        assert_eq!(p.extspec, "EVENTS");
        assert_eq!(p.rowfilter, "[pi>5]");
    }

    #[test]
    fn row_selection_on_named_extension() {
        let p = parse_input("file.fits[EVENTS][pi>5]").unwrap();
        assert_eq!(p.extspec, "EVENTS");
        assert_eq!(p.rowfilter, "[pi>5]");
    }

    #[test]
    fn missing_close_paren_is_parse_error() {
        assert!(parse_input("a.fits(out.fits").is_err());
    }

    #[test]
    fn missing_close_bracket_is_parse_error() {
        assert!(parse_input("a.fits[2").is_err());
    }

    #[test]
    fn round_trip_identity_for_canonical_prefixes() {
        let inputs = [
            "file://plain.fits",
            "mem://scratch.fits[3]",
            "ftp://host/f.fits[EVENTS][pi>5]",
        ];
        for input in inputs {
            let parsed = parse_input(input).unwrap();
            let rendered = parsed.render();
            let reparsed = parse_input(&rendered).unwrap();
            assert_eq!(parsed, reparsed, "round trip failed for {input}");
        }
    }

    #[test]
    fn parse_output_dash_means_stdout() {
        let (urltype, outfile) = parse_output("-");
        assert_eq!(urltype, "stdout://");
        assert_eq!(outfile, "");
    }

    #[test]
    fn parse_root_strips_extension_and_filter() {
        let root = parse_root("file://a.fits[2][pi>5]").unwrap();
        assert_eq!(root, "file://a.fits");
    }
}
