//! Component C — the histogram/binning-spec parser (`spec.md` §4.C,
//! `ffbins`/`ffbinr`/`fits_get_token`).

use crate::error::{Error, Result};

/// Pixel data type requested for the synthesized histogram image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelKind {
    I8,
    I16,
    #[default]
    I32,
    F32,
    F64,
}

/// A fully decoded binning specification (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct BinSpec {
    pub pixel_kind: PixelKind,
    pub haxis: usize,
    pub columns: [Option<String>; 4],
    pub min: [Option<f64>; 4],
    pub max: [Option<f64>; 4],
    pub binsize: [Option<f64>; 4],
    pub min_kw: [Option<String>; 4],
    pub max_kw: [Option<String>; 4],
    pub bin_kw: [Option<String>; 4],
    pub weight: f64,
    pub weight_kw: Option<String>,
    pub reciprocal: bool,
}

impl Default for BinSpec {
    fn default() -> Self {
        BinSpec {
            pixel_kind: PixelKind::I32,
            haxis: 2,
            columns: Default::default(),
            min: Default::default(),
            max: Default::default(),
            binsize: Default::default(),
            min_kw: Default::default(),
            max_kw: Default::default(),
            bin_kw: Default::default(),
            weight: 1.0,
            weight_kw: None,
            reciprocal: false,
        }
    }
}

/// A single parsed `[col=]min:max:binsize` range (`ffbinr`'s output set).
#[derive(Debug, Clone, Default)]
struct RangeSpec {
    col: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
    binsize: Option<f64>,
    min_kw: Option<String>,
    max_kw: Option<String>,
    bin_kw: Option<String>,
}

struct Cursor<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Cursor { s, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.advance(1);
        }
    }

    fn at_end(&self) -> bool {
        self.rest().is_empty()
    }
}

/// `fits_get_token`: skip leading spaces, copy up to the first delimiter
/// character, advance past the token, and report whether every character in
/// it was a digit, `.`, or `-` (`spec.md` §4.C).
fn get_token(cur: &mut Cursor, delims: &str) -> (String, bool) {
    cur.skip_spaces();
    let rest = cur.rest();
    let end = rest.find(|c: char| delims.contains(c)).unwrap_or(rest.len());
    let token = rest[..end].to_string();
    cur.advance(end);
    let is_number = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '-');
    (token, is_number)
}

/// Preserves the `-` → `0` quirk pinned by `spec.md` §9, Open Question 3.
fn parse_f64_token(tok: &str) -> f64 {
    if tok == "-" {
        return 0.0;
    }
    tok.parse().unwrap_or(0.0)
}

fn strip_leading_hash_digit(tok: &str) -> String {
    let mut chars = tok.chars();
    if chars.next() == Some('#') && chars.next().is_some_and(|c| c.is_ascii_digit()) {
        tok[1..].to_string()
    } else {
        tok.to_string()
    }
}

/// `ffbinr`: parses one `[col=]min:max:binsize` (or any shorter prefix of
/// it) range specification.
fn parse_binrange(cur: &mut Cursor) -> RangeSpec {
    let (tok1, is_num1) = get_token(cur, " ,=:;");

    if tok1.is_empty() && matches!(cur.peek(), None | Some(',') | Some(';')) {
        return RangeSpec::default();
    }

    let (mut col, tok, is_num) = if !is_num1 && cur.peek() != Some(':') {
        let name = strip_leading_hash_digit(&tok1);
        if cur.peek() != Some('=') {
            return RangeSpec {
                col: Some(name),
                ..Default::default()
            };
        }
        cur.advance(1); // skip '='
        let (tok, is_num) = get_token(cur, " ,:;");
        (Some(name), tok, is_num)
    } else {
        (None, tok1, is_num1)
    };

    if cur.peek() != Some(':') {
        // Only one token given: it is the binsize, not a min:max:binsize triple.
        let mut spec = RangeSpec {
            col: col.take(),
            ..Default::default()
        };
        if !tok.is_empty() {
            if is_num {
                spec.binsize = Some(parse_f64_token(&tok));
            } else {
                spec.bin_kw = Some(tok);
            }
        }
        return spec;
    }

    let mut spec = RangeSpec {
        col: col.take(),
        ..Default::default()
    };
    if !tok.is_empty() {
        if is_num {
            spec.min = Some(parse_f64_token(&tok));
        } else {
            spec.min_kw = Some(tok);
        }
    }

    cur.advance(1); // skip ':' between min and max
    let (tok2, is_num2) = get_token(cur, " ,:;");
    if !tok2.is_empty() {
        if is_num2 {
            spec.max = Some(parse_f64_token(&tok2));
        } else {
            spec.max_kw = Some(tok2);
        }
    }

    if cur.peek() != Some(':') {
        return spec;
    }

    cur.advance(1); // skip ':' between max and binsize
    let (tok3, is_num3) = get_token(cur, " ,:;");
    if !tok3.is_empty() {
        if is_num3 {
            spec.binsize = Some(parse_f64_token(&tok3));
        } else {
            spec.bin_kw = Some(tok3);
        }
    }

    spec
}

fn apply_range(spec: &mut BinSpec, axis: usize, r: &RangeSpec) {
    spec.min[axis] = r.min;
    spec.max[axis] = r.max;
    spec.binsize[axis] = r.binsize;
    spec.min_kw[axis] = r.min_kw.clone();
    spec.max_kw[axis] = r.max_kw.clone();
    spec.bin_kw[axis] = r.bin_kw.clone();
}

fn parse_error(binspec: &str, detail: &str) -> Error {
    Error::UrlParse(format!("illegal binning specification in URL: {detail}: {binspec}"))
}

/// Parses a weight clause (`;[/]<value-or-keyword>`), returning
/// `(weight, weight_kw, reciprocal)`.
fn parse_weight(cur: &mut Cursor) -> (f64, Option<String>, bool) {
    cur.advance(1); // skip ';'
    cur.skip_spaces();

    let reciprocal = if cur.peek() == Some('/') {
        cur.advance(1);
        cur.skip_spaces();
        true
    } else {
        false
    };

    let range = parse_binrange(cur);
    let weight = range.binsize.unwrap_or(1.0);
    (weight, range.col, reciprocal)
}

/// Parses a full binning specification (`spec.md` §4.C). `s` is assumed to
/// already start with `bin` (the leading `[` from the URL bracket has
/// already been stripped by the URL parser).
pub fn parse_binspec(s: &str) -> Result<BinSpec> {
    let mut out = BinSpec::default();

    let mut cur = Cursor::new(&s[3.min(s.len())..]); // skip "bin"

    out.pixel_kind = match cur.peek() {
        Some('i') => {
            cur.advance(1);
            PixelKind::I16
        }
        Some('j') => {
            cur.advance(1);
            PixelKind::I32
        }
        Some('r') => {
            cur.advance(1);
            PixelKind::F32
        }
        Some('d') => {
            cur.advance(1);
            PixelKind::F64
        }
        Some('b') => {
            cur.advance(1);
            PixelKind::I8
        }
        _ => PixelKind::I32,
    };

    if cur.at_end() {
        return Ok(out);
    }
    if cur.peek() != Some(' ') {
        return Err(parse_error(s, "a space must follow the bin type letter"));
    }
    cur.skip_spaces();
    if cur.at_end() {
        return Ok(out);
    }

    if cur.peek() == Some('(') {
        let mut haxis = 0usize;
        for ii in 0..4 {
            cur.advance(1); // '(' on first iteration, ',' on later ones
            cur.skip_spaces();
            let rest = cur.rest();
            let end = rest.find([' ', ',', ')']).unwrap_or(rest.len());
            let name = rest[..end].to_string();
            cur.advance(end);
            out.columns[ii] = Some(name);
            cur.skip_spaces();
            if cur.peek() == Some(')') {
                haxis = ii + 1;
                break;
            }
            if ii == 3 {
                return Err(parse_error(
                    s,
                    "binning specification has too many column names or is missing closing ')'",
                ));
            }
        }
        out.haxis = haxis;

        cur.advance(1); // skip ')'
        cur.skip_spaces();

        if !cur.at_end() {
            if cur.peek() != Some('=') {
                return Err(parse_error(
                    s,
                    "an equals sign '=' must follow the column names",
                ));
            }
            cur.advance(1);
            cur.skip_spaces();

            let range = parse_binrange(&mut cur);
            for axis in 0..out.haxis {
                apply_range(&mut out, axis, &range);
            }
        }
    } else {
        let mut haxis = 0usize;
        for ii in 0..4 {
            let range = parse_binrange(&mut cur);
            out.columns[ii] = range.col.clone();
            apply_range(&mut out, ii, &range);

            match cur.peek() {
                None | Some(';') => {
                    haxis = ii + 1;
                    break;
                }
                Some(' ') => {
                    cur.skip_spaces();
                    match cur.peek() {
                        None | Some(';') => {
                            haxis = ii + 1;
                            break;
                        }
                        Some(',') => cur.advance(1),
                        _ => return Err(parse_error(s, "expected ',' between axes")),
                    }
                }
                Some(',') => cur.advance(1),
                _ => return Err(parse_error(s, "unexpected character between axes")),
            }

            if ii == 3 {
                haxis = 4;
            }
        }
        if haxis == 0 {
            haxis = 4;
        }
        if haxis > 4 {
            return Err(parse_error(s, "apparently too many histogram dimensions (> 4)"));
        }
        out.haxis = haxis;

        // A single bare binsize with no column name is the default 2D case.
        if out.haxis == 1 && out.columns[0].is_none() && out.min[0].is_none() && out.max[0].is_none()
        {
            out.haxis = 2;
            out.binsize[1] = out.binsize[0];
        }
    }

    if cur.peek() == Some(';') {
        let (weight, weight_kw, reciprocal) = parse_weight(&mut cur);
        out.weight = weight;
        out.weight_kw = weight_kw;
        out.reciprocal = reciprocal;
    }

    cur.skip_spaces();
    if !cur.at_end() {
        return Err(parse_error(s, "should have reached the end of string"));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tail_gives_defaults() {
        let b = parse_binspec("bin").unwrap();
        assert_eq!(b.haxis, 2);
        assert_eq!(b.pixel_kind, PixelKind::I32);
    }

    #[test]
    fn property_8_bini_paren_columns_with_range() {
        let b = parse_binspec("bini (X,Y)=:10:1").unwrap();
        assert_eq!(b.haxis, 2);
        assert_eq!(b.pixel_kind, PixelKind::I16);
        assert_eq!(b.columns[0].as_deref(), Some("X"));
        assert_eq!(b.columns[1].as_deref(), Some("Y"));
        assert_eq!(b.max[0], Some(10.0));
        assert_eq!(b.max[1], Some(10.0));
        assert_eq!(b.binsize[0], Some(1.0));
        assert_eq!(b.binsize[1], Some(1.0));
        assert_eq!(b.min[0], None);
        assert_eq!(b.min[1], None);
    }

    #[test]
    fn single_bare_binsize_defaults_to_2d() {
        let b = parse_binspec("bin 4").unwrap();
        assert_eq!(b.haxis, 2);
        assert_eq!(b.binsize[0], Some(4.0));
        assert_eq!(b.binsize[1], Some(4.0));
    }

    #[test]
    fn bare_column_names_comma_separated() {
        let b = parse_binspec("bin x,y").unwrap();
        assert_eq!(b.haxis, 2);
        assert_eq!(b.columns[0].as_deref(), Some("x"));
        assert_eq!(b.columns[1].as_deref(), Some("y"));
    }

    #[test]
    fn column_with_min_max_binsize() {
        let b = parse_binspec("bin x=0:100:5").unwrap();
        assert_eq!(b.columns[0].as_deref(), Some("x"));
        assert_eq!(b.min[0], Some(0.0));
        assert_eq!(b.max[0], Some(100.0));
        assert_eq!(b.binsize[0], Some(5.0));
    }

    #[test]
    fn weight_clause_with_reciprocal_keyword() {
        let b = parse_binspec("bin x,y;/exposure").unwrap();
        assert!(b.reciprocal);
        assert_eq!(b.weight_kw.as_deref(), Some("exposure"));
    }

    #[test]
    fn weight_clause_numeric() {
        let b = parse_binspec("bin x,y;2.5").unwrap();
        assert!(!b.reciprocal);
        assert_eq!(b.weight, 2.5);
    }

    #[test]
    fn bare_minus_is_zero() {
        // Open Question 3: '-' is treated as a numeric token parsing to 0.
        let b = parse_binspec("bin x=-:10").unwrap();
        assert_eq!(b.min[0], Some(0.0));
        assert_eq!(b.max[0], Some(10.0));
    }

    #[test]
    fn too_many_axes_is_an_error() {
        assert!(parse_binspec("bin a,b,c,d,e").is_err());
    }

    #[test]
    fn missing_closing_paren_is_an_error() {
        assert!(parse_binspec("bin (x,y,z,w,v").is_err());
    }
}
