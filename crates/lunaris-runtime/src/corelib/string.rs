//! The `string` table; also the `__index` of every string value

use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

use lunaris_engine::{CallbackArguments, DynValue, ExecutionContext, ScriptError, ScriptResult, Table};
use parking_lot::Mutex;

use super::pattern::{self, Match};
use super::{byte_range, lossy, register};

/// Upper bound for `string.rep` results.
const MAX_STRING_SIZE: usize = 1 << 28;

pub(super) fn library() -> Table {
    let lib = Table::new();
    register(&lib, "len", len);
    register(&lib, "sub", sub);
    register(&lib, "upper", upper);
    register(&lib, "lower", lower);
    register(&lib, "rep", rep);
    register(&lib, "reverse", reverse);
    register(&lib, "byte", byte);
    register(&lib, "char", from_codes);
    register(&lib, "format", format);
    register(&lib, "find", find);
    register(&lib, "match", match_);
    register(&lib, "gmatch", gmatch);
    register(&lib, "gsub", gsub);
    lib
}

fn len(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "len")?;
    Ok(DynValue::Number(s.len() as f64))
}

fn sub(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "sub")?;
    let start = args.opt_integer(1, "sub", 1)?;
    let end = args.opt_integer(2, "sub", -1)?;
    Ok(match byte_range(s.len(), start, end) {
        Some((from, to)) => lossy(&s.as_bytes()[from..to]),
        None => DynValue::from(""),
    })
}

fn upper(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    Ok(DynValue::string(args.check_string(0, "upper")?.to_ascii_uppercase()))
}

fn lower(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    Ok(DynValue::string(args.check_string(0, "lower")?.to_ascii_lowercase()))
}

fn rep(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "rep")?;
    let count = args.check_integer(1, "rep")?;
    let separator = args.opt_string(2, "rep", "")?;
    if count <= 0 {
        return Ok(DynValue::from(""));
    }
    let count = count as usize;
    let total = (s.len() + separator.len()).saturating_mul(count);
    if total > MAX_STRING_SIZE {
        return Err(ScriptError::runtime("resulting string too large"));
    }
    Ok(DynValue::string(vec![s; count].join(&separator)))
}

fn reverse(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "reverse")?;
    Ok(DynValue::string(s.chars().rev().collect::<String>()))
}

fn byte(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "byte")?;
    let start = args.opt_integer(1, "byte", 1)?;
    let end = args.opt_integer(2, "byte", start)?;
    let values = match byte_range(s.len(), start, end) {
        Some((from, to)) => s.as_bytes()[from..to]
            .iter()
            .map(|&b| DynValue::Number(b as f64))
            .collect(),
        None => Vec::new(),
    };
    Ok(DynValue::Tuple(values.into()))
}

fn from_codes(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let mut bytes = Vec::with_capacity(args.len());
    for index in 0..args.len() {
        let code = args.check_integer(index, "char")?;
        let byte = u8::try_from(code).map_err(|_| {
            ScriptError::runtime(format!("bad argument #{} to 'char' (value out of range)", index + 1))
        })?;
        bytes.push(byte);
    }
    Ok(lossy(&bytes))
}

// ============================================================================
// Pattern functions
// ============================================================================

/// Start offset for `init`, or `None` when it lies past the end.
fn start_offset(len: usize, init: i64) -> Option<usize> {
    let len = len as i64;
    let init = match init {
        i if i < 0 => (len + i + 1).max(1),
        0 => 1,
        i => i,
    };
    (init <= len + 1).then(|| (init - 1) as usize)
}

fn find(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "find")?;
    let pat = args.check_string(1, "find")?;
    let Some(start) = start_offset(s.len(), args.opt_integer(2, "find", 1)?) else {
        return Ok(DynValue::Nil);
    };
    let (src, needle) = (s.as_bytes(), pat.as_bytes());

    if args.get(3).is_truthy() || pattern::is_plain(needle) {
        let found = if needle.is_empty() {
            Some(0)
        } else {
            src[start..].windows(needle.len()).position(|window| window == needle)
        };
        return Ok(match found {
            Some(offset) => {
                let first = start + offset;
                DynValue::tuple(vec![
                    DynValue::Number((first + 1) as f64),
                    DynValue::Number((first + needle.len()) as f64),
                ])
            }
            None => DynValue::Nil,
        });
    }

    Ok(match pattern::search(src, needle, start)? {
        Some(m) => {
            let mut values = vec![
                DynValue::Number((m.start + 1) as f64),
                DynValue::Number(m.end as f64),
            ];
            values.extend(m.captures);
            DynValue::Tuple(values.into())
        }
        None => DynValue::Nil,
    })
}

fn match_(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "match")?;
    let pat = args.check_string(1, "match")?;
    let Some(start) = start_offset(s.len(), args.opt_integer(2, "match", 1)?) else {
        return Ok(DynValue::Nil);
    };
    Ok(match pattern::search(s.as_bytes(), pat.as_bytes(), start)? {
        Some(m) => DynValue::Tuple(m.values(s.as_bytes()).into()),
        None => DynValue::Nil,
    })
}

fn gmatch(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "gmatch")?;
    let pat = args.check_string(1, "gmatch")?;
    let matches: Vec<Vec<DynValue>> = pattern::search_all(s.as_bytes(), pat.as_bytes(), None)?
        .iter()
        .map(|m| m.values(s.as_bytes()))
        .collect();
    let pending = Arc::new(Mutex::new(matches.into_iter()));
    Ok(DynValue::callback("gmatch_iterator", move |_ctx, _args| {
        Ok(match pending.lock().next() {
            Some(values) => DynValue::Tuple(values.into()),
            None => DynValue::Nil,
        })
    }))
}

fn gsub(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let s = args.check_string(0, "gsub")?;
    let pat = args.check_string(1, "gsub")?;
    let replacement = args.check_value(2, "gsub")?;
    if !matches!(
        replacement,
        DynValue::String(_) | DynValue::Number(_) | DynValue::Table(_)
    ) && !replacement.is_callable()
    {
        return Err(ScriptError::runtime(format!(
            "bad argument #3 to 'gsub' (string/function/table expected, got {})",
            replacement.type_name()
        )));
    }
    let limit = match args.get(3) {
        DynValue::Nil => None,
        _ => Some(args.check_integer(3, "gsub")?.max(0) as usize),
    };

    let src = s.as_bytes();
    let found = pattern::search_all(src, pat.as_bytes(), limit)?;
    let mut out = Vec::with_capacity(src.len());
    let mut last = 0;
    for m in &found {
        out.extend_from_slice(&src[last..m.start]);
        let substitute = replacement_for(ctx, &replacement, src, m)?;
        match substitute {
            Some(text) => out.extend_from_slice(text.as_bytes()),
            None => out.extend_from_slice(&src[m.start..m.end]),
        }
        last = m.end;
    }
    out.extend_from_slice(&src[last..]);

    Ok(DynValue::tuple(vec![lossy(&out), DynValue::Number(found.len() as f64)]))
}

/// Replacement text for one match; `None` keeps the original text.
fn replacement_for(
    ctx: &mut ExecutionContext<'_>,
    replacement: &DynValue,
    src: &[u8],
    m: &Match,
) -> ScriptResult<Option<String>> {
    let values = m.values(src);
    let value = match replacement {
        DynValue::Table(_) => ctx.index(replacement, &values[0])?,
        f if f.is_callable() => ctx.call(f, values)?.to_scalar(),
        template => return expand_template(template, src, m, &values).map(Some),
    };
    match value {
        DynValue::Nil | DynValue::Boolean(false) => Ok(None),
        DynValue::String(_) | DynValue::Number(_) => Ok(value.to_concat_string()),
        other => Err(ScriptError::runtime(format!(
            "invalid replacement value (a {})",
            other.type_name()
        ))),
    }
}

/// Expand `%0`-`%9` and `%%` in a replacement string.
fn expand_template(template: &DynValue, src: &[u8], m: &Match, values: &[DynValue]) -> ScriptResult<String> {
    let template = template.to_concat_string().unwrap_or_default();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('0') => out.push_str(&String::from_utf8_lossy(&src[m.start..m.end])),
            Some(d) if d.is_ascii_digit() => {
                let index = d as usize - '1' as usize;
                let value = values.get(index).ok_or_else(|| {
                    ScriptError::runtime(format!("invalid capture index %{} in replacement string", d))
                })?;
                out.push_str(&value.to_concat_string().unwrap_or_default());
            }
            _ => return Err(ScriptError::runtime("invalid use of '%' in replacement string")),
        }
    }
    Ok(out)
}

// ============================================================================
// string.format
// ============================================================================

#[derive(Debug, Default)]
struct FormatSpec {
    left: bool,
    plus: bool,
    space: bool,
    alternate: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

impl FormatSpec {
    fn parse(chars: &mut Peekable<Chars<'_>>) -> ScriptResult<Self> {
        let mut spec = FormatSpec::default();
        while let Some(&c) = chars.peek() {
            match c {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alternate = true,
                '0' => spec.zero = true,
                _ => break,
            }
            chars.next();
        }
        spec.width = read_count(chars)?.unwrap_or(0);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(read_count(chars)?.unwrap_or(0));
        }
        Ok(spec)
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }

    /// Pad to the field width. Zero padding goes after the sign and any radix prefix.
    fn pad(&self, body: String, zero_allowed: bool) -> String {
        let len = body.chars().count();
        if len >= self.width {
            return body;
        }
        let fill = self.width - len;
        if self.left {
            format!("{}{}", body, " ".repeat(fill))
        } else if self.zero && zero_allowed {
            let prefix_len = body
                .char_indices()
                .find(|&(_, c)| !matches!(c, '+' | '-' | ' '))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let prefix_len = match &body[prefix_len..] {
                rest if rest.starts_with("0x") || rest.starts_with("0X") => prefix_len + 2,
                _ => prefix_len,
            };
            format!("{}{}{}", &body[..prefix_len], "0".repeat(fill), &body[prefix_len..])
        } else {
            format!("{}{}", " ".repeat(fill), body)
        }
    }
}

/// At most two digits, as in C.
fn read_count(chars: &mut Peekable<Chars<'_>>) -> ScriptResult<Option<usize>> {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    if digits.len() > 2 {
        return Err(ScriptError::runtime("invalid format (width or precision too long)"));
    }
    Ok(digits.parse().ok())
}

fn format(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let template = args.check_string(0, "format")?;
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let spec = FormatSpec::parse(&mut chars)?;
        let conversion = chars
            .next()
            .ok_or_else(|| ScriptError::runtime("invalid option '%' to 'format'"))?;
        arg += 1;

        let piece = match conversion {
            'd' | 'i' | 'u' => {
                let n = args.check_integer(arg, "format")?;
                let mut digits = n.unsigned_abs().to_string();
                if let Some(precision) = spec.precision {
                    digits = format!("{:0>width$}", digits, width = precision);
                }
                spec.pad(format!("{}{}", spec.sign(n < 0), digits), spec.precision.is_none())
            }
            'x' | 'X' | 'o' => {
                let n = args.check_integer(arg, "format")? as u64;
                let (mut digits, prefix) = match conversion {
                    'x' => (format!("{:x}", n), "0x"),
                    'X' => (format!("{:X}", n), "0X"),
                    _ => (format!("{:o}", n), "0"),
                };
                if let Some(precision) = spec.precision {
                    digits = format!("{:0>width$}", digits, width = precision);
                }
                let prefix = if spec.alternate && n != 0 { prefix } else { "" };
                spec.pad(format!("{}{}", prefix, digits), spec.precision.is_none())
            }
            'c' => {
                let code = args.check_integer(arg, "format")?;
                spec.pad((code as u8 as char).to_string(), false)
            }
            'e' | 'E' | 'f' | 'F' | 'g' | 'G' => {
                let n = args.check_number(arg, "format")?;
                spec.pad(format_float(n, conversion, &spec), n.is_finite())
            }
            's' => {
                let value = args.check_value(arg, "format")?;
                let mut text = ctx.to_display_string(&value)?;
                if let Some(precision) = spec.precision {
                    text = text.chars().take(precision).collect();
                }
                spec.pad(text, false)
            }
            'q' => quote(&args.check_string(arg, "format")?),
            other => {
                return Err(ScriptError::runtime(format!(
                    "invalid option '%{}' to 'format'",
                    other
                )))
            }
        };
        out.push_str(&piece);
    }

    Ok(DynValue::string(out))
}

fn format_float(n: f64, conversion: char, spec: &FormatSpec) -> String {
    let upper = conversion.is_ascii_uppercase();
    let sign = spec.sign(n.is_sign_negative() && !n.is_nan());
    if !n.is_finite() {
        let text = if n.is_nan() { "nan" } else { "inf" };
        let text = format!("{}{}", sign, text);
        return if upper { text.to_uppercase() } else { text };
    }

    let precision = spec.precision.unwrap_or(6);
    let magnitude = n.abs();
    let body = match conversion.to_ascii_lowercase() {
        'f' => {
            let mut text = format!("{:.*}", precision, magnitude);
            if spec.alternate && precision == 0 {
                text.push('.');
            }
            text
        }
        'e' => exponent_form(magnitude, precision, spec.alternate),
        _ => general_form(magnitude, precision, spec.alternate),
    };
    let body = format!("{}{}", sign, body);
    if upper {
        body.to_uppercase()
    } else {
        body
    }
}

/// `d.ddde+XX`
fn exponent_form(n: f64, precision: usize, alternate: bool) -> String {
    let text = format!("{:.*e}", precision, n);
    let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mut mantissa = mantissa.to_string();
    if alternate && precision == 0 {
        mantissa.push('.');
    }
    format!(
        "{}e{}{:02}",
        mantissa,
        if exponent < 0 { '-' } else { '+' },
        exponent.abs()
    )
}

/// C's `%g`: the shorter of fixed and exponent form, trailing zeros removed.
fn general_form(n: f64, precision: usize, alternate: bool) -> String {
    let precision = precision.max(1);
    let probe = format!("{:.*e}", precision - 1, n);
    let exponent: i32 = probe
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    if exponent >= -4 && exponent < precision as i32 {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        let text = format!("{:.*}", decimals, n);
        if alternate {
            text
        } else {
            trim_fraction(&text).to_string()
        }
    } else {
        let text = exponent_form(n, precision - 1, alternate);
        if alternate {
            return text;
        }
        match text.split_once('e') {
            Some((mantissa, exponent)) => format!("{}e{}", trim_fraction(mantissa), exponent),
            None => text,
        }
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => {
                if chars.peek().is_some_and(|next| next.is_ascii_digit()) {
                    out.push_str("\\000");
                } else {
                    out.push_str("\\0");
                }
            }
            c if c.is_ascii_control() => out.push_str(&format!("\\{}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(precision: Option<usize>) -> FormatSpec {
        FormatSpec {
            precision,
            ..FormatSpec::default()
        }
    }

    #[test]
    fn test_general_form() {
        assert_eq!(format_float(0.1, 'g', &spec(None)), "0.1");
        assert_eq!(format_float(100000.0, 'g', &spec(None)), "100000");
        assert_eq!(format_float(1e20, 'g', &spec(None)), "1e+20");
        assert_eq!(format_float(3.14159265, 'g', &spec(Some(3))), "3.14");
        assert_eq!(format_float(0.0001, 'g', &spec(None)), "0.0001");
        assert_eq!(format_float(-2.5e-7, 'G', &spec(None)), "-2.5E-07");
    }

    #[test]
    fn test_exponent_and_fixed() {
        assert_eq!(format_float(1234.5, 'e', &spec(Some(2))), "1.23e+03");
        assert_eq!(format_float(2.0, 'f', &spec(None)), "2.000000");
        assert_eq!(format_float(f64::INFINITY, 'f', &spec(None)), "inf");
    }

    #[test]
    fn test_padding() {
        let spec = FormatSpec {
            zero: true,
            width: 6,
            ..FormatSpec::default()
        };
        assert_eq!(spec.pad("-42".to_string(), true), "-00042");
        assert_eq!(spec.pad("0xff".to_string(), true), "0x00ff");
        let left = FormatSpec {
            left: true,
            width: 4,
            ..FormatSpec::default()
        };
        assert_eq!(left.pad("ab".to_string(), true), "ab  ");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("a \"b\"\n"), "\"a \\\"b\\\"\\\n\"");
    }
}
