//! Lua pattern matching over bytes
//!
//! Supports character classes (`%a %c %d %g %l %p %s %u %w %x` and their
//! upper-case complements), sets, the `* + - ?` quantifiers, anchors,
//! captures including position captures, back references, `%b` and `%f`.

use lunaris_engine::{DynValue, ScriptError, ScriptResult};

use super::lossy;

const MAX_CAPTURES: usize = 32;
const MAX_RECURSION: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
enum CaptureLen {
    Open,
    Position,
    Closed(usize),
}

/// A successful match: byte offsets plus the explicit captures.
#[derive(Debug)]
pub(super) struct Match {
    pub start: usize,
    pub end: usize,
    pub captures: Vec<DynValue>,
}

impl Match {
    /// Captures, or the whole match when the pattern has none.
    pub(super) fn values(&self, src: &[u8]) -> Vec<DynValue> {
        if self.captures.is_empty() {
            vec![lossy(&src[self.start..self.end])]
        } else {
            self.captures.clone()
        }
    }
}

struct Matcher<'a> {
    src: &'a [u8],
    pat: &'a [u8],
    captures: Vec<(usize, CaptureLen)>,
    depth: usize,
}

fn pattern_error(message: &str) -> ScriptError {
    ScriptError::runtime(format!("malformed pattern ({})", message))
}

/// True when `pattern` contains no magic characters.
pub(super) fn is_plain(pattern: &[u8]) -> bool {
    !pattern.iter().any(|b| b"^$*+?.([%-".contains(b))
}

/// First match of `pattern` in `src` at or after byte `init`.
pub(super) fn search(src: &[u8], pattern: &[u8], init: usize) -> ScriptResult<Option<Match>> {
    let (anchored, pat) = match pattern.first() {
        Some(b'^') => (true, &pattern[1..]),
        _ => (false, pattern),
    };
    let mut matcher = Matcher::new(src, pat);
    let mut start = init;
    while start <= src.len() {
        if let Some(found) = matcher.match_at(start)? {
            return Ok(Some(found));
        }
        if anchored {
            break;
        }
        start += 1;
    }
    Ok(None)
}

/// Every non-overlapping match, in order. Empty matches advance one byte.
pub(super) fn search_all(src: &[u8], pattern: &[u8], limit: Option<usize>) -> ScriptResult<Vec<Match>> {
    let (anchored, pat) = match pattern.first() {
        Some(b'^') => (true, &pattern[1..]),
        _ => (false, pattern),
    };
    let mut matcher = Matcher::new(src, pat);
    let mut found = Vec::new();
    let mut pos = 0;
    while pos <= src.len() && limit.map_or(true, |max| found.len() < max) {
        match matcher.match_at(pos)? {
            Some(m) => {
                pos = if m.end > m.start { m.end } else { pos + 1 };
                found.push(m);
            }
            None => pos += 1,
        }
        if anchored {
            break;
        }
    }
    Ok(found)
}

impl<'a> Matcher<'a> {
    fn new(src: &'a [u8], pat: &'a [u8]) -> Self {
        Self {
            src,
            pat,
            captures: Vec::new(),
            depth: 0,
        }
    }

    fn match_at(&mut self, start: usize) -> ScriptResult<Option<Match>> {
        self.captures.clear();
        self.depth = 0;
        match self.do_match(start, 0)? {
            Some(end) => Ok(Some(Match {
                start,
                end,
                captures: self.capture_values()?,
            })),
            None => Ok(None),
        }
    }

    fn capture_values(&self) -> ScriptResult<Vec<DynValue>> {
        self.captures
            .iter()
            .map(|&(pos, len)| match len {
                CaptureLen::Position => Ok(DynValue::Number((pos + 1) as f64)),
                CaptureLen::Closed(n) => Ok(lossy(&self.src[pos..pos + n])),
                CaptureLen::Open => Err(ScriptError::runtime("unfinished capture")),
            })
            .collect()
    }

    fn do_match(&mut self, s: usize, p: usize) -> ScriptResult<Option<usize>> {
        self.depth += 1;
        if self.depth > MAX_RECURSION {
            return Err(ScriptError::runtime("pattern too complex"));
        }
        let result = self.match_here(s, p);
        self.depth -= 1;
        result
    }

    fn match_here(&mut self, mut s: usize, mut p: usize) -> ScriptResult<Option<usize>> {
        let pat = self.pat;
        loop {
            if p == pat.len() {
                return Ok(Some(s));
            }
            let next = pat.get(p + 1).copied();
            match (pat[p], next) {
                (b'(', Some(b')')) => return self.start_capture(s, p + 2, CaptureLen::Position),
                (b'(', _) => return self.start_capture(s, p + 1, CaptureLen::Open),
                (b')', _) => return self.end_capture(s, p + 1),
                (b'$', None) => return Ok((s == self.src.len()).then_some(s)),
                (b'%', Some(b'b')) => match self.match_balance(s, p + 2)? {
                    Some(end) => {
                        s = end;
                        p += 4;
                        continue;
                    }
                    None => return Ok(None),
                },
                (b'%', Some(b'f')) => {
                    p += 2;
                    if pat.get(p) != Some(&b'[') {
                        return Err(ScriptError::runtime("missing '[' after '%f' in pattern"));
                    }
                    let end = self.class_end(p)?;
                    let previous = if s == 0 { 0 } else { self.src[s - 1] };
                    let current = self.src.get(s).copied().unwrap_or(0);
                    if !self.match_set(previous, p, end - 1) && self.match_set(current, p, end - 1) {
                        p = end;
                        continue;
                    }
                    return Ok(None);
                }
                (b'%', Some(d)) if d.is_ascii_digit() => match self.match_back_reference(s, d)? {
                    Some(end) => {
                        s = end;
                        p += 2;
                        continue;
                    }
                    None => return Ok(None),
                },
                _ => {}
            }

            let ep = self.class_end(p)?;
            let here = s < self.src.len() && self.single_match(self.src[s], p, ep);
            match pat.get(ep) {
                Some(b'?') => {
                    if here {
                        if let Some(end) = self.do_match(s + 1, ep + 1)? {
                            return Ok(Some(end));
                        }
                    }
                    p = ep + 1;
                }
                Some(b'+') => {
                    return if here { self.max_expand(s + 1, p, ep) } else { Ok(None) };
                }
                Some(b'*') => return self.max_expand(s, p, ep),
                Some(b'-') => return self.min_expand(s, p, ep),
                _ => {
                    if !here {
                        return Ok(None);
                    }
                    s += 1;
                    p = ep;
                }
            }
        }
    }

    /// Index just past the single-character class starting at `p`.
    fn class_end(&self, p: usize) -> ScriptResult<usize> {
        let pat = self.pat;
        let mut p = p;
        let c = pat[p];
        p += 1;
        match c {
            b'%' => {
                if p >= pat.len() {
                    return Err(pattern_error("ends with '%'"));
                }
                Ok(p + 1)
            }
            b'[' => {
                if pat.get(p) == Some(&b'^') {
                    p += 1;
                }
                loop {
                    if p >= pat.len() {
                        return Err(pattern_error("missing ']'"));
                    }
                    let cc = pat[p];
                    p += 1;
                    if cc == b'%' {
                        p += 1;
                    }
                    if p >= pat.len() {
                        return Err(pattern_error("missing ']'"));
                    }
                    if pat[p] == b']' {
                        return Ok(p + 1);
                    }
                }
            }
            _ => Ok(p),
        }
    }

    fn single_match(&self, c: u8, p: usize, ep: usize) -> bool {
        match self.pat[p] {
            b'.' => true,
            b'%' => match_class(c, self.pat[p + 1]),
            b'[' => self.match_set(c, p, ep - 1),
            literal => literal == c,
        }
    }

    /// `pat[p]` is `[` and `pat[close]` its `]`.
    fn match_set(&self, c: u8, p: usize, close: usize) -> bool {
        let pat = self.pat;
        let mut p = p + 1;
        let negate = pat.get(p) == Some(&b'^');
        if negate {
            p += 1;
        }
        while p < close {
            if pat[p] == b'%' && p + 1 < close {
                if match_class(c, pat[p + 1]) {
                    return !negate;
                }
                p += 2;
            } else if p + 2 < close && pat[p + 1] == b'-' {
                if pat[p] <= c && c <= pat[p + 2] {
                    return !negate;
                }
                p += 3;
            } else {
                if pat[p] == c {
                    return !negate;
                }
                p += 1;
            }
        }
        negate
    }

    fn max_expand(&mut self, s: usize, p: usize, ep: usize) -> ScriptResult<Option<usize>> {
        let mut count = 0;
        while s + count < self.src.len() && self.single_match(self.src[s + count], p, ep) {
            count += 1;
        }
        loop {
            if let Some(end) = self.do_match(s + count, ep + 1)? {
                return Ok(Some(end));
            }
            if count == 0 {
                return Ok(None);
            }
            count -= 1;
        }
    }

    fn min_expand(&mut self, mut s: usize, p: usize, ep: usize) -> ScriptResult<Option<usize>> {
        loop {
            if let Some(end) = self.do_match(s, ep + 1)? {
                return Ok(Some(end));
            }
            if s < self.src.len() && self.single_match(self.src[s], p, ep) {
                s += 1;
            } else {
                return Ok(None);
            }
        }
    }

    fn start_capture(&mut self, s: usize, p: usize, len: CaptureLen) -> ScriptResult<Option<usize>> {
        if self.captures.len() >= MAX_CAPTURES {
            return Err(ScriptError::runtime("too many captures"));
        }
        self.captures.push((s, len));
        let result = self.do_match(s, p)?;
        if result.is_none() {
            self.captures.pop();
        }
        Ok(result)
    }

    fn end_capture(&mut self, s: usize, p: usize) -> ScriptResult<Option<usize>> {
        let open = self
            .captures
            .iter()
            .rposition(|&(_, len)| len == CaptureLen::Open)
            .ok_or_else(|| ScriptError::runtime("invalid pattern capture"))?;
        let start = self.captures[open].0;
        self.captures[open].1 = CaptureLen::Closed(s - start);
        let result = self.do_match(s, p)?;
        if result.is_none() {
            self.captures[open].1 = CaptureLen::Open;
        }
        Ok(result)
    }

    fn match_balance(&self, s: usize, p: usize) -> ScriptResult<Option<usize>> {
        let (Some(&open), Some(&close)) = (self.pat.get(p), self.pat.get(p + 1)) else {
            return Err(pattern_error("missing arguments to '%b'"));
        };
        if self.src.get(s) != Some(&open) {
            return Ok(None);
        }
        let mut depth = 1;
        for (i, &c) in self.src.iter().enumerate().skip(s + 1) {
            if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(i + 1));
                }
            } else if c == open {
                depth += 1;
            }
        }
        Ok(None)
    }

    fn match_back_reference(&self, s: usize, digit: u8) -> ScriptResult<Option<usize>> {
        let index = (digit - b'0') as usize;
        let captured = index
            .checked_sub(1)
            .and_then(|i| self.captures.get(i))
            .and_then(|&(start, len)| match len {
                CaptureLen::Closed(n) => Some(&self.src[start..start + n]),
                _ => None,
            })
            .ok_or_else(|| ScriptError::runtime(format!("invalid capture index %{}", index)))?;
        Ok(self.src[s..].starts_with(captured).then(|| s + captured.len()))
    }
}

fn match_class(c: u8, class: u8) -> bool {
    let matched = match class.to_ascii_lowercase() {
        b'a' => c.is_ascii_alphabetic(),
        b'c' => c.is_ascii_control(),
        b'd' => c.is_ascii_digit(),
        b'g' => c.is_ascii_graphic(),
        b'l' => c.is_ascii_lowercase(),
        b'p' => c.is_ascii_punctuation(),
        b's' => c.is_ascii_whitespace() || c == 0x0b,
        b'u' => c.is_ascii_uppercase(),
        b'w' => c.is_ascii_alphanumeric(),
        b'x' => c.is_ascii_hexdigit(),
        _ => return class == c,
    };
    if class.is_ascii_uppercase() {
        !matched
    } else {
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(src: &str, pattern: &str) -> Option<(usize, usize)> {
        search(src.as_bytes(), pattern.as_bytes(), 0)
            .unwrap()
            .map(|m| (m.start, m.end))
    }

    fn captures(src: &str, pattern: &str) -> Vec<DynValue> {
        search(src.as_bytes(), pattern.as_bytes(), 0).unwrap().unwrap().captures
    }

    #[test]
    fn test_classes_and_quantifiers() {
        assert_eq!(first("hello 42 world", "%d+"), Some((6, 8)));
        assert_eq!(first("aaa", "a-"), Some((0, 0)));
        assert_eq!(first("aaab", "a*b"), Some((0, 4)));
        assert_eq!(first("color colour", "colou?r"), Some((0, 5)));
        assert_eq!(first("abc", "^b"), None);
        assert_eq!(first("abc", "c$"), Some((2, 3)));
        assert_eq!(first("x = [1]", "[%[%]]"), Some((4, 5)));
        assert_eq!(first("ABc", "[^A-Z]"), Some((2, 3)));
    }

    #[test]
    fn test_captures() {
        assert_eq!(
            captures("key=value", "(%w+)=(%w+)"),
            vec![DynValue::from("key"), DynValue::from("value")]
        );
        assert_eq!(captures("abc", "()b()"), vec![DynValue::Number(2.0), DynValue::Number(3.0)]);
        assert_eq!(captures("say 'hi' now", "(['\"])(.-)%1"), vec![DynValue::from("'"), DynValue::from("hi")]);
    }

    #[test]
    fn test_balance_and_frontier() {
        assert_eq!(first("f(a(b)c) d", "%b()"), Some((1, 8)));
        assert_eq!(first("THE (quick) fox", "%f[%a]%a+"), Some((0, 3)));
    }

    #[test]
    fn test_malformed_patterns() {
        assert!(search(b"abc", b"[a", 0).is_err());
        assert!(search(b"abc", b"%", 0).is_err());
        assert!(search(b"abc", b"(a", 0).is_err());
    }

    #[test]
    fn test_search_all_skips_empty_matches() {
        let found = search_all(b"a1b22", b"%d*", None).unwrap();
        let spans: Vec<(usize, usize)> = found.iter().map(|m| (m.start, m.end)).collect();
        assert_eq!(spans, vec![(0, 0), (1, 2), (2, 2), (3, 5), (5, 5)]);
    }
}
