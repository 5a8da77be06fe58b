//! The string library and Lua patterns

use super::harness::*;

// ============================================================================
// Basic functions
// ============================================================================

#[test]
fn test_sub_with_negative_indices() {
    expect_string("return string.sub('hello world', 7)", "world");
    expect_string("return ('hello'):sub(-3, -2)", "ll");
    expect_string("return ('hello'):sub(4, 2)", "");
    expect_string("return ('hello'):sub(0)", "hello");
}

#[test]
fn test_rep_and_reverse() {
    expect_string("return string.rep('ab', 3, '-')", "ab-ab-ab");
    expect_string("return string.rep('x', 0)", "");
    expect_string("return string.reverse('abc')", "cba");
    expect_runtime_error("return string.rep('x', 1e12)", "resulting string too large");
}

#[test]
fn test_byte_and_char() {
    expect_values("return string.byte('ABC', 1, -1)", &["65", "66", "67"]);
    expect_string("return string.char(72, 105)", "Hi");
    expect_runtime_error("return string.char(256)", "value out of range");
}

#[test]
fn test_length_operator_counts_bytes() {
    expect_number("return #'héllo'", 6.0);
}

// ============================================================================
// Patterns
// ============================================================================

#[test]
fn test_find_plain_and_pattern() {
    expect_values("return string.find('a.b.c', '.', 1, true)", &["2", "2"]);
    expect_values("return string.find('hello 123', '%d+')", &["7", "9"]);
    expect_values("return string.find('key=value', '(%w+)=(%w+)')", &["1", "9", "key", "value"]);
    expect_nil("return string.find('abc', 'x')");
}

#[test]
fn test_match_captures() {
    expect_values(
        "return string.match('2024-03-15', '(%d+)-(%d+)-(%d+)')",
        &["2024", "03", "15"],
    );
    expect_string("return string.match('  trimmed  ', '^%s*(.-)%s*$')", "trimmed");
    expect_number("return string.match('hello', '()ll')", 3.0);
}

#[test]
fn test_balanced_and_frontier_patterns() {
    expect_string("return string.match('f(a(b)c) rest', '%b()')", "(a(b)c)");
    expect_values(
        "local words = {}
         for w in string.gmatch('THE (quick) fox', '%f[%a]%a+') do words[#words + 1] = w end
         return table.concat(words, ' ')",
        &["THE quick fox"],
    );
}

#[test]
fn test_gmatch_pairs() {
    expect_string(
        "local out = {}
         for k, v in string.gmatch('a=1, b=2, c=3', '(%w+)=(%w+)') do
             out[#out + 1] = v .. k
         end
         return table.concat(out, ';')",
        "1a;2b;3c",
    );
}

#[test]
fn test_gsub_replacements() {
    expect_values("return string.gsub('hello world', 'o', '0')", &["hell0 w0rld", "2"]);
    expect_values("return string.gsub('hello world', '(%w+)', '<%1>')", &["<hello> <world>", "2"]);
    expect_values("return string.gsub('abc', '%w', '%0%0', 2)", &["aabbc", "2"]);
    expect_values(
        "return string.gsub('$name is $age', '%$(%w+)', { name = 'Bob', age = 42 })",
        &["Bob is 42", "2"],
    );
    expect_values(
        "return string.gsub('1 2 3', '%d', function(d) if d ~= '2' then return d * 10 end end)",
        &["10 2 30", "3"],
    );
}

#[test]
fn test_gsub_empty_matches() {
    expect_values("return string.gsub('abc', '', '-')", &["-a-b-c-", "4"]);
}

#[test]
fn test_malformed_patterns() {
    expect_runtime_error("return string.find('abc', '[a')", "malformed pattern");
    expect_runtime_error("return string.find('abc', '(a')", "unfinished capture");
    expect_runtime_error("return string.gsub('abc', 'a', '%2')", "invalid capture index");
}

// ============================================================================
// string.format
// ============================================================================

#[test]
fn test_format_numbers() {
    expect_string("return string.format('%5.2f', 3.14159)", " 3.14");
    expect_string("return string.format('%05d', -42)", "-0042");
    expect_string("return string.format('%x %X %o', 255, 255, 8)", "ff FF 10");
    expect_string("return string.format('%+d %e', 7, 12345.678)", "+7 1.234568e+04");
    expect_string("return string.format('%g %g', 0.5, 1e20)", "0.5 1e+20");
}

#[test]
fn test_format_strings() {
    expect_string("return string.format('[%-5s][%5s]', 'ab', 'cd')", "[ab   ][   cd]");
    expect_string("return string.format('%.2s', 'abcdef')", "ab");
    expect_string("return string.format('%q', 'say \"hi\"')", "\"say \\\"hi\\\"\"");
    expect_string("return string.format('100%%')", "100%");
    expect_string("return string.format('%s %s', 1, true)", "1 true");
}

#[test]
fn test_format_errors() {
    expect_runtime_error("return string.format('%d', 'x')", "bad argument #2 to 'format'");
    expect_runtime_error("return string.format('%d')", "bad argument #2 to 'format'");
}
