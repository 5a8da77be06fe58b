//! The math library

use super::harness::*;

#[test]
fn test_rounding() {
    expect_values(
        "return math.floor(3.7), math.floor(-3.2), math.ceil(3.2), math.ceil(-3.7)",
        &["3", "-4", "4", "-3"],
    );
}

#[test]
fn test_min_max_abs() {
    expect_values("return math.max(3, 9, -1), math.min(3, 9, -1), math.abs(-2.5)", &["9", "-1", "2.5"]);
    expect_runtime_error("return math.max()", "bad argument #1 to 'max'");
}

#[test]
fn test_fmod_keeps_dividend_sign() {
    expect_values("return math.fmod(7, 3), math.fmod(-7, 3)", &["1", "-1"]);
}

#[test]
fn test_logarithms() {
    expect_number("return math.log(8, 2)", 3.0);
    expect_number("return math.log(1000, 10)", 3.0);
    expect_number("return math.log(math.exp(2))", 2.0);
}

#[test]
fn test_constants() {
    expect_bool("return math.huge > 1e308", true);
    expect_bool("return math.abs(math.pi - 3.14159265) < 1e-8", true);
    expect_number("return math.sqrt(16)", 4.0);
}

#[test]
fn test_random_ranges() {
    expect_bool(
        "for _ = 1, 200 do
             local a, b, c = math.random(), math.random(6), math.random(-3, 3)
             if a < 0 or a >= 1 then return false end
             if b < 1 or b > 6 or b % 1 ~= 0 then return false end
             if c < -3 or c > 3 then return false end
         end
         return true",
        true,
    );
}

#[test]
fn test_randomseed_repeats_sequence() {
    expect_bool(
        "math.randomseed(42)
         local first = { math.random(1000), math.random(1000), math.random(1000) }
         math.randomseed(42)
         return first[1] == math.random(1000) and first[2] == math.random(1000) and first[3] == math.random(1000)",
        true,
    );
}

#[test]
fn test_random_argument_errors() {
    expect_runtime_error("return math.random(5, 1)", "interval is empty");
    expect_runtime_error("return math.random(1, 2, 3)", "wrong number of arguments to 'random'");
}
