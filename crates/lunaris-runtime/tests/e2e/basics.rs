//! Language basics and the global functions

use super::harness::*;

// ============================================================================
// Expressions and control flow
// ============================================================================

#[test]
fn test_arithmetic_precedence() {
    expect_number("return 2 + 3 * 4 ^ 2 / 8", 8.0);
    expect_number("return -2 ^ 2", -4.0);
    expect_number("return 7 % 3", 1.0);
    expect_number("return -7 % 3", 2.0);
}

#[test]
fn test_string_coercion_in_arithmetic() {
    expect_number("return '10' + 5", 15.0);
    expect_number("return '0x10' * 2", 32.0);
    expect_string("return 1 .. 2", "12");
}

#[test]
fn test_numeric_for_and_while() {
    expect_number(
        "local sum = 0
         for i = 1, 10 do sum = sum + i end
         local n = 0
         while n < 5 do n = n + 1 end
         return sum + n",
        60.0,
    );
}

#[test]
fn test_numeric_for_with_negative_step() {
    expect_string(
        "local parts = {}
         for i = 5, 1, -2 do parts[#parts + 1] = tostring(i) end
         return table.concat(parts, ',')",
        "5,3,1",
    );
}

#[test]
fn test_repeat_sees_body_locals() {
    expect_number(
        "local i = 0
         repeat local done = i >= 3; i = i + 1 until done
         return i",
        4.0,
    );
}

#[test]
fn test_closures_capture_per_iteration() {
    expect_number(
        "local fns = {}
         for i = 1, 3 do fns[i] = function() return i end end
         return fns[1]() + fns[2]() * 10 + fns[3]() * 100",
        321.0,
    );
}

#[test]
fn test_varargs_and_multiple_results() {
    expect_values(
        "local function f(...) return select('#', ...), ... end
         return f(1, nil, 3)",
        &["3", "1", "nil", "3"],
    );
    expect_values("return select(-1, 'a', 'b', 'c')", &["c"]);
}

#[test]
fn test_goto_continue_pattern() {
    expect_number(
        "local odd = 0
         for i = 1, 10 do
             if i % 2 == 0 then goto continue end
             odd = odd + i
             ::continue::
         end
         return odd",
        25.0,
    );
}

// ============================================================================
// Conversion and inspection
// ============================================================================

#[test]
fn test_type_names() {
    expect_values(
        "return type(nil), type(true), type(1), type('s'), type({}), type(print), type(coroutine.create(print))",
        &["nil", "boolean", "number", "string", "table", "function", "thread"],
    );
}

#[test]
fn test_tostring_numbers() {
    expect_string("return tostring(10 / 2)", "5");
    expect_string("return tostring(1 / 3)", "0.33333333333333");
    expect_string("return tostring(1 / 0)", "inf");
    expect_string("return tostring(0 * -1)", "-0");
}

#[test]
fn test_tonumber() {
    expect_number("return tonumber('  42  ')", 42.0);
    expect_number("return tonumber('ff', 16)", 255.0);
    expect_number("return tonumber('z', 36)", 35.0);
    expect_nil("return tonumber('12abc')");
    expect_nil("return tonumber({})");
    expect_runtime_error("return tonumber('1', 99)", "base out of range");
}

#[test]
fn test_print_uses_tostring_metamethod() {
    expect_output(
        "local p = setmetatable({}, { __tostring = function() return 'point' end })
         print(1, 'two', nil, p)
         print()",
        &["1\ttwo\tnil\tpoint", ""],
    );
}

// ============================================================================
// Metatables and raw access
// ============================================================================

#[test]
fn test_index_and_newindex_metamethods() {
    expect_number(
        "local log = {}
         local t = setmetatable({}, {
             __index = function(_, k) return k * 2 end,
             __newindex = function(t, k, v) rawset(t, k, v + 1) end,
         })
         t[1] = 10
         return t[1] + t[5]",
        21.0,
    );
}

#[test]
fn test_protected_metatable() {
    expect_string(
        "local t = setmetatable({}, { __metatable = 'locked' })
         return getmetatable(t)",
        "locked",
    );
    expect_runtime_error(
        "local t = setmetatable({}, { __metatable = false })
         setmetatable(t, {})",
        "cannot change a protected metatable",
    );
}

#[test]
fn test_raw_functions_bypass_metamethods() {
    expect_values(
        "local t = setmetatable({}, { __index = function() return 'meta' end, __len = function() return 99 end })
         return rawget(t, 'x'), #t, rawlen(t), rawequal(t, t)",
        &["nil", "99", "0", "true"],
    );
}

#[test]
fn test_string_methods_through_type_metatable() {
    expect_string("local s = 'hello' return s:upper()", "HELLO");
    expect_number("return ('abc'):len()", 3.0);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_error_messages_carry_location() {
    expect_values(
        "return pcall(function() error('boom') end)",
        &["false", "chunk_1:1: boom"],
    );
    expect_values("return pcall(error, 'plain', 0)", &["false", "plain"]);
}

#[test]
fn test_error_with_table_value() {
    expect_string(
        "local ok, e = pcall(error, { code = 'E42' })
         return e.code",
        "E42",
    );
}

#[test]
fn test_xpcall_runs_handler() {
    expect_values(
        "return xpcall(function() error({}) end, function(e) return type(e) .. '!' end)",
        &["false", "table!"],
    );
    expect_values("return xpcall(function(a, b) return a + b end, print, 2, 3)", &["true", "5"]);
}

#[test]
fn test_assert() {
    expect_values("return assert(1, 'unused')", &["1", "unused"]);
    expect_runtime_error("assert(false)", "assertion failed!");
    expect_runtime_error("assert(nil, 'custom message')", "custom message");
}

#[test]
fn test_runtime_errors() {
    expect_runtime_error("local t = nil; return t.x", "attempt to index");
    expect_runtime_error("return {} + 1", "attempt to perform arithmetic");
    expect_runtime_error("undefined_function()", "attempt to call");
    expect_runtime_error("return {} < {}", "attempt to compare");
}

#[test]
fn test_stack_overflow_is_reported() {
    expect_runtime_error("local function f() return 1 + f() end return f()", "stack overflow");
}

#[test]
fn test_syntax_errors() {
    expect_syntax_error("return 1 +", "chunk_1:1");
    expect_syntax_error("for i = 1, 10, 0 do end", "'for' step is zero");
    expect_syntax_error("goto nowhere", "nowhere");
}

// ============================================================================
// Loading code
// ============================================================================

#[test]
fn test_load_string_and_environment() {
    expect_number("local f = load('return 1 + 2') return f()", 3.0);
    expect_number(
        "local env = { x = 5 }
         local f = load('return x * 2', 'chunk', 't', env)
         return f()",
        10.0,
    );
}

#[test]
fn test_load_reports_syntax_errors() {
    expect_values(
        "local f, err = load('return +', 'broken') return f, err ~= nil",
        &["nil", "true"],
    );
}

#[test]
fn test_load_from_piece_function() {
    expect_number(
        "local pieces = { 'return ', '4', '0 + 2' }
         local i = 0
         local f = load(function() i = i + 1 return pieces[i] end)
         return f()",
        42.0,
    );
}
