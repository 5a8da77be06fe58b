//! Table constructors, iteration and the table library

use super::harness::*;

// ============================================================================
// Constructors and length
// ============================================================================

#[test]
fn test_constructor_forms() {
    expect_values(
        "local t = { 'a', 'b', x = 1, ['y'] = 2, [10] = 'ten'; 'c' }
         return #t, t[3], t.x + t.y, t[10]",
        &["3", "c", "3", "ten"],
    );
}

#[test]
fn test_constructor_expands_last_call() {
    expect_number(
        "local function three() return 1, 2, 3 end
         local t = { three(), three() }
         return #t",
        4.0,
    );
}

#[test]
fn test_nan_key_is_rejected() {
    expect_runtime_error("local t = {} t[0/0] = 1", "NaN");
    expect_runtime_error("rawset({}, nil, 1)", "nil");
}

#[test]
fn test_float_keys_normalize_to_integers() {
    expect_string("local t = {} t[1.0] = 'one' return t[1]", "one");
}

// ============================================================================
// Iteration
// ============================================================================

#[test]
fn test_ipairs_stops_at_first_nil() {
    expect_number(
        "local sum = 0
         for i, v in ipairs({ 10, 20, nil, 40 }) do sum = sum + i * v end
         return sum",
        50.0,
    );
}

#[test]
fn test_pairs_visits_every_entry() {
    expect_number(
        "local t = { 1, 2, 3, a = 4, b = 5 }
         local sum, count = 0, 0
         for k, v in pairs(t) do sum = sum + v; count = count + 1 end
         return sum * 10 + count",
        155.0,
    );
}

#[test]
fn test_next_on_empty_table() {
    expect_nil("return next({})");
}

#[test]
fn test_assigning_nil_during_traversal() {
    expect_number(
        "local t = { a = 1, b = 2, c = 3 }
         for k in pairs(t) do t[k] = nil end
         return next(t) == nil and 1 or 0",
        1.0,
    );
}

// ============================================================================
// Library
// ============================================================================

#[test]
fn test_insert_and_remove() {
    expect_string(
        "local t = { 'b', 'd' }
         table.insert(t, 1, 'a')
         table.insert(t, 3, 'c')
         table.insert(t, 'e')
         local last = table.remove(t)
         local first = table.remove(t, 1)
         return first .. last .. table.concat(t)",
        "aebcd",
    );
}

#[test]
fn test_insert_bounds() {
    expect_runtime_error("table.insert({}, 5, 'x')", "position out of bounds");
    expect_runtime_error("table.insert({}, 1, 2, 3)", "wrong number of arguments to 'insert'");
}

#[test]
fn test_remove_from_empty_table() {
    expect_nil("return table.remove({})");
}

#[test]
fn test_concat_ranges_and_errors() {
    expect_string("return table.concat({ 1, 2, 3, 4 }, ', ', 2, 3)", "2, 3");
    expect_string("return table.concat({}, 'x')", "");
    expect_runtime_error("return table.concat({ 1, {}, 3 })", "invalid value (at index 2)");
}

#[test]
fn test_pack_and_unpack() {
    expect_values("local t = table.pack(1, nil, 3) return t.n, t[3]", &["3", "3"]);
    expect_values("return table.unpack({ 'a', 'b', 'c' }, 2)", &["b", "c"]);
    expect_values("return unpack({ 1, 2 }, 1, 3)", &["1", "2", "nil"]);
    expect_runtime_error("return unpack({}, 1, 1e8)", "too many results to unpack");
}

#[test]
fn test_sort_default_order() {
    expect_string(
        "local t = { 5, 2, 8, 1, 9, 3 }
         table.sort(t)
         return table.concat(t, ' ')",
        "1 2 3 5 8 9",
    );
    expect_string(
        "local t = { 'pear', 'apple', 'fig' }
         table.sort(t)
         return table.concat(t, ' ')",
        "apple fig pear",
    );
}

#[test]
fn test_sort_with_comparator_is_stable() {
    expect_string(
        "local people = {
             { name = 'ann', age = 30 }, { name = 'bob', age = 25 },
             { name = 'cid', age = 30 }, { name = 'dan', age = 25 },
         }
         table.sort(people, function(a, b) return a.age < b.age end)
         local names = {}
         for i, p in ipairs(people) do names[i] = p.name end
         return table.concat(names, ',')",
        "bob,dan,ann,cid",
    );
}

#[test]
fn test_sort_mixed_types_fails() {
    expect_runtime_error("table.sort({ 1, 'x', 2 })", "attempt to compare");
}
