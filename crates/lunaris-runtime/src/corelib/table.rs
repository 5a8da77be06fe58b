//! The `table` table

use lunaris_engine::{CallbackArguments, DynValue, ExecutionContext, ScriptError, ScriptResult, Table};

use super::basic::unpack_range;
use super::register;

pub(super) fn library() -> Table {
    let lib = Table::new();
    register(&lib, "insert", insert);
    register(&lib, "remove", remove);
    register(&lib, "concat", concat);
    register(&lib, "pack", pack);
    register(&lib, "unpack", unpack);
    register(&lib, "sort", sort);
    lib
}

fn insert(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "insert")?;
    let len = table.len() as i64;
    match args.len() {
        2 => table.set_int(len + 1, args.get(1)),
        3 => {
            let pos = args.check_integer(1, "insert")?;
            if pos < 1 || pos > len + 1 {
                return Err(ScriptError::runtime(
                    "bad argument #2 to 'insert' (position out of bounds)",
                ));
            }
            for i in (pos..=len).rev() {
                table.set_int(i + 1, table.get_int(i));
            }
            table.set_int(pos, args.get(2));
        }
        _ => return Err(ScriptError::runtime("wrong number of arguments to 'insert'")),
    }
    Ok(DynValue::void())
}

fn remove(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "remove")?;
    let len = table.len() as i64;
    let pos = args.opt_integer(1, "remove", len)?;
    if pos != len && (pos < 1 || pos > len + 1) {
        return Err(ScriptError::runtime(
            "bad argument #2 to 'remove' (position out of bounds)",
        ));
    }
    let removed = table.get_int(pos);
    for i in pos..len {
        table.set_int(i, table.get_int(i + 1));
    }
    table.set_int(pos.max(len), DynValue::Nil);
    Ok(removed)
}

fn concat(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "concat")?;
    let separator = args.opt_string(1, "concat", "")?;
    let first = args.opt_integer(2, "concat", 1)?;
    let last = args.opt_integer(3, "concat", table.len() as i64)?;

    let mut parts = Vec::new();
    for i in first..=last {
        let item = table.get_int(i);
        let text = item.to_concat_string().ok_or_else(|| {
            ScriptError::runtime(format!(
                "invalid value (at index {}) in table for 'concat'",
                i
            ))
        })?;
        parts.push(text);
    }
    Ok(DynValue::string(parts.join(&separator)))
}

fn pack(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let count = args.len();
    let table = Table::from_values(args.into_vec());
    table.set_str("n", DynValue::Number(count as f64));
    Ok(DynValue::Table(table))
}

fn unpack(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "unpack")?;
    unpack_range(&table, &args, "unpack")
}

/// Stable merge sort; the comparator may call back into the script.
fn sort(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "sort")?;
    let comparator = match args.get(1) {
        DynValue::Nil => None,
        _ => Some(args.check_function(1, "sort")?),
    };
    let len = table.len() as i64;
    let mut items: Vec<DynValue> = (1..=len).map(|i| table.get_int(i)).collect();

    let mut less = |ctx: &mut ExecutionContext<'_>, a: &DynValue, b: &DynValue| -> ScriptResult<bool> {
        match &comparator {
            Some(f) => Ok(ctx.call(f, vec![a.clone(), b.clone()])?.is_truthy()),
            None => ctx.less_than(a, b),
        }
    };
    merge_sort(ctx, &mut items, &mut less)?;

    for (i, item) in items.into_iter().enumerate() {
        table.set_int(i as i64 + 1, item);
    }
    Ok(DynValue::void())
}

fn merge_sort<F>(ctx: &mut ExecutionContext<'_>, items: &mut Vec<DynValue>, less: &mut F) -> ScriptResult<()>
where
    F: FnMut(&mut ExecutionContext<'_>, &DynValue, &DynValue) -> ScriptResult<bool>,
{
    if items.len() <= 1 {
        return Ok(());
    }
    let mut right = items.split_off(items.len() / 2);
    merge_sort(ctx, items, less)?;
    merge_sort(ctx, &mut right, less)?;

    let left = std::mem::take(items);
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        if less(ctx, r, l)? {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    *items = merged;
    Ok(())
}
