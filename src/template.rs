//! Template directive: ahead-of-time explicit instantiation.
//!
//! `MFEM_TEMPLATE [static] void Name(args) { body }`, with one or more
//! `MFEM_RANGE(...)`-qualified arguments, enumerates a bounded dispatch
//! space: one explicit specialization per point of the Cartesian product
//! of the declared ranges, plus a wrapper that hashes the actual argument
//! values and dispatches through a static lookup table. Table keys are
//! computed here with the same fold the emitted C++ performs at run time.

use std::io::{BufRead, Write};

use crate::args;
use crate::context::ParseContext;
use crate::error::Result;
use crate::hash;

/// Accumulated state of one open template directive.
#[derive(Debug, Default)]
pub struct TemplateState {
    pub name: String,
    /// Brace nesting inside the body; closes when a `}` would go below 0.
    pub depth: i32,
    statik: bool,
    /// Full original parameter texts, for the wrapper signature.
    params: Vec<String>,
    /// Non-range parameter texts, for the specialization signature.
    signature: Vec<String>,
    /// Compile-time parameter declarations.
    tparams: Vec<String>,
    /// Range-argument names, hashed at dispatch time.
    targs: Vec<String>,
    /// Non-range argument names, forwarded to the specialization.
    call_args: Vec<String>,
    /// Declared dispatch points per range argument, declaration order.
    ranges: Vec<Vec<i64>>,
}

/// Parse the directive head after the `MFEM_TEMPLATE` keyword, emit the
/// generic declaration, and leave the body open at depth 0.
pub fn open<R: BufRead, W: Write>(ctx: &mut ParseContext<R, W>) -> Result<TemplateState> {
    ctx.emit_preamble()?;
    ctx.drop_space()?;
    while ctx.at_comment()? {
        ctx.copy_comment()?;
        ctx.drop_space()?;
    }
    if !(ctx.peek_word("void")? || ctx.peek_word("static")?) {
        return Err(ctx
            .err("template directive must declare void or static")
            .into());
    }
    let mut tp = TemplateState::default();
    if ctx.peek_word("static")? {
        ctx.read_id()?;
        tp.statik = true;
        ctx.drop_space()?;
    }
    let ret = ctx.read_id()?;
    if ret != "void" {
        return Err(ctx.err("template directive must return void").into());
    }
    ctx.drop_space()?;
    tp.name = ctx.read_id()?;
    ctx.drop_space()?;
    ctx.expect_drop(b'(', "missing '(' in template directive")?;
    let list = args::parse_template_list(ctx)?;
    ctx.expect_drop(b')', "missing ')' in template directive")?;

    for a in &list {
        tp.params.push(a.text.clone());
        if a.desc.range.is_empty() {
            tp.signature.push(a.text.clone());
            tp.call_args.push(a.desc.name.clone());
        } else {
            tp.tparams
                .push(format!("const {} {}", a.desc.ty, a.desc.name));
            tp.targs.push(a.desc.name.clone());
            tp.ranges.push(a.desc.range.clone());
        }
    }
    if tp.ranges.is_empty() {
        return Err(ctx
            .err("template directive requires at least one range-qualified argument")
            .into());
    }

    ctx.emit(&format!(
        "template<{}>\n{}void jit_{}({})",
        tp.tparams.join(", "),
        if tp.statik { "static " } else { "" },
        tp.name,
        tp.signature.join(", ")
    ))?;
    ctx.drop_space()?;
    ctx.expect_put(b'{', "missing template body")?;
    tp.depth = 0;
    Ok(tp)
}

/// All combinations formed by choosing one value from each range, in
/// declaration order, the rightmost range iterating fastest.
pub fn outer_product(ranges: &[Vec<i64>]) -> Vec<Vec<i64>> {
    let mut acc: Vec<Vec<i64>> = vec![Vec::new()];
    for range in ranges {
        let mut next = Vec::with_capacity(acc.len() * range.len());
        for prefix in &acc {
            for &v in range {
                let mut combo = prefix.clone();
                combo.push(v);
                next.push(combo);
            }
        }
        acc = next;
    }
    acc
}

/// Emit the specialization table and runtime dispatch wrapper. Runs after
/// the body's closing brace has been echoed.
pub fn emit_table<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    tp: &TemplateState,
) -> Result<()> {
    let combos = outer_product(&tp.ranges);
    let fn_t = format!("jit_{}_t", tp.name);
    let mut s = String::new();
    s.push_str(&format!(
        "\n{}void {}({})\n{{",
        if tp.statik { "static " } else { "" },
        tp.name,
        tp.params.join(", ")
    ));
    s.push_str(&format!(
        "\n\ttypedef void (*{fn_t})({});",
        tp.signature.join(", ")
    ));
    s.push_str(&format!(
        "\n\tconst uint64_t key = jit_hash_args(JIT_HASH_SEED, {});",
        tp.targs.join(", ")
    ));
    s.push_str(&format!(
        "\n\tstatic const std::unordered_map<uint64_t, {fn_t}> table = {{"
    ));
    for combo in &combos {
        let key = hash::of_values(combo.iter().map(|&v| v as u64));
        let vals: Vec<String> = combo.iter().map(i64::to_string).collect();
        s.push_str(&format!(
            "\n\t\t{{0x{key:x}ull, &jit_{}<{}>}},",
            tp.name,
            vals.join(",")
        ));
    }
    s.push_str("\n\t};");
    s.push_str("\n\tconst auto entry = table.find(key);");
    s.push_str("\n\tassert(entry != table.end());");
    s.push_str(&format!("\n\tentry->second({});", tp.call_args.join(", ")));
    s.push_str("\n}");
    ctx.emit(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_product_rightmost_fastest() {
        let combos = outer_product(&[vec![1, 2], vec![3, 5]]);
        assert_eq!(
            combos,
            vec![vec![1, 3], vec![1, 5], vec![2, 3], vec![2, 5]]
        );
    }

    #[test]
    fn test_outer_product_size_is_product_of_sizes() {
        let combos = outer_product(&[vec![1, 2, 3], vec![4, 5], vec![6, 7]]);
        assert_eq!(combos.len(), 3 * 2 * 2);
        // every combination exactly once
        let mut seen = std::collections::HashSet::new();
        for c in &combos {
            assert!(seen.insert(c.clone()));
        }
    }

    #[test]
    fn test_outer_product_single_range() {
        assert_eq!(
            outer_product(&[vec![1, 2, 3, 5]]),
            vec![vec![1], vec![2], vec![3], vec![5]]
        );
    }
}
