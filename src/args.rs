//! Argument classification.
//!
//! A directive's parameter list decides everything downstream: which
//! arguments become compile-time dispatch parameters, which are passed by
//! value at run time, and which cross the generated boundary by address.
//! The classifier consumes the raw parenthesized list from the cursor and
//! produces ordered [`ArgumentDescriptor`]s; the kernel form echoes a
//! transformed copy as it goes (pointer and reference names gain a `_`
//! prefix so the generated wrapper can re-alias them), the template form
//! accumulates each argument's text for later re-emission.

use std::collections::HashSet;
use std::io::{BufRead, Write};

use once_cell::sync::Lazy;

use crate::context::ParseContext;
use crate::cursor::is_id_start;
use crate::error::Result;

/// Builtin scalar type vocabulary. Domain containers (`Vector`,
/// `Array<T>`) are recognized separately.
static BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "char", "int", "short", "unsigned", "long", "bool", "float", "double", "size_t",
    ]
    .into_iter()
    .collect()
});

/// One classified parameter. Identity is the name alone: a parameter list
/// never declares the same name twice.
#[derive(Debug, Clone, Default)]
pub struct ArgumentDescriptor {
    pub name: String,
    pub ty: String,
    pub is_ptr: bool,
    pub is_amp: bool,
    pub is_const: bool,
    pub is_restrict: bool,
    pub default: Option<i64>,
    /// Discrete dispatch points, only under the generic-instantiation
    /// directive's range qualifier.
    pub range: Vec<i64>,
}

impl PartialEq for ArgumentDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl ArgumentDescriptor {
    /// Passed by address: pointer or reference qualified.
    pub fn is_pointer_like(&self) -> bool {
        self.is_ptr || self.is_amp
    }

    /// Constant, non-pointer: value selects the compiled variant.
    pub fn is_dispatch(&self) -> bool {
        self.is_const && !self.is_pointer_like()
    }

    /// Non-const, non-pointer: passed by value at the call site.
    pub fn is_runtime(&self) -> bool {
        !self.is_const && !self.is_pointer_like()
    }

    pub fn is_floating(&self) -> bool {
        matches!(self.ty.as_str(), "double" | "float")
    }
}

/// A template-directive parameter: descriptor plus its declaration text
/// (with the range qualifier stripped), kept for re-emission in the
/// generated wrapper and specialization signatures.
#[derive(Debug, Clone)]
pub struct TemplateArg {
    pub desc: ArgumentDescriptor,
    pub text: String,
}

fn check_unique<R: BufRead, W: Write>(
    ctx: &ParseContext<R, W>,
    args: &[ArgumentDescriptor],
) -> Result<()> {
    for (i, a) in args.iter().enumerate() {
        if args[i + 1..].contains(a) {
            return Err(ctx.err(format!("duplicate argument name '{}'", a.name)).into());
        }
    }
    Ok(())
}

/// Parse a kernel directive's argument list. The caller has consumed and
/// echoed the opening parenthesis; the matching close is left unconsumed.
/// Every token is echoed, transformed where the wrapper needs it.
pub fn parse_kernel_list<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
) -> Result<Vec<ArgumentDescriptor>> {
    let mut args: Vec<ArgumentDescriptor> = Vec::new();
    let mut arg = ArgumentDescriptor::default();
    let mut depth = 0i32;

    ctx.skip_space()?;
    if ctx.peek()? == Some(b')') {
        return Ok(args);
    }
    if ctx.peek_word("void")? {
        ctx.read_id()?;
        ctx.skip_space()?;
        return Ok(args);
    }

    loop {
        ctx.next_token()?;
        match ctx.peek()? {
            None => return Err(ctx.err("premature end of input in argument list").into()),
            Some(b'*') => {
                arg.is_ptr = true;
                ctx.put()?;
            }
            Some(b'&') => {
                arg.is_amp = true;
                ctx.put()?;
            }
            Some(b'(') => {
                depth += 1;
                ctx.put()?;
            }
            Some(b')') => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                ctx.put()?;
            }
            Some(b',') => {
                ctx.put()?;
            }
            Some(c) if is_id_start(c) => {
                let id = ctx.read_id()?;
                match id.as_str() {
                    "const" => {
                        ctx.echo(&id)?;
                        arg.is_const = true;
                    }
                    "__restrict" => {
                        ctx.echo(&id)?;
                        arg.is_restrict = true;
                    }
                    "Array" => {
                        ctx.echo(&id)?;
                        arg.ty = id.clone();
                        let elem = parse_bracketed_elem(ctx)?;
                        arg.ty.push_str(&elem);
                    }
                    "Vector" => {
                        ctx.echo(&id)?;
                        arg.ty = id.clone();
                    }
                    t if BUILTIN_TYPES.contains(t) => {
                        ctx.echo(&id)?;
                        arg.ty = id.clone();
                    }
                    _ => {
                        if !arg.name.is_empty() {
                            return Err(ctx
                                .err(format!("unknown type or qualifier '{}'", id))
                                .into());
                        }
                        if arg.ty.is_empty() {
                            return Err(ctx
                                .err(format!("argument '{}' has no recognized type", id))
                                .into());
                        }
                        // the wrapper renames address-crossing parameters
                        if arg.is_pointer_like() {
                            ctx.echo("_")?;
                        }
                        ctx.echo(&id)?;
                        arg.name = id.clone();
                        ctx.next_token()?;
                        if ctx.peek()? == Some(b'=') {
                            ctx.put()?;
                            ctx.next_token()?;
                            let v = ctx.read_int()?;
                            ctx.echo(&v.to_string())?;
                            arg.default = Some(v);
                        }
                        args.push(std::mem::take(&mut arg));
                        ctx.next_token()?;
                        match ctx.peek()? {
                            Some(b',') => {
                                ctx.put()?;
                            }
                            Some(b')') if depth == 0 => break,
                            Some(b')') => {
                                depth -= 1;
                                ctx.put()?;
                            }
                            Some(c) if is_id_start(c) => {
                                let bad = ctx.read_id()?;
                                return Err(ctx
                                    .err(format!("unknown type or qualifier '{}'", bad))
                                    .into());
                            }
                            _ => {
                                return Err(ctx
                                    .err("expected ',' or ')' in argument list")
                                    .into())
                            }
                        }
                    }
                }
            }
            Some(c) => {
                return Err(ctx
                    .err(format!(
                        "unexpected character '{}' in argument list",
                        c as char
                    ))
                    .into())
            }
        }
    }
    check_unique(ctx, &args)?;
    Ok(args)
}

/// `Array<T>` element clause: `<`, element type, `>`, all echoed.
fn parse_bracketed_elem<R: BufRead, W: Write>(ctx: &mut ParseContext<R, W>) -> Result<String> {
    let mut ty = String::new();
    ctx.skip_space()?;
    ctx.expect_put(b'<', "missing '<' after container type")?;
    ty.push('<');
    ctx.skip_space()?;
    let elem = ctx.read_id()?;
    ctx.echo(&elem)?;
    ty.push_str(&elem);
    ctx.skip_space()?;
    ctx.expect_put(b'>', "missing '>' after container element type")?;
    ty.push('>');
    Ok(ty)
}

/// Parse a template directive's argument list. Nothing is echoed; each
/// argument's text is accumulated for the generated wrapper, and
/// `MFEM_RANGE(...)` qualifiers are consumed into the descriptor's range.
/// The caller has consumed the opening parenthesis; the close is left
/// unconsumed.
pub fn parse_template_list<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
) -> Result<Vec<TemplateArg>> {
    let mut args: Vec<TemplateArg> = Vec::new();
    let mut arg = ArgumentDescriptor::default();
    let mut text = String::new();
    let mut depth = 0i32;

    ctx.drop_space()?;
    if ctx.peek()? == Some(b')') || ctx.peek_word("void")? {
        return Err(ctx
            .err("template directive requires a non-empty argument list")
            .into());
    }

    loop {
        ctx.skip_space_into(&mut text)?;
        if ctx.at_comment()? {
            ctx.copy_comment()?;
            continue;
        }
        match ctx.peek()? {
            None => return Err(ctx.err("premature end of input in argument list").into()),
            Some(b'*') => {
                arg.is_ptr = true;
                text.push('*');
                ctx.bump()?;
            }
            Some(b'&') => {
                arg.is_amp = true;
                text.push('&');
                ctx.bump()?;
            }
            Some(b'(') => {
                depth += 1;
                text.push('(');
                ctx.bump()?;
            }
            Some(b')') => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                text.push(')');
                ctx.bump()?;
            }
            Some(b',') => {
                ctx.bump()?;
            }
            Some(c) if is_id_start(c) => {
                let id = ctx.read_id()?;
                match id.as_str() {
                    "MFEM_RANGE" => {
                        arg.range = parse_range(ctx)?;
                    }
                    "const" => {
                        text.push_str(&id);
                        arg.is_const = true;
                    }
                    "__restrict" => {
                        text.push_str(&id);
                        arg.is_restrict = true;
                    }
                    "Array" => {
                        text.push_str(&id);
                        arg.ty = id.clone();
                        let elem = parse_bracketed_elem_into(ctx, &mut text)?;
                        arg.ty.push_str(&elem);
                    }
                    "Vector" => {
                        text.push_str(&id);
                        arg.ty = id.clone();
                    }
                    t if BUILTIN_TYPES.contains(t) => {
                        text.push_str(&id);
                        arg.ty = id.clone();
                    }
                    _ => {
                        if !arg.name.is_empty() {
                            return Err(ctx
                                .err(format!("unknown type or qualifier '{}'", id))
                                .into());
                        }
                        if arg.ty.is_empty() {
                            return Err(ctx
                                .err(format!("argument '{}' has no recognized type", id))
                                .into());
                        }
                        text.push_str(&id);
                        arg.name = id.clone();
                        args.push(TemplateArg {
                            desc: std::mem::take(&mut arg),
                            text: std::mem::take(&mut text).trim().to_string(),
                        });
                        ctx.drop_space()?;
                        match ctx.peek()? {
                            Some(b',') => {
                                ctx.bump()?;
                            }
                            Some(b')') if depth == 0 => break,
                            Some(b')') => {
                                depth -= 1;
                                ctx.bump()?;
                            }
                            _ => {
                                return Err(ctx
                                    .err("expected ',' or ')' in argument list")
                                    .into())
                            }
                        }
                    }
                }
            }
            Some(c) => {
                return Err(ctx
                    .err(format!(
                        "unexpected character '{}' in argument list",
                        c as char
                    ))
                    .into())
            }
        }
    }
    let descs: Vec<ArgumentDescriptor> = args.iter().map(|a| a.desc.clone()).collect();
    check_unique(ctx, &descs)?;
    Ok(args)
}

/// Non-echoing variant of the container element clause, accumulated into
/// the argument's text.
fn parse_bracketed_elem_into<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    text: &mut String,
) -> Result<String> {
    let mut ty = String::new();
    ctx.drop_space()?;
    ctx.expect_drop(b'<', "missing '<' after container type")?;
    ty.push('<');
    ctx.drop_space()?;
    let elem = ctx.read_id()?;
    ty.push_str(&elem);
    ctx.drop_space()?;
    ctx.expect_drop(b'>', "missing '>' after container element type")?;
    ty.push('>');
    text.push_str(&ty);
    Ok(ty)
}

/// Parse a `MFEM_RANGE(...)` list: single integers and `a-b` spans, each
/// span expanding to every integer from a to b inclusive. Consumed, never
/// echoed.
pub fn parse_range<R: BufRead, W: Write>(ctx: &mut ParseContext<R, W>) -> Result<Vec<i64>> {
    ctx.drop_space()?;
    ctx.expect_drop(b'(', "range qualifier must declare a parenthesized list")?;
    let mut vals: Vec<i64> = Vec::new();
    let mut dash = false;
    loop {
        ctx.drop_space()?;
        let n = ctx.read_int()?;
        if dash {
            let prev = *vals.last().unwrap();
            if n <= prev {
                return Err(ctx.err("descending or empty range span").into());
            }
            vals.extend(prev + 1..=n);
            dash = false;
        } else {
            vals.push(n);
        }
        ctx.drop_space()?;
        match ctx.bump()? {
            Some(b',') => {}
            Some(b'-') => dash = true,
            Some(b')') => break,
            _ => return Err(ctx.err("malformed range list").into()),
        }
    }
    Ok(vals)
}
