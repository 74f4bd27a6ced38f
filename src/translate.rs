//! Directive dispatch and the single-pass driver.
//!
//! Everything that is not one of the three directives is copied through
//! unchanged; the driver is a write-through transducer. Directive bodies
//! are tracked by brace depth, and each open directive's epilogue runs the
//! moment its body-closing brace is seen. Kernel and template bodies are
//! mutually exclusive, while an embed capture may be open concurrently
//! with either, so the state is an explicit variant plus an independent
//! capture record instead of per-directive booleans.

use std::io::{BufRead, Write};

use crate::config::MjitConfig;
use crate::context::ParseContext;
use crate::cursor::is_id_start;
use crate::error::Result;
use crate::kernel::{self, KernelState};
use crate::template::{self, TemplateState};

/// The directive currently owning a brace-delimited body.
enum ActiveDirective {
    None,
    Kernel(KernelState),
    Template(TemplateState),
}

/// Brace depth of an open embed capture.
struct EmbedCapture {
    depth: i32,
}

/// Translation counters, reported under `--verbose`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub kernels: usize,
    pub templates: usize,
    pub embeds: usize,
}

/// Run the transformation to stream exhaustion or the first failure.
pub fn run<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    cfg: &MjitConfig,
) -> Result<Stats> {
    let mut active = ActiveDirective::None;
    let mut embed: Option<EmbedCapture> = None;
    let mut stats = Stats::default();

    loop {
        if ctx.at_comment()? {
            ctx.copy_comment()?;
            continue;
        }
        let Some(c) = ctx.peek()? else { break };
        if is_id_start(c) {
            dispatch_id(ctx, &mut active, &mut embed, &mut stats, cfg)?;
            continue;
        }
        match c {
            b'{' => {
                ctx.put()?;
                enter_brace(&mut active, &mut embed);
            }
            b'}' => close_brace(ctx, &mut active, &mut embed)?,
            _ => {
                ctx.put()?;
            }
        }
    }

    if embed.is_some() {
        return Err(ctx
            .err("premature end of input inside MFEM_EMBED body")
            .into());
    }
    match active {
        ActiveDirective::Kernel(_) => Err(ctx
            .err("premature end of input inside MFEM_KERNEL body")
            .into()),
        ActiveDirective::Template(_) => Err(ctx
            .err("premature end of input inside MFEM_TEMPLATE body")
            .into()),
        ActiveDirective::None => {
            ctx.flush()?;
            Ok(stats)
        }
    }
}

/// Read one identifier; route directive keywords, echo everything else.
fn dispatch_id<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    active: &mut ActiveDirective,
    embed: &mut Option<EmbedCapture>,
    stats: &mut Stats,
    cfg: &MjitConfig,
) -> Result<()> {
    let id = ctx.read_id()?;
    match id.as_str() {
        "MFEM_KERNEL" => {
            if !matches!(active, ActiveDirective::None) {
                return Err(ctx
                    .err("MFEM_KERNEL inside an open directive body")
                    .into());
            }
            *active = ActiveDirective::Kernel(kernel::open(ctx, cfg)?);
            stats.kernels += 1;
        }
        "MFEM_TEMPLATE" => {
            if !matches!(active, ActiveDirective::None) {
                return Err(ctx
                    .err("MFEM_TEMPLATE inside an open directive body")
                    .into());
            }
            *active = ActiveDirective::Template(template::open(ctx)?);
            stats.templates += 1;
        }
        "MFEM_EMBED" => {
            if embed.is_some() {
                return Err(ctx.err("MFEM_EMBED inside an open embed body").into());
            }
            open_embed(ctx, active)?;
            *embed = Some(EmbedCapture { depth: 0 });
            stats.embeds += 1;
        }
        _ => ctx.echo(&id)?,
    }
    Ok(())
}

/// Copy through to and including the embed body's opening brace, then
/// activate capture. The brace still counts for any enclosing body.
fn open_embed<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    active: &mut ActiveDirective,
) -> Result<()> {
    loop {
        match ctx.peek()? {
            None => return Err(ctx.err("missing '{' after MFEM_EMBED").into()),
            Some(b'{') => {
                ctx.put()?;
                match active {
                    ActiveDirective::Kernel(ks) => ks.depth += 1,
                    ActiveDirective::Template(tp) => tp.depth += 1,
                    ActiveDirective::None => {}
                }
                break;
            }
            _ => {
                ctx.put()?;
            }
        }
    }
    ctx.start_capture();
    Ok(())
}

fn enter_brace(active: &mut ActiveDirective, embed: &mut Option<EmbedCapture>) {
    match active {
        ActiveDirective::Kernel(ks) => ks.depth += 1,
        ActiveDirective::Template(tp) => tp.depth += 1,
        ActiveDirective::None => {}
    }
    if let Some(e) = embed {
        e.depth += 1;
    }
}

/// Handle an unconsumed `}`: close the innermost construct whose depth it
/// exhausts, or echo it and keep counting.
fn close_brace<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    active: &mut ActiveDirective,
    embed: &mut Option<EmbedCapture>,
) -> Result<()> {
    // an embed inside a kernel closes before the kernel does
    if let Some(e) = embed {
        if e.depth == 0 {
            ctx.stop_capture();
            ctx.put()?;
            ctx.capture_push("\n");
            *embed = None;
            match active {
                ActiveDirective::Kernel(ks) => ks.depth -= 1,
                ActiveDirective::Template(tp) => tp.depth -= 1,
                ActiveDirective::None => {}
            }
            return Ok(());
        }
    }
    match std::mem::replace(active, ActiveDirective::None) {
        ActiveDirective::Kernel(ks) if ks.depth == 0 => {
            // epilogue first: the input brace then closes the host wrapper
            kernel::emit_postfix(ctx, &ks)?;
            ctx.put()?;
        }
        ActiveDirective::Kernel(mut ks) => {
            ctx.put()?;
            ks.depth -= 1;
            if let Some(e) = embed {
                e.depth -= 1;
            }
            *active = ActiveDirective::Kernel(ks);
        }
        ActiveDirective::Template(tp) if tp.depth == 0 => {
            ctx.put()?;
            template::emit_table(ctx, &tp)?;
        }
        ActiveDirective::Template(mut tp) => {
            ctx.put()?;
            tp.depth -= 1;
            if let Some(e) = embed {
                e.depth -= 1;
            }
            *active = ActiveDirective::Template(tp);
        }
        ActiveDirective::None => {
            ctx.put()?;
            if let Some(e) = embed {
                e.depth -= 1;
            }
        }
    }
    Ok(())
}

/// Translate a whole source string. Convenience entry point for tests and
/// library callers; the binary streams through files instead.
pub fn translate_str(input: &str, cfg: &MjitConfig, file: &str) -> Result<String> {
    let mut ctx = ParseContext::new(input.as_bytes(), Vec::new(), file);
    run(&mut ctx, cfg)?;
    Ok(String::from_utf8_lossy(&ctx.into_output()).into_owned())
}
