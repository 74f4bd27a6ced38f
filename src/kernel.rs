//! Kernel directive: lazy JIT specialization with a hash-keyed cache.
//!
//! `MFEM_KERNEL [static] [template<T...>] void Name(args) { body }` becomes
//! a host wrapper that captures the whole specialization as a raw source
//! string, hashes its constant (dispatch) arguments into a 64-bit key, and
//! compiles-on-first-use through the runtime kernel cache. Dispatch values
//! are unbounded at translation time, which is why variants are built
//! lazily and cached per process instead of enumerated ahead of time (the
//! template directive in `template.rs` handles the bounded case).

use std::io::{BufRead, Write};

use crate::args::{self, ArgumentDescriptor};
use crate::config::MjitConfig;
use crate::context::ParseContext;
use crate::error::Result;
use crate::hash;

/// Accumulated state of one open kernel directive: the derived parameter,
/// argument and format lists every emission stage draws from.
#[derive(Debug, Default)]
pub struct KernelState {
    pub name: String,
    /// Brace nesting inside the body; the directive closes when a `}`
    /// would take this below zero.
    pub depth: i32,
    /// Dispatch-key format slots, one per non-defaulted dispatch argument.
    tformat: Vec<String>,
    /// Hash value list: every dispatch argument, floating ones by bits.
    targs: Vec<String>,
    /// Specialization values handed to the external compiler; matches
    /// `tformat` slot for slot.
    tvals: Vec<String>,
    /// Compile-time parameter declarations of the specialization.
    tparams: Vec<String>,
    /// Runtime + pointer parameter declarations.
    params: Vec<String>,
    /// Host-wrapper call arguments (reference-taking form).
    call_args: Vec<String>,
    /// Call arguments without the reference-taking form, for the
    /// `extern "C"` entry point.
    call_args_wo_amp: Vec<String>,
    /// Bits-to-float statements opening the specialization body.
    bits_prologue: Vec<String>,
    /// Float-to-bits statements recovering hashable values host-side.
    key_stmts: Vec<String>,
    /// Spliced auxiliary source captured by earlier embed directives.
    embed: String,
    has_float: bool,
    /// External compiler command line, from configuration.
    xcc: String,
    include_dir: String,
}

impl KernelState {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Derive the emission lists from the classified arguments.
    pub fn derive(
        &mut self,
        args: &[ArgumentDescriptor],
        cfg: &MjitConfig,
        embed: String,
        tparams_src: Option<String>,
    ) {
        self.xcc = cfg.command_line();
        self.include_dir = cfg.paths.include_dir.clone();
        self.embed = embed;
        for arg in args {
            let name = &arg.name;
            let ty = &arg.ty;
            if arg.is_dispatch() {
                let fp = arg.is_floating();
                self.targs.push(if fp {
                    format!("u{name}")
                } else {
                    name.clone()
                });
                if fp {
                    let sfx = if ty == "double" { "f64" } else { "f32" };
                    self.key_stmts
                        .push(format!("const uint64_t u{name} = jit_{sfx}_bits({name});"));
                    self.has_float = true;
                }
                if arg.default.is_none() {
                    if fp {
                        let sfx = if ty == "double" { "f64" } else { "f32" };
                        self.tformat.push("0x%lx".to_string());
                        self.tparams.push(format!("const uint64_t t{name}"));
                        self.tvals.push(format!("u{name}"));
                        self.bits_prologue
                            .push(format!("const {ty} {name} = jit_bits_{sfx}(t{name});"));
                    } else {
                        self.tformat.push("%ld".to_string());
                        self.tparams.push(format!("const {ty} {name}"));
                        self.tvals.push(name.clone());
                    }
                } else {
                    // defaulted: hashed by value, passed as literal zero
                    self.params.push(format!("const {ty} {name}"));
                    self.call_args.push("0".to_string());
                    self.call_args_wo_amp.push("0".to_string());
                }
            } else if arg.is_runtime() {
                self.params.push(format!("{ty} {name}"));
                self.call_args.push(name.clone());
                self.call_args_wo_amp.push(name.clone());
            } else {
                let constness = if arg.is_const { "const " } else { "" };
                self.params.push(format!("{constness}{ty} *_{name}"));
                let amp = if arg.is_amp { "&" } else { "" };
                self.call_args.push(format!("{amp}_{name}"));
                self.call_args_wo_amp.push(format!("_{name}"));
            }
        }
        if let Some(src) = tparams_src {
            self.tparams.push(src);
        }
    }
}

/// Parse the directive head after the `MFEM_KERNEL` keyword, through the
/// body's opening brace. Returns the populated state; the driver tracks
/// the body from depth 0.
pub fn open<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    cfg: &MjitConfig,
) -> Result<KernelState> {
    ctx.emit_preamble()?;
    ctx.next_token()?;
    if !(ctx.peek_word("void")? || ctx.peek_word("static")? || ctx.peek_word("template")?) {
        return Err(ctx
            .err("kernel directive must declare void, static or template")
            .into());
    }
    // single-source generic clause: its parameters join the emitted
    // compile-time parameter list, the clause itself leaves no host text
    let mut tparams_src = None;
    if ctx.peek_word("template")? {
        ctx.read_id()?;
        ctx.next_token()?;
        ctx.expect_drop(b'<', "missing '<' in generic clause")?;
        let mut src = String::new();
        loop {
            match ctx.bump()? {
                None => return Err(ctx.err("unterminated generic clause").into()),
                Some(b'>') => break,
                Some(c) => src.push(c as char),
            }
        }
        tparams_src = Some(src.trim().to_string());
        ctx.next_token()?;
    }
    if ctx.peek_word("static")? {
        let id = ctx.read_id()?;
        ctx.echo(&id)?;
        ctx.next_token()?;
    }
    let ret = ctx.read_id()?;
    if ret != "void" {
        return Err(ctx.err("kernel directive must return void").into());
    }
    ctx.echo(&ret)?;
    ctx.next_token()?;
    let name = ctx.read_id()?;
    ctx.echo(&name)?;
    ctx.next_token()?;
    ctx.expect_put(b'(', "missing '(' in kernel directive")?;
    let list = args::parse_kernel_list(ctx)?;
    ctx.expect_put(b')', "missing ')' in kernel directive")?;
    ctx.next_token()?;
    ctx.expect_put(b'{', "missing kernel body")?;

    let mut ks = KernelState::new(name);
    let embed = ctx.embed_src().to_string();
    ks.derive(&list, cfg, embed, tparams_src);
    emit_prefix(ctx, &ks)?;
    emit_aliases(ctx, &list)?;
    Ok(ks)
}

/// Open the raw-source capture: includes, spliced embed source, the
/// generic specialization header and the bits-to-float prologue.
fn emit_prefix<R: BufRead, W: Write>(ctx: &mut ParseContext<R, W>, ks: &KernelState) -> Result<()> {
    let mut s = String::new();
    s.push_str("\n\tconst char *src = R\"_mjit_(#include <cstdint>\n");
    s.push_str("#include <limits>\n");
    s.push_str("#include <cstring>\n");
    s.push_str("#include <stdbool.h>\n");
    s.push_str("#include \"mfem.hpp\"\n");
    s.push_str("#include \"general/kernel.hpp\"\n");
    s.push_str("#include \"general/forall.hpp\"\n");
    if ks.has_float {
        s.push_str(hash::CXX_BITS);
    }
    if !ks.embed.is_empty() {
        s.push_str("#pragma push\n#pragma diag_suppress 177\n");
        s.push_str(&ks.embed);
        s.push_str("#pragma pop\n");
    }
    s.push_str("using namespace mfem;\n");
    s.push_str(&format!(
        "template<{}>\nvoid jit_{}({}){{",
        ks.tparams.join(", "),
        ks.name,
        ks.params.join(", ")
    ));
    for stmt in &ks.bits_prologue {
        s.push_str("\n\t");
        s.push_str(stmt);
    }
    ctx.emit(&s)
}

/// Shadow renamed pointer/reference parameters with aliases under their
/// original names, so the body crosses the address boundary transparently.
fn emit_aliases<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    list: &[ArgumentDescriptor],
) -> Result<()> {
    let mut s = String::new();
    for arg in list.iter().filter(|a| a.is_pointer_like()) {
        let constness = if arg.is_const { "const " } else { "" };
        let (sigil, deref) = if arg.is_amp { ("&", "*") } else { ("*", "") };
        s.push_str(&format!(
            "\n\t{constness}{ty} {sigil}{name} = {deref}_{name};",
            ty = arg.ty,
            name = arg.name
        ));
    }
    ctx.emit(&s)
}

/// Close the specialization, append the `extern "C"` entry point, seal the
/// raw string, and emit the host-side cache and launch. Runs when the body
/// closes, before the input's final brace is echoed.
pub fn emit_postfix<R: BufRead, W: Write>(
    ctx: &mut ParseContext<R, W>,
    ks: &KernelState,
) -> Result<()> {
    let params = ks.params.join(", ");
    let tfmt = if ks.tformat.is_empty() {
        String::new()
    } else {
        format!("<{}>", ks.tformat.join(","))
    };
    let targs = if ks.targs.is_empty() {
        String::new()
    } else {
        format!(", {}", ks.targs.join(", "))
    };
    let tvals = if ks.tvals.is_empty() {
        String::new()
    } else {
        format!(", {}", ks.tvals.join(", "))
    };

    let mut s = String::new();
    s.push_str(&format!(
        "}}\nextern \"C\" void k%016lx({params}) {{ jit_{name}{tfmt}({wo_amp}); }}\n)_mjit_\";",
        name = ks.name,
        wo_amp = ks.call_args_wo_amp.join(", ")
    ));
    s.push_str(&format!("\n\ttypedef void (*kernel_t)({params});"));
    s.push_str(&format!("\n\tstatic std::mutex jit_{}_mtx;", ks.name));
    s.push_str(&format!(
        "\n\tstatic std::unordered_map<uint64_t, jit::Kernel<kernel_t>*> jit_{}_cache;",
        ks.name
    ));
    for stmt in &ks.key_stmts {
        s.push_str("\n\t");
        s.push_str(stmt);
    }
    s.push_str(&format!(
        "\n\tconst uint64_t key = jit_hash_args(JIT_HASH_SEED{targs});"
    ));
    s.push_str("\n\tjit::Kernel<kernel_t> *ker = nullptr;");
    s.push_str("\n\t{");
    s.push_str(&format!(
        "\n\t\tstd::lock_guard<std::mutex> lock(jit_{}_mtx);",
        ks.name
    ));
    s.push_str(&format!(
        "\n\t\tjit::Kernel<kernel_t> *&slot = jit_{}_cache[key];",
        ks.name
    ));
    s.push_str(&format!(
        "\n\t\tif (!slot) {{ slot = new jit::Kernel<kernel_t>(\"{}\", src, \"-I{}\"{tvals}); }}",
        ks.xcc, ks.include_dir
    ));
    s.push_str("\n\t\tker = slot;");
    s.push_str("\n\t}");
    s.push_str(&format!("\n\tker->launch({});\n", ks.call_args.join(", ")));
    ctx.emit(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(name: &str, ty: &str) -> ArgumentDescriptor {
        ArgumentDescriptor {
            name: name.to_string(),
            ty: ty.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_partitions_by_convention() {
        let mut n = arg("n", "int");
        n.is_const = true;
        let mut a = arg("a", "double");
        a.is_const = true;
        let q = arg("q", "int");
        let mut x = arg("x", "double");
        x.is_ptr = true;
        let mut b = arg("b", "int");
        b.is_amp = true;

        let mut ks = KernelState::new("k".to_string());
        ks.derive(
            &[n, a, q, x, b],
            &MjitConfig::default(),
            String::new(),
            None,
        );

        assert_eq!(ks.tformat, vec!["%ld", "0x%lx"]);
        assert_eq!(ks.targs, vec!["n", "ua"]);
        assert_eq!(ks.tvals, vec!["n", "ua"]);
        assert_eq!(ks.tparams, vec!["const int n", "const uint64_t ta"]);
        assert_eq!(ks.params, vec!["int q", "double *_x", "int *_b"]);
        assert_eq!(ks.call_args, vec!["q", "_x", "&_b"]);
        assert_eq!(ks.call_args_wo_amp, vec!["q", "_x", "_b"]);
        assert_eq!(
            ks.bits_prologue,
            vec!["const double a = jit_bits_f64(ta);"]
        );
        assert_eq!(ks.key_stmts, vec!["const uint64_t ua = jit_f64_bits(a);"]);
    }

    #[test]
    fn test_derive_defaulted_dispatch_passes_zero() {
        let mut z = arg("z", "int");
        z.is_const = true;
        z.default = Some(3);

        let mut ks = KernelState::new("k".to_string());
        ks.derive(&[z], &MjitConfig::default(), String::new(), None);

        // hashed by value, but no format slot and no template parameter
        assert_eq!(ks.targs, vec!["z"]);
        assert!(ks.tformat.is_empty());
        assert!(ks.tparams.is_empty());
        assert_eq!(ks.params, vec!["const int z"]);
        assert_eq!(ks.call_args, vec!["0"]);
    }

    #[test]
    fn test_derive_appends_generic_clause() {
        let mut n = arg("n", "int");
        n.is_const = true;
        let mut ks = KernelState::new("k".to_string());
        ks.derive(
            &[n],
            &MjitConfig::default(),
            String::new(),
            Some("typename T".to_string()),
        );
        assert_eq!(ks.tparams, vec!["const int n", "typename T"]);
    }
}
