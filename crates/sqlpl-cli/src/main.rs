//! Thin CLI front end (§6.2): argument parsing and wiring into the pass
//! driver only. Grounded on `plotnik-cli`'s `commands/check.rs` pattern —
//! diagnostics to stderr, silent on success, exit 1 on any failure.

use std::fs;
use std::process::ExitCode;

use clap::Parser;

use sqlpl_core::arena::{Arena, NodeId};
use sqlpl_compiler::Compiler;

/// sqlpl compiler front end.
#[derive(Parser, Debug)]
#[command(name = "sqlplc", about = "Compile sqlpl source to SQLite-ready SQL")]
struct Args {
    /// Input source file (§6.2 `--in`).
    #[arg(long = "in", value_name = "FILE")]
    input: String,

    /// Output file for the regenerated SQL (§6.2 `--cg`). Defaults to stdout.
    #[arg(long = "cg", value_name = "FILE")]
    codegen_out: Option<String>,

    /// Regen target (§6.2 `--rt`). Only `sqlite` and `echo` are implemented.
    #[arg(long = "rt", value_name = "BACKEND", default_value = "sqlite")]
    backend: String,

    /// Preprocessor define, repeatable (§6.2 `-D name[=value]`).
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Stop after semantic analysis; report diagnostics but emit no code.
    #[arg(long)]
    semantic: bool,

    /// Stop after macro expansion; echo the expanded source.
    #[arg(long)]
    expand: bool,

    /// Dump the parsed AST instead of regenerating code.
    #[arg(long)]
    print_ast: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let source = match fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {}", args.input, e);
            return ExitCode::FAILURE;
        }
    };

    let mut compiler = Compiler::new();
    for raw in &args.defines {
        let name = raw.split('=').next().unwrap_or(raw);
        compiler.define(name);
    }

    let unit = match compiler.compile(&source, &args.input) {
        Ok(unit) => unit,
        Err(_) => {
            eprint!("{}", compiler.diagnostics.printer().render_plain());
            eprintln!();
            return ExitCode::FAILURE;
        }
    };

    if compiler.diagnostics.has_errors() {
        eprint!("{}", compiler.diagnostics.printer().render_plain());
        eprintln!();
        return ExitCode::FAILURE;
    }

    if args.print_ast {
        let mut out = String::new();
        dump_node(&compiler.arena, unit.root, 0, &mut out);
        print!("{}", out);
        return ExitCode::SUCCESS;
    }

    if args.expand {
        print!("{}", compiler.regenerate_echo(&unit));
        return ExitCode::SUCCESS;
    }

    if args.semantic {
        // Diagnostics already checked clean above; nothing else to do.
        return ExitCode::SUCCESS;
    }

    let output = match args.backend.as_str() {
        "sqlite" => compiler.regenerate_sqlite(&unit).0,
        "echo" => compiler.regenerate_echo(&unit),
        other => {
            eprintln!("unsupported regen target '{}'", other);
            return ExitCode::FAILURE;
        }
    };

    match &args.codegen_out {
        Some(path) => {
            if let Err(e) = fs::write(path, output) {
                eprintln!("{}: {}", path, e);
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", output),
    }

    ExitCode::SUCCESS
}

/// Indented `kind` dump for `--print_ast`, one node per line.
fn dump_node(arena: &Arena, id: NodeId, depth: usize, out: &mut String) {
    use std::fmt::Write as _;

    let node = arena.get(id);
    let indent = "  ".repeat(depth);
    match node.leaf() {
        Some(leaf) => {
            let text = leaf_text(arena, leaf);
            let _ = writeln!(out, "{}{:?} {}", indent, node.kind, text);
        }
        None => {
            let _ = writeln!(out, "{}{:?}", indent, node.kind);
            if let Some(left) = node.left() {
                dump_node(arena, left, depth + 1, out);
            }
            if let Some(right) = node.right() {
                dump_node(arena, right, depth + 1, out);
            }
        }
    }
}

fn leaf_text(arena: &Arena, leaf: &sqlpl_core::arena::Leaf) -> String {
    use sqlpl_core::arena::Leaf;
    match leaf {
        Leaf::Int(v) => v.to_string(),
        Leaf::Num { text, .. } => arena.strings.resolve(*text).to_string(),
        Leaf::Str { text, .. } => arena.strings.resolve(*text).to_string(),
        Leaf::Qid(q) => format!("{:?}", q),
    }
}
