mod load;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use tollgate_eval::{AuditEvent, Engine, MemoryAudit, Session};

/// Exit status for a comparison that evaluated to `false`.
const EXIT_FALSE: i32 = 2;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Tollgate variable expansion and comparison evaluator.
#[derive(Parser)]
#[command(
    name = "tollgate",
    version,
    about = "Expand ${...} templates and evaluate comparison assertions"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the audit trail recorded while evaluating
    #[arg(long, global = true)]
    audit: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a template against a set of variables
    Expand {
        /// Template text containing ${...} references
        template: String,
        /// Path to the variables JSON file
        #[arg(long)]
        vars: Option<PathBuf>,
        /// Fail on missing variables and selector misses
        #[arg(long)]
        strict: bool,
    },

    /// Evaluate a comparison assertion against a set of variables
    Eval {
        /// Path to the assertion JSON file
        #[arg(long)]
        assertion: PathBuf,
        /// Path to the variables JSON file
        #[arg(long)]
        vars: PathBuf,
    },

    /// List the variable names a template references
    Refs {
        /// Template text containing ${...} references
        template: String,
    },
}

/// Flags shared by every subcommand.
#[derive(Clone, Copy)]
struct Opts<'a> {
    output: OutputFormat,
    quiet: bool,
    audit: Option<&'a MemoryAudit>,
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let config = match load::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    let engine = Engine::builder().config(config).build();
    let memory = MemoryAudit::new();
    let opts = Opts {
        output: cli.output,
        quiet: cli.quiet,
        audit: cli.audit.then_some(&memory),
    };

    match cli.command {
        Commands::Expand {
            template,
            vars,
            strict,
        } => {
            cmd_expand(&engine, &template, vars.as_deref(), strict, opts);
        }
        Commands::Eval { assertion, vars } => {
            cmd_eval(&engine, &assertion, &vars, opts);
        }
        Commands::Refs { template } => {
            cmd_refs(&template, opts);
        }
    }
}

/// Install a stderr subscriber. `RUST_LOG` overrides the `warn` default.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn open_session<'a>(engine: &'a Engine, opts: Opts<'a>) -> Session<'a> {
    match opts.audit {
        Some(memory) => engine.session_with(memory),
        None => engine.session(),
    }
}

fn fail(msg: &str, opts: Opts<'_>) -> ! {
    report_error(msg, opts.output, opts.quiet);
    process::exit(1);
}

// ──────────────────────────────────────────────
// Subcommands
// ──────────────────────────────────────────────

fn cmd_expand(
    engine: &Engine,
    template: &str,
    vars_path: Option<&Path>,
    strict: bool,
    opts: Opts<'_>,
) {
    let vars = load::load_vars(vars_path).unwrap_or_else(|msg| fail(&msg, opts));
    let strict = strict || engine.config().strict;
    let session = open_session(engine, opts);

    let expanded = match session.expand(template, &vars, strict) {
        Ok(s) => s,
        Err(e) => {
            print_audit_text(opts);
            fail(&format!("error: {}", e), opts);
        }
    };

    match opts.output {
        OutputFormat::Text => {
            println!("{}", expanded);
            print_audit_text(opts);
        }
        OutputFormat::Json => {
            let mut out = json!({ "result": expanded });
            attach_audit(&mut out, opts);
            print_json(&out);
        }
    }
}

fn cmd_eval(engine: &Engine, assertion_path: &Path, vars_path: &Path, opts: Opts<'_>) {
    let assertion = load::load_assertion(assertion_path).unwrap_or_else(|msg| fail(&msg, opts));
    let vars = load::load_vars(Some(vars_path)).unwrap_or_else(|msg| fail(&msg, opts));
    let compiled = engine
        .compile(&assertion)
        .unwrap_or_else(|e| fail(&format!("error: {}", e), opts));
    let session = open_session(engine, opts);

    let outcome = match session.evaluate_compiled(&compiled, &vars) {
        Ok(o) => o,
        Err(e) => fail(&format!("error: {}", e), opts),
    };

    match opts.output {
        OutputFormat::Text => {
            println!("{}", outcome.verdict);
            if let Some(p) = &outcome.first_failure {
                if !opts.quiet {
                    println!("first failure: {}", p);
                }
            }
            print_audit_text(opts);
        }
        OutputFormat::Json => {
            let mut out = serde_json::to_value(&outcome).unwrap_or_else(|_| json!({}));
            attach_audit(&mut out, opts);
            print_json(&out);
        }
    }

    if !outcome.verdict {
        process::exit(EXIT_FALSE);
    }
}

fn cmd_refs(template: &str, opts: Opts<'_>) {
    let names = match tollgate_core::referenced_names(template) {
        Ok(n) => n,
        Err(e) => fail(&format!("error: {}", e), opts),
    };
    match opts.output {
        OutputFormat::Text => {
            for name in &names {
                println!("{}", name);
            }
        }
        OutputFormat::Json => print_json(&json!({ "references": names })),
    }
}

// ──────────────────────────────────────────────
// Output helpers
// ──────────────────────────────────────────────

fn audit_json(event: &AuditEvent) -> serde_json::Value {
    json!({
        "code": event.code(),
        "level": format!("{:?}", event.level()),
        "message": event.to_string(),
    })
}

fn attach_audit(out: &mut serde_json::Value, opts: Opts<'_>) {
    let (Some(memory), Some(obj)) = (opts.audit, out.as_object_mut()) else {
        return;
    };
    let events: Vec<_> = memory.events().iter().map(audit_json).collect();
    obj.insert("audit".to_string(), serde_json::Value::Array(events));
}

/// Audit lines go to stderr so stdout stays the bare result.
fn print_audit_text(opts: Opts<'_>) {
    let Some(memory) = opts.audit else {
        return;
    };
    for event in memory.events() {
        eprintln!("[{}] {:?}: {}", event.code(), event.level(), event);
    }
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", json!({ "error": msg })),
    }
}
