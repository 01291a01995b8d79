//! `ctxtool` CLI: reformat and query JSON through a Context tree.
//!
//! ## Usage
//!
//! ```sh
//! # Reformat JSON (stdin → stdout), two-space indent
//! echo '{"b":1,"a":[1,2]}' | ctxtool fmt
//!
//! # Compact output with non-ASCII escaped, file to file
//! ctxtool fmt --indent -1 --ensure-ascii -i result.json -o result.min.json
//!
//! # Print one subtree; negative indices count from the back
//! ctxtool get objects.-1.bbox -i result.json
//!
//! # List the keys of an object
//! ctxtool keys objects.0 -i result.json
//! ```

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use context_core::{Context, SerializeOptions};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ctxtool",
    version,
    about = "Reformat and query JSON through a Context tree"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise the log level (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse JSON into a Context and serialize it again
    Fmt {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        #[command(flatten)]
        layout: Layout,
    },
    /// Print the subtree at a dot-separated path such as `objects.0.bbox`
    Get {
        path: String,
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[command(flatten)]
        layout: Layout,
    },
    /// List the keys of an object, one per line
    Keys {
        /// Path to the object (the root if omitted)
        path: Option<String>,
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

#[derive(Args)]
struct Layout {
    /// Indent width per level; negative for compact output
    #[arg(long, default_value_t = 2, allow_hyphen_values = true)]
    indent: i32,
    /// Character repeated for each indent step
    #[arg(long, default_value_t = ' ')]
    indent_char: char,
    /// Escape every non-ASCII character as \uXXXX
    #[arg(long)]
    ensure_ascii: bool,
}

impl Layout {
    fn options(&self) -> SerializeOptions {
        SerializeOptions {
            indent: self.indent,
            ..SerializeOptions::default()
        }
        .with_indent_char(self.indent_char)
        .with_ensure_ascii(self.ensure_ascii)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Fmt {
            input,
            output,
            layout,
        } => {
            let ctx = read_context(input.as_deref())?;
            let text = render(&ctx, &layout)?;
            write_output(output.as_deref(), &text)?;
        }
        Commands::Get {
            path,
            input,
            layout,
        } => {
            let ctx = read_context(input.as_deref())?;
            let node = lookup(&ctx, &path)?;
            let text = render(node, &layout)?;
            write_output(None, &text)?;
        }
        Commands::Keys { path, input } => {
            let ctx = read_context(input.as_deref())?;
            let node = lookup(&ctx, path.as_deref().unwrap_or(""))?;
            let keys = node
                .keys()
                .with_context(|| format!("Cannot list keys of a {} node", node.variant_name()))?;
            for key in keys {
                println!("{key}");
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ctxtool={level},context_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn lookup<'a>(ctx: &'a Context, path: &str) -> Result<&'a Context> {
    tracing::debug!(path, "resolving path");
    ctx.at_path(path)
        .with_context(|| format!("Path not found: {path}"))
}

fn render(ctx: &Context, layout: &Layout) -> Result<String> {
    let mut text = context_core::serialize(ctx, &layout.options())
        .context("Failed to serialize Context to JSON")?;
    text.push('\n');
    Ok(text)
}

fn read_context(path: Option<&str>) -> Result<Context> {
    let text = read_input(path)?;
    let ctx = context_core::deserialize(&text).context("Failed to parse JSON input")?;
    tracing::debug!(kind = ctx.variant_name(), "parsed input");
    Ok(ctx)
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
