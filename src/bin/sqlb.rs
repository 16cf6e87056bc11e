//! sqlb: translate queries between SQL, MongoDB and Cypher
//!
//! # Usage
//!
//! ```bash
//! # Render a Mongo query as SQL Server SQL
//! sqlb render 'Movie.find({year: {$gt: 2000}}, {title: 1})' --dialect sql_server
//!
//! # Which syntax is this?
//! sqlb detect 'MATCH (m:Movie) RETURN m.title'
//!
//! # Parsed model as JSON, read from stdin
//! echo 'SELECT * FROM Movie m' | sqlb explain -
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use colored::*;
use sql_blocks::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlb")]
#[command(version)]
#[command(about = "Translate queries between SQL dialects, MongoDB and Cypher", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlb render 'SELECT m.title FROM Movie m WHERE m.year > 2000' --to mongo
    sqlb render 'Actor(name) <- Cast(actor_id, movie_id) -> Movie(id, title)' --pretty
    sqlb render 'SELECT * FROM Orders o' --optimize auto_limit --dialect oracle
    sqlb detect 'Movie.find({})'")]
struct Cli {
    /// Settings file (defaults to ./sql-blocks.toml, then the user config dir)
    #[arg(short, long, global = true, env = "SQLB_CONFIG")]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, combine, optionally rewrite, and render a query
    Render {
        /// Query text, or `-` for standard input
        text: String,

        /// Input syntax (detected when omitted)
        #[arg(long)]
        from: Option<Syntax>,

        /// Output language
        #[arg(long, default_value = "sql")]
        to: Language,

        /// SQL dialect (overrides the settings file)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Rewrite rules to apply, in order
        #[arg(short, long, value_delimiter = ',')]
        optimize: Vec<Rule>,

        /// One clause per line
        #[arg(short, long)]
        pretty: bool,
    },
    /// Print the detected input syntax
    Detect {
        /// Query text, or `-` for standard input
        text: String,
    },
    /// Print the parsed queries as JSON
    Explain {
        /// Query text, or `-` for standard input
        text: String,

        /// Input syntax (detected when omitted)
        #[arg(long)]
        from: Option<Syntax>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "sql_blocks=debug",
        _ => "sql_blocks=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Render {
            text,
            from,
            to,
            dialect,
            optimize,
            pretty,
        } => {
            let mut ctx = load_context(cli.config.as_ref())?;
            if let Some(dialect) = dialect {
                ctx.dialect = *dialect;
            }
            let text = read_text(text)?;
            let queries = parse_input(&text, *from, &mut ctx)?;
            let mut query = Query::combine_all(queries, &ctx.registry)
                .context("combining parsed tables")?;
            query.break_lines = *pretty;
            query
                .optimize(optimize, &ctx)
                .context("applying rewrite rules")?;
            println!("{}", query.render(*to, ctx.dialect));
        }
        Commands::Detect { text } => {
            let text = read_text(text)?;
            let syntax = parser_class(&text)?;
            println!("{}", syntax.name().cyan());
        }
        Commands::Explain { text, from } => {
            let mut ctx = load_context(cli.config.as_ref())?;
            let text = read_text(text)?;
            let queries = parse_input(&text, *from, &mut ctx)?;
            println!("{}", serde_json::to_string_pretty(&queries)?);
        }
    }
    Ok(())
}

fn load_context(path: Option<&PathBuf>) -> Result<Context> {
    match path {
        Some(path) => {
            Context::load(path).with_context(|| format!("reading settings from {}", path.display()))
        }
        None => Context::discover().context("reading settings"),
    }
}

fn parse_input(text: &str, from: Option<Syntax>, ctx: &mut Context) -> Result<Vec<Query>> {
    let queries = match from {
        Some(syntax) => parse_with(syntax, text, ctx)?,
        None => parse(text, ctx)?,
    };
    Ok(queries)
}

fn read_text(text: &str) -> Result<String> {
    if text != "-" {
        return Ok(text.to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading query from stdin")?;
    Ok(buf)
}
