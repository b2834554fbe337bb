//! noqli: the NoQLi shell
//!
//! # Usage
//!
//! ```bash
//! # Interactive shell
//! noqli --host 127.0.0.1:3306 --user root -d shop
//!
//! # One command, then exit
//! noqli -d shop "GET tables"
//!
//! # Show the SQL a command would run, offline
//! noqli explain "get {status: ['a', 'b'], lim: 5}" --table users
//! ```

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use noqli::config::{Config, DatabaseConfig};
use noqli::prelude::*;
use rustyline::config::Config as EditorConfig;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "noqli")]
#[command(version)]
#[command(about = "NoSQL-flavored shell for MySQL tables", long_about = None)]
#[command(after_help = "EXAMPLES:
    noqli -d shop
    noqli -d shop \"USE users\"
    noqli explain \"get {name, email, like: 'son', lim: 2}\" --table users --columns name,email")]
struct Cli {
    /// Run a single command and exit
    command: Option<String>,

    /// Database connection URL (overrides host/user/password/database)
    #[arg(long, env = "NOQLI_DATABASE_URL")]
    database_url: Option<String>,

    /// Database host, optionally with port
    #[arg(long, env = "DB_HOST")]
    host: Option<String>,

    #[arg(short, long, env = "DB_USER")]
    user: Option<String>,

    #[arg(short, long, env = "DB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Database selected at startup
    #[arg(short, long, env = "DB_NAME")]
    database: Option<String>,

    /// Config file (defaults to ./noqli.toml, then ~/.noqli/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Log statements to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    subcommand: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and resolve a command offline and show its SQL
    Explain {
        /// The command to explain, e.g. "UPDATE {id: 3, name: 'x'}"
        command: String,

        /// Table to render the statement against
        #[arg(short, long, default_value = "table")]
        table: String,

        /// Known columns; suffix `:num` for non-text columns (age:num)
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    /// Interactive shell (the default)
    Repl,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let result = match &cli.subcommand {
        Some(Commands::Explain {
            command,
            table,
            columns,
        }) => explain_command(command, table, columns),
        Some(Commands::Repl) => run_repl(&cli).await,
        None => match &cli.command {
            Some(command) => run_once(&cli, command).await,
            None => run_repl(&cli).await,
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("noqli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load()?,
    };

    config.database.merge(DatabaseConfig {
        url: cli.database_url.clone(),
        host: cli.host.clone(),
        user: cli.user.clone(),
        password: cli.password.clone(),
        name: cli.database.clone(),
    });
    Ok(config)
}

async fn connect(cli: &Cli) -> anyhow::Result<(Shell<MySqlStore>, Config)> {
    let config = load_config(cli)?;
    let options = config.database.connect_options()?;

    let store = MySqlStore::connect(options)
        .await
        .context("could not connect to MySQL")?;
    tracing::info!(database = ?config.database.name, "connected");

    let session = Session::new(config.database.name.clone());
    Ok((Shell::new(store, session), config))
}

fn renderer(cli: &Cli) -> Renderer {
    Renderer::new(!cli.no_color)
}

/// Ask on stdin; anything but `y` declines.
fn stdin_confirm(prompt: &str) -> bool {
    println!("{}", prompt.yellow());
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}

async fn run_once(cli: &Cli, command: &str) -> anyhow::Result<()> {
    let (mut shell, _) = connect(cli).await?;
    let render = renderer(cli);

    if let Outcome::Reply { reply, mode } = shell.run(command, &mut stdin_confirm).await? {
        println!("{}", render.render(&reply, mode));
    }
    Ok(())
}

async fn run_repl(cli: &Cli) -> anyhow::Result<()> {
    let (mut shell, config) = connect(cli).await?;
    let render = renderer(cli);

    let editor_config = EditorConfig::builder()
        .max_history_size(config.shell.max_history)
        .context("invalid history size")?
        .auto_add_history(false)
        .build();
    let mut rl = DefaultEditor::with_config(editor_config).context("failed to initialize the line editor")?;

    let history_path = config.shell.history_path();
    if let Some(path) = &history_path {
        let _ = rl.load_history(path);
    }

    println!("{}", "Connected to MySQL".green());
    println!("{}", "NoQLi CLI. Type EXIT to quit.".dimmed());

    loop {
        let prompt = shell.session().prompt().cyan().bold().to_string();
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match shell.run(line, &mut stdin_confirm).await {
                    Ok(Outcome::Exit) => break,
                    Ok(Outcome::Reply { reply, mode }) => println!("{}", render.render(&reply, mode)),
                    Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red(), err);
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        save_history(&mut rl, path);
    }
    Ok(())
}

/// Write the history file, logging a failure.
fn save_history(rl: &mut DefaultEditor, path: &Path) -> bool {
    match rl.save_history(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not save history");
            false
        }
    }
}

fn explain_command(command: &str, table: &str, columns: &[String]) -> anyhow::Result<()> {
    let columns: Vec<ColumnInfo> = columns
        .iter()
        .map(|c| match c.split_once(':') {
            Some((name, _)) => ColumnInfo::new(name.trim(), false),
            None => ColumnInfo::new(c.trim(), true),
        })
        .collect();

    println!("{} {}", "Command:".dimmed(), command.yellow());
    println!();

    let (intent, stmt) = noqli::shell::explain(command, &TableRef::new(table), &columns)?;

    println!("{}", "Resolved Intent:".green().bold());
    for line in serde_json::to_string_pretty(&intent)?.lines() {
        println!("  {}", line);
    }

    if let Intent::Update(fields) = &intent {
        if fields.needs_confirmation() {
            println!("  {}", "(updates every row; the shell asks for confirmation)".yellow());
        }
    }

    println!();
    println!("{}", "Generated SQL:".green().bold());
    println!("  {}", stmt.sql.white());

    if !stmt.params.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, p) in stmt.params.iter().enumerate() {
            println!("  ?{} = {}", i + 1, p.to_string().yellow());
        }
    }
    Ok(())
}
