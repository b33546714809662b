//! Command-line interface for gemma.
//!
//! Runs the session controller against the deterministic demo engine, so
//! the chat loop and completion path can be exercised without model
//! weights. A real deployment swaps in an [`gemma::engine::Engine`]
//! implementation backed by actual inference.

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};

use gemma::completion::complete;
use gemma::config::ChatConfig;
use gemma::engine::DemoEngine;
use gemma::session::{Session, SessionEnd};
use gemma::stream::ConsoleSink;
use gemma::tokenizer::WordTokenizer;

#[derive(Parser)]
#[command(name = "gemma-cli", version, about = "Gemma-style chat session driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone)]
struct GenOpts {
    /// Session-wide token budget (prompt + generated, all turns).
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Keep conversational context across turns.
    #[arg(long)]
    multiturn: bool,

    /// Use a fixed sampling seed for reproducible output.
    #[arg(long)]
    deterministic: bool,

    /// Output verbosity (0 = text only, 1 = indicators, 2 = stats).
    #[arg(long)]
    verbosity: Option<u8>,

    /// Worker threads requested from the engine pool.
    #[arg(long)]
    num_threads: Option<usize>,

    /// JSON config file; explicit flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treat the model as pre-trained (no turn markup).
    #[arg(long)]
    pretrained: bool,
}

impl GenOpts {
    /// Merge the config file (if any) with explicit flag overrides.
    fn resolve(&self) -> gemma::Result<ChatConfig> {
        let mut config = match &self.config {
            Some(path) => ChatConfig::from_json_file(path)?,
            None => ChatConfig::default(),
        };
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if self.multiturn {
            config.multiturn = true;
        }
        if self.deterministic {
            config.deterministic = true;
        }
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity;
        }
        if let Some(num_threads) = self.num_threads {
            config.num_threads = num_threads;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start an interactive chat session (demo engine).
    Chat {
        #[command(flatten)]
        opts: GenOpts,
    },
    /// One-shot completion: prompt in, completion out.
    Complete {
        /// Input prompt text.
        #[arg(short, long)]
        prompt: String,

        #[command(flatten)]
        opts: GenOpts,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Chat { opts } => {
            let config = resolve_or_exit(&opts);
            cmd_chat(config, !opts.pretrained);
        }
        Command::Complete { prompt, opts } => {
            let config = resolve_or_exit(&opts);
            cmd_complete(config, !opts.pretrained, &prompt);
        }
    }
}

/// Configuration errors are fatal at startup and shown with full usage.
fn resolve_or_exit(opts: &GenOpts) -> ChatConfig {
    match opts.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            let _ = Cli::command().print_help();
            std::process::exit(2);
        }
    }
}

fn cmd_chat(config: ChatConfig, instruction_tuned: bool) {
    if config.verbosity >= 1 {
        print_banner(&config);
    }

    let engine = DemoEngine::new(instruction_tuned, config.pool_hint());
    let tokenizer = WordTokenizer::new();

    let mut session = match Session::new(engine, tokenizer, config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut sink = ConsoleSink::new();
    match session.run(stdin.lock(), &mut sink) {
        Ok(SessionEnd::Quit) | Ok(SessionEnd::InputExhausted) | Ok(SessionEnd::BudgetExhausted) => {}
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_complete(config: ChatConfig, instruction_tuned: bool, prompt: &str) {
    let mut engine = DemoEngine::new(instruction_tuned, config.pool_hint());
    let tokenizer = WordTokenizer::new();

    match complete(&mut engine, &tokenizer, &config, prompt) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn print_banner(config: &ChatConfig) {
    println!("gemma v{} interactive chat", gemma::VERSION);
    println!();

    if config.verbosity >= 2 {
        println!("Max tokens              : {}", config.max_tokens);
        println!("Multiturn               : {}", config.multiturn);
        println!("Deterministic           : {}", config.deterministic);
        println!("Requested threads       : {}", config.num_threads);
        println!(
            "Hardware concurrency    : {}",
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        );
        println!();
    }

    println!("*Usage*");
    println!("  Enter an instruction and press enter (%Q quits).");
    println!();
    println!("*Examples*");
    println!("  - Write an email to grandma thanking her for the cookies.");
    println!("  - What are some historical attractions to visit around Massachusetts?");
    println!("  - Compute the nth fibonacci number in javascript.");
    println!("  - Write a standup comedy bit about GPU programming.");
    println!();
}
