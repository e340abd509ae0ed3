mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use inkwell::{ConfigError, Document, ParserOptions};

#[derive(Parser)]
#[command(name = "inkwell", version, about = "Markdown document inspector")]
struct Cli {
    /// Disable colored diagnostic output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log parser and shadow tree activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    options: OptionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct OptionArgs {
    /// TOML file with parser options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable GitHub extensions (tables, strikethrough, task lists)
    #[arg(long, global = true)]
    no_gfm: bool,

    /// Disable tables
    #[arg(long, global = true)]
    no_tables: bool,

    /// Disable strikethrough
    #[arg(long, global = true)]
    no_strikethrough: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print word, character, heading and link counts
    Stats(FileArgs),

    /// Print the table of contents
    Toc(TocArgs),

    /// List links in document order
    Links(LinksArgs),

    /// Dump the parsed node tree
    Tree(FileArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct FileArgs {
    /// Markdown file to read
    file: String,
}

#[derive(clap::Args)]
struct TocArgs {
    /// Markdown file to read
    file: String,

    /// Only show entries up to this nesting depth (1 = top level)
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(clap::Args)]
struct LinksArgs {
    /// Markdown file to read
    file: String,

    /// Also list [[wiki links]] found in the raw source
    #[arg(long)]
    wiki: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = match cli.options.resolve() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    debug!(?options, "parser options");

    match cli.command {
        Command::Stats(args) => {
            let loaded = load(&args.file, options, cli.no_color);
            print_stats(&loaded.document);
        }
        Command::Toc(args) => {
            let loaded = load(&args.file, options, cli.no_color);
            print_toc(&loaded.document, args.max_depth);
        }
        Command::Links(args) => {
            let loaded = load(&args.file, options, cli.no_color);
            print_links(&loaded, args.wiki);
        }
        Command::Tree(args) => {
            let loaded = load(&args.file, options, cli.no_color);
            match loaded.document.root() {
                Some(root) => print!("{}", root),
                None => println!("(empty)"),
            }
        }
        Command::Test(args) => {
            let path = Path::new(&args.path);
            if args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "inkwell=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl OptionArgs {
    /// Options file first, then `--no-gfm`, then the individual switches.
    fn resolve(&self) -> Result<ParserOptions, ConfigError> {
        let mut options = match &self.config {
            Some(path) => ParserOptions::load(path)?,
            None => ParserOptions::default(),
        };
        if self.no_gfm {
            options.enable_github_extensions(false);
        }
        if self.no_tables {
            options.enable_tables(false);
        }
        if self.no_strikethrough {
            options.enable_strikethrough(false);
        }
        Ok(options)
    }
}

struct Loaded {
    source: String,
    document: Document,
}

/// Read and parse `file`, reporting parse warnings on stderr. Exits on I/O
/// failure.
fn load(file: &str, options: ParserOptions, no_color: bool) -> Loaded {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            process::exit(1);
        }
    };

    let document = inkwell::Parser::new(options).parse(&source);

    if !document.diagnostics().is_empty() {
        let color_choice = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        let mut files = SimpleFiles::new();
        let file_id = files.add(file.to_string(), source.clone());
        let writer = StandardStream::stderr(color_choice);
        let config = term::Config::default();
        for warning in document.diagnostics() {
            let diagnostic = warning.to_diagnostic(file_id);
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
        }
    }

    Loaded { source, document }
}

fn print_stats(document: &Document) {
    let mut nodes = 0;
    document.visit(|_| nodes += 1);
    println!("words:      {}", document.word_count());
    println!("characters: {}", document.character_count());
    println!("headings:   {}", document.toc().len());
    println!("links:      {}", document.extract_links().len());
    println!("nodes:      {}", nodes);
}

fn print_toc(document: &Document, max_depth: Option<usize>) {
    for (depth, entry) in document.toc().flatten() {
        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }
        println!("{}{} {}", "  ".repeat(depth), "#".repeat(entry.level as usize), entry.text);
    }
}

fn print_links(loaded: &Loaded, wiki: bool) {
    let mut links = loaded.document.extract_links();
    if wiki {
        links.extend(inkwell::wikilink::detect_wikilinks(&loaded.source));
        links.sort_by_key(|link| link.position);
    }
    for link in &links {
        let marker = if link.is_wikilink { "[[]]" } else { "[]()" };
        println!("{:>6}  {}  {}  {:?}", link.position, marker, link.url, link.text);
    }
}
