//! CLI tool that merges report attachments from a mailbox folder into one
//! page-numbered PDF per report and team, and drafts a mail for each.
//!
//! The mailbox is a [`DirectoryMessageStore`] tree; see the crate
//! documentation for its layout.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use mergereportpdf::{
    parse, received_since, scan_folder, select, DirectoryMessageStore, Distributor,
    DistributorConfig, MessageStore, OutboxComposer, ReportError, Result, TomlRecipientDirectory,
};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "mergereportpdf", version, about = "Merge, number and distribute PDF report attachments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the folder tree of a mailbox
    Folders {
        /// Mailbox root directory
        mailbox: PathBuf,
    },
    /// List the PDF attachments of a folder and how their names parse
    List {
        mailbox: PathBuf,
        /// Folder path below the mailbox root, e.g. "Reports/2024"
        folder: String,
    },
    /// Merge, number and draft every report group of a folder
    Run {
        mailbox: PathBuf,
        folder: String,
        /// TOML file with the mailing lists
        #[arg(long)]
        recipients: PathBuf,
        /// Directory the drafts are written to
        #[arg(long)]
        outbox: PathBuf,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Save folder for merged documents (overrides the configuration)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Only use attachments whose filename contains this text (repeatable)
        #[arg(long = "select")]
        patterns: Vec<String>,
        /// Only use messages received on or after this day (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Folders { mailbox } => print_folders(mailbox),
        Command::List { mailbox, folder } => list_attachments(mailbox, &folder),
        Command::Run {
            mailbox,
            folder,
            recipients,
            outbox,
            config,
            output,
            patterns,
            since,
        } => run_distribution(RunArgs {
            mailbox,
            folder,
            recipients,
            outbox,
            config,
            output,
            patterns,
            since,
        }),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("\n❌ Error: {}", e);
            process::exit(1);
        }
    }
}

fn print_folders(mailbox: PathBuf) -> Result<bool> {
    let store = DirectoryMessageStore::open(mailbox)?;
    let tree = store.list_folders()?;
    for (depth, node) in tree.walk() {
        println!("{}📁 {}", "  ".repeat(depth), node.name);
    }
    Ok(true)
}

fn list_attachments(mailbox: PathBuf, folder: &str) -> Result<bool> {
    let store = DirectoryMessageStore::open(mailbox)?;
    let tree = store.list_folders()?;
    let node = tree.find(folder).ok_or_else(|| unknown_folder(folder))?;

    let entries = store.list_attachments(&node.folder)?;
    println!("📎 {} PDF attachment(s) in '{}'", entries.len(), node.name);
    println!("{}", "─".repeat(60));
    for entry in entries {
        match parse(&entry.filename) {
            Ok(parsed) if parsed.is_recognized() => println!(
                "  📄 {}  [{} {} {} → {}]",
                entry.filename,
                parsed.frequency,
                parsed.kind,
                parsed.part,
                parsed.merged_filename()
            ),
            Ok(_) => println!("  ⚠️  {}  [unrecognised]", entry.filename),
            Err(e) => println!("  ❌ {}  [{}]", entry.filename, e),
        }
    }
    Ok(true)
}

struct RunArgs {
    mailbox: PathBuf,
    folder: String,
    recipients: PathBuf,
    outbox: PathBuf,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    patterns: Vec<String>,
    since: Option<NaiveDate>,
}

/// Returns `Ok(false)` when groups failed and nothing was distributed.
fn run_distribution(args: RunArgs) -> Result<bool> {
    let mut config = match &args.config {
        Some(path) => DistributorConfig::from_path(path)?,
        None => DistributorConfig::default(),
    };
    if let Some(output) = args.output {
        config.output_directory = output;
    }

    let store = DirectoryMessageStore::open(&args.mailbox)?;
    let directory = TomlRecipientDirectory::from_path(&args.recipients)?;
    let mut composer = OutboxComposer::new(&args.outbox);

    let tree = store.list_folders()?;
    let node = tree
        .find(&args.folder)
        .ok_or_else(|| unknown_folder(&args.folder))?;

    println!("🔍 Scanning folder: {}", node.name);
    println!("📁 Save folder: {}", config.output_directory.display());
    println!("{}", "─".repeat(60));

    let scan = scan_folder(&store, &node.folder)?;
    let mut items = select(scan.items, &args.patterns);
    if let Some(since) = args.since {
        items = received_since(items, since);
    }
    println!("📎 {} attachment(s) selected", items.len());

    let mut summary = Distributor::new(&store, &directory, &mut composer, &config).run(items);
    let mut skipped = scan.skipped;
    skipped.append(&mut summary.skipped_items);
    summary.skipped_items = skipped;

    println!("\n{}", "─".repeat(60));
    println!("📊 Summary:");
    print!("{}", summary);
    println!("   • Drafts written to: {}", args.outbox.display());

    Ok(!summary.distributed.is_empty() || summary.skipped_groups.is_empty())
}

fn unknown_folder(folder: &str) -> ReportError {
    ReportError::ConfigError(format!("no folder '{folder}' in the mailbox"))
}
