use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clean_names_core::{
    app_paths, load_config, load_config_from, load_plan, parse_replacement, relative_to_root,
    save_config, save_config_to, save_plan, AppConfig, BatchOutcome, BatchRecord, Engine,
    EngineError, EntryKind, FailurePolicy, OpStatus, PlanOptions, PlanRequest, RenamePlan,
    RenameRule, RuleError, UndoJournal, UndoOutcome, UndoReport,
};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::io;
use std::path::PathBuf;
use std::process;

const EXIT_OK: i32 = 0;
const EXIT_OTHER: i32 = 1;
const EXIT_VALIDATION: i32 = 2;
const EXIT_PARTIAL: i32 = 3;
const EXIT_FILESYSTEM: i32 = 4;
const EXIT_NO_HISTORY: i32 = 5;
const EXIT_BUSY: i32 = 6;
const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "clean-names", version)]
#[command(about = "Plans collision-free batch renames, applies them and undoes the last batch")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Undo journal location (defaults to the per-user config folder)
    #[arg(long, global = true, value_name = "PATH")]
    journal: Option<PathBuf>,
    /// Config file to read defaults from
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show what would be renamed without touching anything
    Plan(PlanArgs),
    /// Rename for real and record the batch for undo
    Execute(ExecuteArgs),
    /// Revert the last recorded batch
    Undo(UndoArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct PlanArgs {
    root: PathBuf,
    #[command(flatten)]
    rule: RuleArgs,
    #[command(flatten)]
    traversal: TraversalArgs,
    /// Write the plan as JSON for a later `execute --plan`
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct ExecuteArgs {
    #[arg(required_unless_present = "plan")]
    root: Option<PathBuf>,
    /// Execute a plan saved with `plan --save` instead of planning again
    #[arg(long, value_name = "FILE", conflicts_with = "root")]
    plan: Option<PathBuf>,
    #[command(flatten)]
    rule: RuleArgs,
    #[command(flatten)]
    traversal: TraversalArgs,
    /// Record failures and keep going instead of stopping at the first one
    #[arg(long)]
    continue_on_error: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct UndoArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Path,
    /// Write a config file holding the defaults
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
#[group(id = "rule_kind", multiple = false)]
struct RuleChoice {
    /// Characters to strip; ranges (a-z), escapes and U+XXXX code points allowed
    #[arg(long, value_name = "CHARS")]
    strip: Option<String>,
    /// Renumber as PREFIX + counter, in plan order
    #[arg(long, value_name = "PREFIX")]
    sequential: Option<String>,
    /// Regex applied to the base name
    #[arg(long, value_name = "PATTERN")]
    regex: Option<String>,
    /// Rename to the capture or modified date, with an optional prefix (--date=PREFIX)
    #[arg(
        long,
        value_name = "PREFIX",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    date: Option<String>,
}

#[derive(Debug, Args)]
struct RuleArgs {
    #[command(flatten)]
    choice: RuleChoice,
    /// Replacement for stripped characters; empty deletes them
    #[arg(long, value_name = "CHAR")]
    replace: Option<String>,
    /// Keep runs of spaces and underscores as they are
    #[arg(long)]
    no_collapse: bool,
    #[arg(long, value_name = "N", default_value_t = 1)]
    start: u64,
    #[arg(long, value_name = "WIDTH")]
    padding: Option<usize>,
    /// Replacement template for --regex ($1, ${name} or \1)
    #[arg(long, value_name = "TEMPLATE", requires = "regex")]
    to: Option<String>,
    /// Match --regex against the full name, extension included
    #[arg(long, requires = "regex")]
    whole_name: bool,
    #[arg(long, value_name = "FMT")]
    date_format: Option<String>,
}

#[derive(Debug, Args)]
struct TraversalArgs {
    /// Descend into subfolders
    #[arg(short, long)]
    recursive: bool,
    /// Rename folders too
    #[arg(long)]
    dirs: bool,
    /// Leave files alone
    #[arg(long)]
    no_files: bool,
    /// Include entries whose name starts with a dot
    #[arg(long)]
    hidden: bool,
    /// Only rename files with this extension (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    process::exit(code);
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .build();
    if TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto).is_err() {
        eprintln!("warning: logger already initialised");
    }
}

fn run(cli: Cli) -> Result<i32> {
    // Runs before loading so a broken file can be replaced.
    if let Commands::Config(ConfigArgs {
        action: ConfigAction::Init { force },
    }) = &cli.command
    {
        let force = *force;
        return cmd_config_init(cli.config, force);
    }

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let journal = match &cli.journal {
        Some(path) => UndoJournal::at(path),
        None => UndoJournal::open_default()?,
    };

    match cli.command {
        Commands::Plan(args) => cmd_plan(args, &config, journal),
        Commands::Execute(args) => cmd_execute(args, &config, journal),
        Commands::Undo(args) => cmd_undo(args, journal),
        Commands::Config(args) => match args.action {
            ConfigAction::Show => cmd_config_show(&config, cli.config),
            ConfigAction::Path => cmd_config_path(cli.config),
            ConfigAction::Init { force } => cmd_config_init(cli.config, force),
        },
    }
}

fn cmd_plan(args: PlanArgs, config: &AppConfig, journal: UndoJournal) -> Result<i32> {
    let engine = Engine::new(journal);
    let request = PlanRequest {
        root: args.root,
        rule: build_rule(&args.rule, config)?,
        options: plan_options(&args.traversal, config),
    };
    let plan = engine.submit_plan(request)?.wait()?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Table => print_plan(&plan),
    }

    if let Some(path) = &args.save {
        save_plan(&plan, path)?;
        eprintln!("plan saved to {}", path.display());
    }
    eprintln!("dry run: nothing was renamed. Use `execute` to apply.");
    Ok(EXIT_OK)
}

fn cmd_execute(args: ExecuteArgs, config: &AppConfig, journal: UndoJournal) -> Result<i32> {
    let engine = Engine::new(journal);
    let plan = match (&args.plan, args.root) {
        (Some(file), _) => load_plan(file)?,
        (None, Some(root)) => {
            let request = PlanRequest {
                root,
                rule: build_rule(&args.rule, config)?,
                options: plan_options(&args.traversal, config),
            };
            engine.submit_plan(request)?.wait()?
        }
        (None, None) => anyhow::bail!("either ROOT or --plan is required"),
    };

    for issue in plan.issues() {
        eprintln!("skipped {}: {}", issue.path.display(), issue.message);
    }

    let policy = if args.continue_on_error {
        FailurePolicy::Continue
    } else {
        config.failure_policy()
    };
    let job = engine.submit_execute(plan, policy)?;
    let token = job.cancel_token();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\ncancelling after the current rename...");
        token.cancel();
    }) {
        log::warn!("cannot install Ctrl-C handler: {err}");
    }
    let report = job.wait()?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report.record)?),
        OutputFormat::Table => print_record(&report.record),
    }

    if let Some(err) = &report.journal_error {
        eprintln!("warning: this batch cannot be undone: {err}");
        return Ok(EXIT_FILESYSTEM);
    }
    if report.record.cancelled {
        return Ok(EXIT_CANCELLED);
    }
    Ok(match report.record.outcome() {
        BatchOutcome::Completed => EXIT_OK,
        BatchOutcome::Partial | BatchOutcome::Failed => EXIT_PARTIAL,
    })
}

fn cmd_undo(args: UndoArgs, journal: UndoJournal) -> Result<i32> {
    let engine = Engine::new(journal);
    let report = engine.submit_undo()?.wait()?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_undo(&report),
    }

    Ok(match report.outcome {
        UndoOutcome::FullyReverted => EXIT_OK,
        UndoOutcome::PartiallyReverted | UndoOutcome::Failed => EXIT_PARTIAL,
    })
}

fn cmd_config_show(config: &AppConfig, path: Option<PathBuf>) -> Result<i32> {
    let path = config_path(path)?;
    println!("# {}", path.display());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(EXIT_OK)
}

fn cmd_config_path(path: Option<PathBuf>) -> Result<i32> {
    println!("{}", config_path(path)?.display());
    Ok(EXIT_OK)
}

fn cmd_config_init(path: Option<PathBuf>, force: bool) -> Result<i32> {
    let target = config_path(path.clone())?;
    if target.exists() && !force {
        eprintln!(
            "config file already exists: {} (use --force to replace it)",
            target.display()
        );
        return Ok(EXIT_OTHER);
    }
    let defaults = AppConfig::default();
    match path {
        Some(path) => save_config_to(&defaults, &path)?,
        None => save_config(&defaults)?,
    }
    println!("wrote {}", target.display());
    Ok(EXIT_OK)
}

fn config_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Ok(app_paths()?.config_path),
    }
}

fn build_rule(args: &RuleArgs, config: &AppConfig) -> Result<RenameRule> {
    let choice = &args.choice;
    if let Some(prefix) = &choice.sequential {
        let prefix = if prefix.is_empty() {
            config.sequential_prefix.clone()
        } else {
            prefix.clone()
        };
        return Ok(RenameRule::Sequential {
            prefix,
            start: args.start,
            padding: args.padding.unwrap_or(config.sequential_padding),
        });
    }
    if let Some(pattern) = &choice.regex {
        return Ok(RenameRule::Regex {
            pattern: pattern.clone(),
            replacement: args.to.clone().unwrap_or_default(),
            whole_name: args.whole_name,
        });
    }
    if let Some(prefix) = &choice.date {
        return Ok(RenameRule::MetadataDate {
            prefix: prefix.clone(),
            format: args
                .date_format
                .clone()
                .unwrap_or_else(|| config.date_format.clone()),
        });
    }

    let replacement = args.replace.as_deref().unwrap_or(&config.replacement);
    Ok(RenameRule::StripReplace {
        bad_chars: choice
            .strip
            .clone()
            .unwrap_or_else(|| config.bad_chars.clone()),
        replacement: parse_replacement(replacement).map_err(EngineError::Validation)?,
        collapse_whitespace: config.collapse_whitespace && !args.no_collapse,
    })
}

/// Flags only ever widen what the config selects.
fn plan_options(args: &TraversalArgs, config: &AppConfig) -> PlanOptions {
    let mut options = config.plan_options();
    options.recursive |= args.recursive;
    options.include_directories |= args.dirs;
    options.include_hidden |= args.hidden;
    if args.no_files {
        options.include_files = false;
    }
    if !args.extensions.is_empty() {
        options.extensions = args.extensions.clone();
    }
    options
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(engine_err) = err.downcast_ref::<EngineError>() {
        return match engine_err {
            EngineError::Validation(_) => EXIT_VALIDATION,
            EngineError::RootNotFound(_)
            | EngineError::RootPermission(_)
            | EngineError::RootNotDirectory(_) => EXIT_FILESYSTEM,
            EngineError::NoHistory => EXIT_NO_HISTORY,
            EngineError::Busy => EXIT_BUSY,
            EngineError::NoPreviousPlan | EngineError::Worker => EXIT_OTHER,
        };
    }
    if err.downcast_ref::<RuleError>().is_some() {
        return EXIT_VALIDATION;
    }
    if err.chain().any(|cause| cause.is::<io::Error>()) {
        return EXIT_FILESYSTEM;
    }
    EXIT_OTHER
}

fn print_plan(plan: &RenamePlan) {
    println!("{}  [{}]", plan.root().display(), plan.rule().summary());
    for op in plan.ops() {
        let marker = match op.kind {
            EntryKind::Directory => "/",
            EntryKind::File => "",
        };
        let modified = op
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{}{marker} -> {}{marker}  {:>9}  {}",
            relative_to_root(plan, &op.source).display(),
            op.new_name,
            op.size_label(),
            modified
        );
    }
    for issue in plan.issues() {
        println!(
            "! {} ({:?}): {}",
            relative_to_root(plan, &issue.path).display(),
            issue.kind,
            issue.message
        );
    }

    let stats = plan.stats();
    println!(
        "\nsummary: scanned={} eligible={} planned={} unchanged={} filtered={} hidden={} issues={}",
        stats.scanned,
        stats.eligible,
        stats.planned,
        stats.unchanged,
        stats.skipped_filtered,
        stats.skipped_hidden,
        stats.issues
    );
}

fn print_record(record: &BatchRecord) {
    for entry in &record.entries {
        match &entry.status {
            OpStatus::Succeeded => println!(
                "renamed {} -> {}",
                entry.source.display(),
                entry.destination.display()
            ),
            OpStatus::Failed(reason) => {
                println!("FAILED  {}: {reason}", entry.source.display())
            }
            OpStatus::NotAttempted => println!("skipped {}", entry.source.display()),
        }
    }
    println!(
        "\nsummary: renamed={} failed={} not_attempted={}{}",
        record.succeeded_count(),
        record.failed_count(),
        record.not_attempted_count(),
        if record.cancelled { " (cancelled)" } else { "" }
    );
}

fn print_undo(report: &UndoReport) {
    for entry in &report.entries {
        match &entry.status {
            OpStatus::Succeeded => println!(
                "restored {} -> {}",
                entry.from.display(),
                entry.to.display()
            ),
            OpStatus::Failed(reason) => println!("FAILED   {}: {reason}", entry.from.display()),
            OpStatus::NotAttempted => println!("skipped  {}", entry.from.display()),
        }
    }
    println!(
        "\nsummary: restored={} failed={}",
        report.reverted_count(),
        report.failed_count()
    );
    if report.outcome == UndoOutcome::PartiallyReverted {
        eprintln!("the remaining items stay recorded; run `undo` again after fixing them");
    }
}
