// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use storyforge::app_config::{self, Config, ProviderKind};
use storyforge::app_controller::{Continuation, Controller};
use storyforge::export::ExportFormat;
use storyforge::file_utils::FileManager;

/// CLI Wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    Ollama,
    Together,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Ollama => ProviderKind::Ollama,
            CliProvider::Together => ProviderKind::Together,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for ExportFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliFormat {
    Pdf,
    Docx,
    Epub,
}

impl From<CliFormat> for ExportFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Pdf => ExportFormat::FlowDocument,
            CliFormat::Docx => ExportFormat::StructuredPackage,
            CliFormat::Epub => ExportFormat::ReflowablePackage,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring translated language variants up to date with the default language
    #[command(long_about = "Bring translated language variants up to date with the default language.

Every translated block of a loaded story is checked again: blocks whose source text is \
in the translation cache are filled from it, the rest are sent to the provider. Manual \
edits to translated text are replaced by the synchronized translation.

The cache is kept in a SQLite database between runs (sync.persist_cache, on by default; \
sync.cache_path overrides the location), so re-running translate on an unchanged story \
makes no provider calls.")]
    Translate(TranslateArgs),

    /// Export one language of a story as PDF, DOCX or EPUB
    Export(ExportArgs),

    /// Continue a story with generated text or an illustration
    Continue(ContinueArgs),

    /// Generate shell completions for storyforge
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Story file, or a directory of story files
    #[arg(value_name = "STORY")]
    story: PathBuf,

    /// Target language, by name or ISO code (repeatable)
    #[arg(short, long = "target")]
    targets: Vec<String>,

    /// Provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model name to use
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Story file
    #[arg(value_name = "STORY")]
    story: PathBuf,

    /// Output format
    #[arg(short, long, value_enum)]
    format: CliFormat,

    /// Language variant to export
    #[arg(short, long)]
    language: String,

    /// Output directory (defaults to the story's directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ContinueArgs {
    /// Story file
    #[arg(value_name = "STORY")]
    story: PathBuf,

    /// Page to extend
    #[arg(long, default_value_t = 0)]
    page: usize,

    /// What should happen next
    #[arg(long)]
    prompt: String,

    /// Generate an illustration instead of text
    #[arg(long)]
    image: bool,

    /// Provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,
}

/// Storyforge - multilingual illustrated story toolkit
#[derive(Parser, Debug)]
#[command(name = "storyforge")]
#[command(version)]
#[command(about = "Write, translate and export illustrated stories")]
#[command(long_about = "Storyforge keeps translated versions of a story in sync with its default language, \
continues stories with a language model and exports any language as PDF, DOCX or EPUB.

EXAMPLES:
    storyforge translate story.json -t French -t de   # Sync French and German
    storyforge translate stories/                     # Sync every story in a directory
    storyforge export story.json -f pdf -l French      # Write storybook_French.pdf
    storyforge continue story.json --prompt \"the fox finds a key\"
    storyforge completions bash > storyforge.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STORYFORGE_CONFIG", default_value = "conf.json")]
    config: String,

    /// Set logging level
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and emoji for log level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌ "),
            Level::Warn => ("\x1B[1;33m", "🚧 "),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "🔍 "),
            Level::Trace => ("\x1B[1;35m", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, emoji) = Self::decoration(record.level());
            let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", color, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "storyforge", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.into());
    }

    let mut config = Config::load_or_create(&cli.config)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    }
    apply_overrides(&mut config, &cli.command);
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.into());

    let controller = Controller::with_config(config)?;

    match cli.command {
        Commands::Translate(args) => run_translate(&controller, args).await,
        Commands::Export(args) => run_export(&controller, args).await,
        Commands::Continue(args) => run_continue(&controller, args).await,
        Commands::Completions { .. } => Ok(()),
    }
}

/// Apply command-line provider and model choices on top of the file values
fn apply_overrides(config: &mut Config, command: &Commands) {
    let (provider, model) = match command {
        Commands::Translate(args) => (args.provider.clone(), args.model.clone()),
        Commands::Continue(args) => (args.provider.clone(), None),
        _ => (None, None),
    };

    if let Some(provider) = provider {
        config.generation.provider = provider.into();
    }

    if let Some(model) = model {
        let kind = config.generation.provider;
        match config
            .generation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type.eq_ignore_ascii_case(kind.as_str()))
        {
            Some(provider_config) => provider_config.model = model,
            None => {
                let mut provider_config = app_config::ProviderConfig::new(kind);
                provider_config.model = model;
                config.generation.available_providers.push(provider_config);
            }
        }
    }
}

async fn run_translate(controller: &Controller, args: TranslateArgs) -> Result<()> {
    let stories = if args.story.is_dir() {
        FileManager::find_story_files(&args.story)?
    } else if args.story.is_file() {
        vec![args.story.clone()]
    } else {
        return Err(anyhow!("Story path does not exist: {:?}", args.story));
    };

    if stories.is_empty() {
        warn!("No story files found in {:?}", args.story);
        return Ok(());
    }

    let mut incomplete = 0;
    for story in &stories {
        info!("Translating {}", story.display());
        let report = controller.translate(story, &args.targets).await?;
        if !report.is_complete() {
            incomplete += 1;
        }
    }

    if incomplete > 0 {
        return Err(anyhow!("{} of {} story file(s) have untranslated blocks", incomplete, stories.len()));
    }
    Ok(())
}

async fn run_export(controller: &Controller, args: ExportArgs) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => args
            .story
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf(),
    };

    controller
        .export(&args.story, args.format.into(), &args.language, &output_dir)
        .await?;
    Ok(())
}

async fn run_continue(controller: &Controller, args: ContinueArgs) -> Result<()> {
    let kind = if args.image { Continuation::Image } else { Continuation::Text };
    controller.continue_story(&args.story, args.page, &args.prompt, kind).await?;
    Ok(())
}
