// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dialogue_transcoder::app_config::{self, Config, TranslationProvider};
use dialogue_transcoder::app_controller::Controller;
use dialogue_transcoder::build_gate::GateOutcome;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    Anthropic,
    Passthrough,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::Passthrough => TranslationProvider::Passthrough,
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

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the translated dataset (default command)
    Build,

    /// Generate shell completions for dialogue-transcoder
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// dialogue-transcoder - episode-scoped dataset translation
///
/// Translates the text fields of a dialogue dataset one episode at a time,
/// sending each distinct text once per episode.
#[derive(Parser, Debug)]
#[command(name = "dialogue-transcoder")]
#[command(version)]
#[command(about = "Episode-scoped translation of dialogue datasets")]
#[command(long_about = "dialogue-transcoder reads a delimited dialogue dataset split by split, groups rows into
episodes, translates every distinct text of an episode in one batch and writes the rows back
in their original order.

EXAMPLES:
    dialogue-transcoder                                   # Build using conf.json
    dialogue-transcoder --force                           # Rebuild even if already built
    dialogue-transcoder -p anthropic -m claude-3-5-haiku-latest
    dialogue-transcoder -s en -t de --output-dir data/de  # Translate into German
    dialogue-transcoder -p passthrough                    # Check escaping without a model
    dialogue-transcoder completions bash > dt.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    ollama      - Local Ollama server (default)
    anthropic   - Anthropic API (requires API key)
    passthrough - Identity transformation, no model")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config: PathBuf,

    /// Directory holding the source splits
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory the translated splits are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Rebuild even when the output is marked as built
    #[arg(short, long)]
    force: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color code for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "31",
            Level::Warn => "33",
            Level::Info => "32",
            Level::Debug => "36",
            Level::Trace => "35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[1;{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The level is narrowed once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "dialogue-transcoder", &mut std::io::stdout());
        return Ok(());
    }

    run_build(cli).await
}

async fn run_build(options: CommandLineOptions) -> Result<()> {
    let config = load_config(&options.config)?;
    let config = apply_overrides(config, &options);

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    let controller = Controller::with_config(config)?;

    let report = tokio::select! {
        report = controller.run(options.force) => report?,
        _ = tokio::signal::ctrl_c() => {
            return Err(anyhow!("Interrupted, nothing was committed"));
        }
    };

    match report.outcome {
        GateOutcome::Skipped => info!("Nothing to do (use --force to rebuild)"),
        GateOutcome::Built => {
            let elapsed: Duration = report.splits.iter().map(|split| split.elapsed).sum();
            info!(
                "Done: {} split(s), {} transform calls in {}",
                report.splits.len(),
                report.transform_calls(),
                Controller::format_duration(elapsed)
            );
        }
    }

    Ok(())
}

/// Load the configuration, writing the defaults first when the file is missing
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        return Config::from_file(path);
    }

    warn!("Config file not found at {:?}, creating default config.", path);
    let config = Config::default();
    config.save(path)?;
    Ok(config)
}

/// Command line values take precedence over the config file
fn apply_overrides(mut config: Config, options: &CommandLineOptions) -> Config {
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(source_language) = &options.source_language {
        config.source_language = source_language.clone();
    }
    if let Some(target_language) = &options.target_language {
        config.target_language = target_language.clone();
    }
    if let Some(input_dir) = &options.input_dir {
        config.dataset.input_dir = input_dir.clone();
    }
    if let Some(output_dir) = &options.output_dir {
        config.dataset.output_dir = output_dir.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
    config
}
