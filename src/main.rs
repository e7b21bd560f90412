use anyhow::{Context, Result};
use clap::Parser;
use mirage::characters::CharacterLibrary;
use mirage::cli::{self, CharacterAction, Cli, Command};
use mirage::config::Config;
use mirage::error::ToolFailure;
use mirage::gateway::ProcessRunner;
use mirage::init;
use mirage::planner::StoryPlanner;
use mirage::story::{self, CharacterSource, ScriptSource, StoryOptions};
use mirage::workflows::{self, TopicOptions, WeatherOptions};
use std::fs::OpenOptions;
use std::process::Stdio;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let outcome = tokio::select! {
        res = run(cli) => res,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nOperation cancelled by user.");
            std::process::exit(130);
        }
    };

    if let Err(err) = outcome {
        report(&err);
        std::process::exit(1);
    }
}

fn report(err: &anyhow::Error) {
    eprintln!("[ERROR] {:#}", err);
    let failure = err.chain().find_map(|e| e.downcast_ref::<ToolFailure>());
    if let Some(failure) = failure {
        if let Some(out) = failure.captured_stdout().filter(|s| !s.trim().is_empty()) {
            eprintln!("--- stdout ---\n{}", out.trim_end());
        }
        if let Some(errout) = failure.captured_stderr().filter(|s| !s.trim().is_empty()) {
            eprintln!("--- stderr ---\n{}", errout.trim_end());
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = Config::resolve(cli.config.as_deref()).await?;
    init::ensure_directories(&cfg).await?;

    if cli.command.flags().background {
        return detach(&cfg);
    }

    let runner = ProcessRunner;

    match cli.command {
        Command::Weather(args) => {
            let opts = WeatherOptions {
                location: args.location.unwrap_or_else(|| cfg.default_location.clone()),
                silent: args.flags.silent,
                video: args.video,
            };
            workflows::run_weather(&cfg, &runner, &opts).await?;
        }
        Command::Research(args) => {
            let opts = TopicOptions {
                topic: args.topic,
                silent: args.flags.silent,
                video: args.video,
            };
            workflows::run_research(&cfg, &runner, &opts).await?;
        }
        Command::News(args) => {
            if !init::check_ffmpeg(&cfg, &runner).await {
                eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
            }
            let opts = TopicOptions {
                topic: args.topic,
                silent: args.flags.silent,
                video: true,
            };
            workflows::run_news(&cfg, &runner, &opts).await?;
        }
        Command::Story(args) => {
            if !init::check_ffmpeg(&cfg, &runner).await {
                eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
            }
            let character = match (args.character, args.describe) {
                (Some(name), _) => CharacterSource::Library(name),
                (None, Some(desc)) => CharacterSource::Describe(desc),
                (None, None) => anyhow::bail!("story needs --character or --describe"),
            };
            let script = match args.script {
                Some(path) => ScriptSource::File(path),
                None => ScriptSource::Planner(StoryPlanner::from_config(&cfg)?),
            };
            let opts = StoryOptions {
                topic: args.topic,
                character,
                script,
                silent: args.flags.silent,
            };
            story::run_story(&cfg, &runner, opts).await?;
        }
        Command::Character { action } => {
            let library = CharacterLibrary::new(&cfg.library_dir);
            match action {
                CharacterAction::Add { name, image } => {
                    library.add(&name, &image).await?;
                }
                CharacterAction::Create { name, description } => {
                    library.create(&cfg, &runner, &name, &description, false).await?;
                }
                CharacterAction::Remove { name } => {
                    if !library.remove(&name).await? {
                        println!("No character named '{}'", name);
                    }
                }
                CharacterAction::List => {
                    let names = library.list()?;
                    if names.is_empty() {
                        println!("No characters in {}", library.dir().display());
                    }
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Re-run this invocation detached, logging to the configured file.
fn detach(cfg: &Config) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the mirage executable")?;
    let args: Vec<_> = cli::foreground_args(std::env::args_os().skip(1));

    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.log_file)
        .with_context(|| format!("Failed to open log file {}", cfg.log_file.display()))?;
    let log_err = log.try_clone()?;

    let mut cmd = std::process::Command::new(exe);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn().context("Failed to start background process")?;
    println!(
        "Running in background (pid {}). Logs: {}",
        child.id(),
        cfg.log_file.display()
    );
    Ok(())
}
