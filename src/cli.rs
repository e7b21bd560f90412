use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mirage", about = "Generative media experiences from the command line", version)]
pub struct Cli {
    /// JSON configuration file (defaults to ~/.config/mirage/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Forecast podcast with generated art for a location
    Weather(WeatherArgs),
    /// Researched documentary narration on a topic
    Research(TopicArgs),
    /// Vertical news short on a topic
    News(NewsArgs),
    /// Multi-part character story stitched into one video
    Story(StoryArgs),
    /// Manage the character portrait library
    Character {
        #[command(subcommand)]
        action: CharacterAction,
    },
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct RunFlags {
    /// Hide tool output
    #[arg(short, long)]
    pub silent: bool,
    /// Detach and log to the configured log file
    #[arg(short, long)]
    pub background: bool,
}

#[derive(Args, Debug)]
pub struct WeatherArgs {
    #[arg(short, long)]
    pub location: Option<String>,
    /// Also animate a background video
    #[arg(short, long)]
    pub video: bool,
    #[command(flatten)]
    pub flags: RunFlags,
}

#[derive(Args, Debug)]
pub struct TopicArgs {
    pub topic: String,
    #[arg(short, long)]
    pub video: bool,
    #[command(flatten)]
    pub flags: RunFlags,
}

#[derive(Args, Debug)]
pub struct NewsArgs {
    pub topic: String,
    #[command(flatten)]
    pub flags: RunFlags,
}

#[derive(Args, Debug)]
pub struct StoryArgs {
    pub topic: String,
    /// Protagonist from the character library
    #[arg(long, conflicts_with = "describe", required_unless_present = "describe")]
    pub character: Option<String>,
    /// Describe a new protagonist instead
    #[arg(long)]
    pub describe: Option<String>,
    /// Use this script instead of asking the planner
    #[arg(long)]
    pub script: Option<PathBuf>,
    #[command(flatten)]
    pub flags: RunFlags,
}

#[derive(Subcommand, Debug)]
pub enum CharacterAction {
    Add { name: String, image: PathBuf },
    Create { name: String, description: String },
    Remove { name: String },
    List,
}

impl Command {
    pub fn flags(&self) -> RunFlags {
        match self {
            Command::Weather(a) => a.flags,
            Command::Research(a) => a.flags,
            Command::News(a) => a.flags,
            Command::Story(a) => a.flags,
            Command::Character { .. } => RunFlags::default(),
        }
    }
}

/// The argument list with every background flag removed, ready to respawn.
/// Switch clusters like `-sb` keep their other letters.
pub fn foreground_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    for arg in args {
        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };
        if text == "--background" || text == "-b" {
            continue;
        }
        let is_switch_cluster = text.len() > 2
            && text.starts_with('-')
            && text[1..].chars().all(|c| matches!(c, 's' | 'v' | 'b'));
        if is_switch_cluster && text.contains('b') {
            let kept: String = text[1..].chars().filter(|c| *c != 'b').collect();
            out.push(OsString::from(format!("-{}", kept)));
            continue;
        }
        out.push(arg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn story_requires_exactly_one_character_source() {
        assert!(Cli::try_parse_from(["mirage", "story", "ghosts"]).is_err());
        assert!(
            Cli::try_parse_from(["mirage", "story", "ghosts", "--character", "ava", "--describe", "x"])
                .is_err()
        );
        let cli = Cli::try_parse_from(["mirage", "story", "ghosts", "--describe", "a pirate", "-s"]).unwrap();
        match cli.command {
            Command::Story(a) => {
                assert_eq!(a.describe.as_deref(), Some("a pirate"));
                assert!(a.flags.silent);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn weather_flags_parse() {
        let cli = Cli::try_parse_from(["mirage", "weather", "-l", "Oslo", "-v", "-b"]).unwrap();
        match cli.command {
            Command::Weather(a) => {
                assert_eq!(a.location.as_deref(), Some("Oslo"));
                assert!(a.video);
                assert!(a.flags.background);
                assert!(!a.flags.silent);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn background_flags_are_removed_for_respawn() {
        assert_eq!(
            foreground_args(os(&["mirage", "news", "Mars", "-b", "--background", "-s"])),
            os(&["mirage", "news", "Mars", "-s"])
        );
        assert_eq!(
            foreground_args(os(&["mirage", "weather", "-vb"])),
            os(&["mirage", "weather", "-v"])
        );
    }
}
