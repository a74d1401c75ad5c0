use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "wpm", about = "Install and uninstall package versions")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Delay of every simulated step in milliseconds.
    #[arg(long, default_value_t = 150, global = true)]
    pub step_ms: u64,

    /// Make the named package fail with "disk full" (exercises error reporting).
    #[arg(long, global = true)]
    pub fail: Option<String>,

    /// Hide the progress spinner and print plain status lines instead.
    #[arg(long, global = true)]
    pub plain: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PackageArgs {
    /// Package name, optionally `name@version`.
    pub package: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ProcessArgs {
    /// Packages to install, `name@version`.
    #[arg(long = "install", action = clap::ArgAction::Append)]
    pub install: Vec<String>,

    /// Packages to uninstall, `name@version`.
    #[arg(long = "uninstall", action = clap::ArgAction::Append)]
    pub uninstall: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Install(PackageArgs),
    Uninstall(PackageArgs),
    /// Uninstall then install several packages as one job.
    Process(ProcessArgs),
    /// Reload the package repositories and list every version.
    Reload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_with_globals() {
        let args = Args::parse_from(["wpm", "install", "git@2.45", "--fail", "git", "--plain"]);
        assert!(args.plain);
        assert_eq!(args.fail.as_deref(), Some("git"));
        match args.command {
            Commands::Install(p) => assert_eq!(p.package, "git@2.45"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_process_collects_repeated_flags() {
        let args = Args::parse_from([
            "wpm",
            "process",
            "--uninstall",
            "old@1",
            "--install",
            "a@1",
            "--install",
            "b@2",
        ]);
        match args.command {
            Commands::Process(p) => {
                assert_eq!(p.install, vec!["a@1", "b@2"]);
                assert_eq!(p.uninstall, vec!["old@1"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
