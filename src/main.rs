use anyhow::Result;
use clap::Parser;
use pm::config::RemoteConfig;
use std::path::PathBuf;
use std::time::Duration;

/// pm - minimal package manager
///
/// Publish a set of files as a versioned zip archive to a package
/// repository, and install the best matching versions of packages from it.
///
/// The repository is an SFTP server, an HTTP server (listing via a JSON
/// directory index, uploads via PUT) or a directory on a local or mounted
/// filesystem. Archives live in --remote-dir inside it (/packages by default).
///
/// Examples:
///   pm --repo sftp://deploy@build.example.com publish packet.yaml
///   pm --repo https://packages.example.com publish packet.yaml
///   pm --repo /mnt/share sync packages.json
///   pm --repo /mnt/share/packages --remote-dir / sync packages.json
#[derive(Parser, Debug)]
#[command(author, version = env!("PM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository URL (sftp://, http://, https://) or directory (also via PM_REPO)
    #[arg(
        long = "repo",
        short = 'r',
        env = "PM_REPO",
        value_name = "URL|DIR",
        global = true
    )]
    pub repo: Option<String>,

    /// Directory inside the repository holding the archives
    #[arg(
        long = "remote-dir",
        env = "PM_REMOTE_DIR",
        value_name = "DIR",
        default_value = RemoteConfig::DEFAULT_REMOTE_DIR,
        global = true
    )]
    pub remote_dir: String,

    /// User for SFTP login or HTTP basic authentication
    #[arg(long, short = 'u', env = "PM_USER", value_name = "USER", global = true)]
    pub user: Option<String>,

    /// Password for SFTP login or HTTP basic authentication
    #[arg(
        long,
        env = "PM_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub password: Option<String>,

    /// Seconds to wait for each repository operation
    #[arg(
        long,
        env = "PM_TIMEOUT",
        value_name = "SECS",
        default_value_t = RemoteConfig::DEFAULT_TIMEOUT_SECS,
        global = true
    )]
    pub timeout: u64,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Pack files and upload them as <name>-<version>.zip
    #[command(alias = "create")]
    Publish(PublishArgs),

    /// Download and unpack the best matching version of each package
    #[command(alias = "update")]
    Sync(SyncArgs),
}

#[derive(clap::Args, Debug)]
pub struct PublishArgs {
    /// Package configuration (JSON, or YAML with a .yaml/.yml extension)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Packages configuration (JSON, or YAML with a .yaml/.yml extension)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Directory to unpack into (defaults to the current directory)
    #[arg(long, short = 'd', value_name = "DIR")]
    pub dest: Option<PathBuf>,
}

impl Cli {
    fn remote_config(&self) -> Result<RemoteConfig> {
        let Some(endpoint) = &self.repo else {
            anyhow::bail!("No repository given. Use --repo or set PM_REPO.");
        };

        Ok(RemoteConfig {
            endpoint: endpoint.clone(),
            remote_dir: self.remote_dir.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            timeout: Duration::from_secs(self.timeout),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = pm::runtime::RealRuntime;
    let remote_config = cli.remote_config()?;

    match cli.command {
        Commands::Publish(args) => pm::commands::publish(runtime, &args.config, remote_config).await?,
        Commands::Sync(args) => {
            pm::commands::sync(runtime, &args.config, args.dest, remote_config).await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_publish_parsing() {
        let cli = Cli::try_parse_from(["pm", "--repo", "/srv/repo", "publish", "packet.yaml"])
            .unwrap();
        match &cli.command {
            Commands::Publish(args) => {
                assert_eq!(args.config, PathBuf::from("packet.yaml"));
            }
            _ => panic!("Expected Publish command"),
        }
        assert_eq!(cli.repo.as_deref(), Some("/srv/repo"));
        assert_eq!(cli.remote_dir, "/packages");
    }

    #[test]
    fn test_cli_create_alias() {
        let cli = Cli::try_parse_from(["pm", "create", "packet.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Publish(_)));
    }

    #[test]
    fn test_cli_sync_parsing() {
        let cli = Cli::try_parse_from([
            "pm",
            "sync",
            "packages.json",
            "--dest",
            "/opt/app",
            "--repo",
            "https://repo.example.com",
            "--timeout",
            "5",
        ])
        .unwrap();
        match &cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.config, PathBuf::from("packages.json"));
                assert_eq!(args.dest, Some(PathBuf::from("/opt/app")));
            }
            _ => panic!("Expected Sync command"),
        }

        let remote = cli.remote_config().unwrap();
        assert_eq!(remote.endpoint, "https://repo.example.com");
        assert_eq!(remote.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_cli_update_alias() {
        let cli = Cli::try_parse_from(["pm", "update", "packages.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Sync(_)));
    }

    #[test]
    fn test_cli_global_credentials() {
        let cli = Cli::try_parse_from([
            "pm",
            "--user",
            "deploy",
            "--password",
            "s3cret",
            "--repo",
            "https://repo.example.com",
            "publish",
            "packet.json",
        ])
        .unwrap();

        let remote = cli.remote_config().unwrap();
        assert_eq!(remote.user.as_deref(), Some("deploy"));
        assert_eq!(remote.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["pm", "packet.json"]);
        assert!(result.is_err());
    }
}
