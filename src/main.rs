use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use execfs::config::{self, ConfigStorage, ExecfsConfig, SavedConnection};
use execfs::{BlockingBrowser, SshConfig};

/// Password used when no key is given
const PASSWORD_ENV: &str = "EXECFS_PASSWORD";

/// execfs - browse and move files on a remote host over plain SSH exec
#[derive(Parser)]
#[command(name = "execfs")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # List a directory, directories end with /
    execfs -H web.example.com ls /var/www

    # Download and upload
    execfs -H web get /etc/nginx/nginx.conf ./nginx.conf
    execfs -H web put ./index.html /var/www

    # Run a quick action from ~/.execfs/config.json
    execfs -H web action restart-nginx")]
struct Cli {
    /// Host name, ~/.ssh/config alias or saved connection name
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Remote user (default: local user name)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Private key file; without it the password comes from EXECFS_PASSWORD
    #[arg(short = 'i', long, global = true)]
    key: Option<String>,

    /// Refuse hosts missing from ~/.ssh/known_hosts
    #[arg(long, global = true)]
    strict_host_key_checking: bool,

    /// Timeout in seconds for listings and commands (transfers have none)
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a remote directory
    Ls {
        /// Directory to list (default: configured root)
        path: Option<String>,

        /// Only show names containing this text (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Include dotfiles
        #[arg(short, long)]
        all: bool,
    },

    /// Download a remote file
    Get {
        remote: String,

        /// Local destination (default: remote file name in the current directory)
        local: Option<PathBuf>,
    },

    /// Upload a local file into a remote directory
    Put { local: PathBuf, remote_dir: String },

    /// Rename or move a remote file
    Mv { old: String, new: String },

    /// Run a command and relay its output and exit status
    Exec { command: String },

    /// Run a quick action, or list them when no name is given
    Action { name: Option<String> },
}

fn main() -> Result<ExitCode> {
    execfs::init_tracing();
    let cli = Cli::parse();

    let (app_config, ssh_hosts) = load_local_config(cli.config.clone())?;

    let Some(host) = cli.host.clone() else {
        if let Commands::Action { name: None } = cli.command {
            print_actions(&app_config);
            return Ok(ExitCode::SUCCESS);
        }
        bail!("no host given, use --host");
    };

    let ssh_config = resolve_ssh_config(&cli, &host, &app_config, &ssh_hosts)?;
    let mut settings = app_config.browser.clone();
    if cli.timeout.is_some() {
        settings.exec_timeout_secs = cli.timeout;
    }

    info!(
        "Connecting to {}@{}:{}",
        ssh_config.username, ssh_config.host, ssh_config.port
    );
    let mut browser = BlockingBrowser::connect(ssh_config, settings)
        .with_context(|| format!("Failed to connect to {}", host))?
        .with_quick_actions(&app_config.quick_actions);

    let code = run(&cli.command, &mut browser)?;
    browser.disconnect();
    Ok(code)
}

fn load_local_config(
    path: Option<PathBuf>,
) -> Result<(ExecfsConfig, Vec<config::SshConfigHost>)> {
    let storage = match path {
        Some(path) => ConfigStorage::with_path(path),
        None => ConfigStorage::new()?,
    };
    // Separate short-lived runtime; the browser brings its own
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let app_config = storage
            .load()
            .await
            .with_context(|| format!("Failed to load config from {}", storage.path().display()))?;
        let ssh_hosts = config::parse_ssh_config(None).await.unwrap_or_else(|e| {
            debug!("Ignoring ~/.ssh/config: {}", e);
            Vec::new()
        });
        Ok::<_, anyhow::Error>((app_config, ssh_hosts))
    })
}

/// Saved connection first, then ~/.ssh/config alias, then the literal host.
/// Command-line flags override whatever was found.
fn resolve_ssh_config(
    cli: &Cli,
    host: &str,
    app_config: &ExecfsConfig,
    ssh_hosts: &[config::SshConfigHost],
) -> Result<SshConfig> {
    let default_user = whoami::username();
    let mut target = if let Some(saved) = app_config.find_connection(host) {
        debug!("Using saved connection '{}'", saved.name);
        saved.clone()
    } else if let Some(alias) = config::find_host(ssh_hosts, host) {
        debug!("Using ~/.ssh/config entry '{}'", alias.alias);
        alias.to_connection(&default_user)
    } else {
        SavedConnection::new(host, default_user)
    };

    if let Some(port) = cli.port {
        target.port = port;
    }
    if let Some(user) = &cli.user {
        target.username = user.clone();
    }
    if let Some(key) = &cli.key {
        target.key_path = Some(key.clone());
    }

    let Some(mut ssh_config) = target.to_ssh_config(std::env::var(PASSWORD_ENV).ok()) else {
        bail!("no credentials: pass --key or set {}", PASSWORD_ENV);
    };
    ssh_config.strict_host_key_checking = cli.strict_host_key_checking;
    Ok(ssh_config)
}

fn run(command: &Commands, browser: &mut BlockingBrowser) -> Result<ExitCode> {
    match command {
        Commands::Ls { path, filter, all } => {
            browser.set_show_hidden(*all);
            let entries = match path {
                Some(path) => browser.open_directory(path)?,
                None => browser.refresh()?,
            };
            let shown = match filter {
                Some(term) => browser.search(term),
                None => entries,
            };
            let mut out = std::io::stdout().lock();
            for entry in shown {
                let marker = if entry.is_directory { "/" } else { "" };
                writeln!(out, "{}{}", entry.name, marker)?;
            }
        }
        Commands::Get { remote, local } => {
            let bytes = browser.fetch_file(remote)?;
            let local = match local {
                Some(local) => local.clone(),
                None => PathBuf::from(execfs::remote_fs::path_utils::remote_file_name(remote)),
            };
            std::fs::write(&local, &bytes)
                .with_context(|| format!("Failed to write {}", local.display()))?;
            info!("Saved {} bytes to {}", bytes.len(), local.display());
        }
        Commands::Put { local, remote_dir } => {
            let remote_path = browser.upload_local_file(local, remote_dir)?;
            println!("{}", remote_path);
        }
        Commands::Mv { old, new } => {
            browser.rename_file(old, new)?;
        }
        Commands::Exec { command } => {
            let result = browser.run_command(command)?;
            std::io::stdout().write_all(&result.stdout)?;
            std::io::stderr().write_all(&result.stderr)?;
            return Ok(exit_code(result.succeeded, result.exit_status));
        }
        Commands::Action { name: Some(name) } => {
            let result = browser.invoke_quick_action(name)?;
            std::io::stdout().write_all(&result.stdout)?;
            std::io::stderr().write_all(&result.stderr)?;
            return Ok(exit_code(result.succeeded, result.exit_status));
        }
        Commands::Action { name: None } => {
            for action in browser.quick_actions().list() {
                println!("{}\t{}", action.name, action.command);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_actions(app_config: &ExecfsConfig) {
    for action in &app_config.quick_actions {
        println!("{}\t{}", action.name, action.command);
    }
}

fn exit_code(succeeded: bool, status: Option<u32>) -> ExitCode {
    match (succeeded, status) {
        (true, _) => ExitCode::SUCCESS,
        (false, Some(status)) => ExitCode::from(u8::try_from(status).unwrap_or(u8::MAX)),
        (false, None) => ExitCode::FAILURE,
    }
}
