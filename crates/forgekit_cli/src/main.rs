//! forgekit CLI - reconcile and inspect resources on git hosting servers.

mod backend;
mod commands;
mod config;
mod manifest;
mod shutdown;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::Term;
use forgekit::CancelToken;
use forgekit::platform::{MergeMethod, OwnerRef, RepositoryRef};
use tracing_subscriber::EnvFilter;

use crate::backend::{Backend, with_backend};
use crate::commands::output::OutputFormat;

#[derive(Parser)]
#[command(name = "forgekit")]
#[command(version)]
#[command(about = "Declarative management of git hosting resources")]
#[command(
    long_about = "forgekit drives repositories, deploy keys and team access on GitHub, \
GitLab and Bitbucket Server (Stash) to the state described in a manifest, and \
inspects branches, commits, pull requests, organizations, users and teams."
)]
#[command(after_long_help = r#"EXAMPLES
    Preview a manifest against GitHub:
        $ forgekit -p github reconcile repos.toml --dry-run

    Apply it:
        $ forgekit -p github reconcile repos.toml

    List repositories of a GitLab group:
        $ forgekit -p gitlab repo list platform/infra

    Squash-merge a pull request on a Stash server:
        $ forgekit -p stash -H https://git.example.com pr merge PROJ/api 42 --method squash

    Generate shell completions:
        $ forgekit completions bash > ~/.local/share/bash-completion/completions/forgekit

CONFIGURATION
    forgekit reads configuration from:
      1. ~/.config/forgekit/config.toml (or $XDG_CONFIG_HOME/forgekit/config.toml)
      2. ./forgekit.toml
      3. Environment variables (FORGEKIT_* prefix, e.g., FORGEKIT_PROVIDER_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    FORGEKIT_PROVIDER_KIND     Backend: github, gitlab or stash
    FORGEKIT_PROVIDER_HOST     Server URL (defaults to the public host when one exists)
    FORGEKIT_PROVIDER_TOKEN    Access token
    RUST_LOG                   Log filter when output is not a terminal
"#)]
struct Cli {
    /// Backend to talk to (github, gitlab, stash); overrides config
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Server URL; overrides config
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive every resource in a manifest to its desired state
    Reconcile {
        /// Path to the manifest (TOML)
        manifest: PathBuf,

        /// Dry run - show what would change without writing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Repository operations
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },
    /// Deploy key lookups
    DeployKey {
        #[command(subcommand)]
        action: DeployKeyAction,
    },
    /// Team access lookups
    TeamAccess {
        #[command(subcommand)]
        action: TeamAccessAction,
    },
    /// Branch lookups
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },
    /// Commit lookups
    Commit {
        #[command(subcommand)]
        action: CommitAction,
    },
    /// Pull request (merge request) operations
    Pr {
        #[command(subcommand)]
        action: PrAction,
    },
    /// Organization (group, project) lookups
    Org {
        #[command(subcommand)]
        action: OrgAction,
    },
    /// User lookups
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Team lookups
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// A repository as `OWNER/NAME`.
#[derive(Debug, Clone, Args)]
struct RepoArgs {
    /// Repository as OWNER/NAME (the owner may be a nested group path)
    repo: String,

    /// The owner is a user rather than an organization
    #[arg(short, long)]
    user: bool,
}

impl RepoArgs {
    /// Split at the last `/` so nested GitLab groups stay in the owner.
    fn to_ref(&self) -> Result<RepositoryRef, String> {
        match self.repo.rsplit_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Ok(RepositoryRef::new(owner_ref(owner, self.user), name))
            }
            _ => Err(format!(
                "Invalid repository '{}': expected OWNER/NAME",
                self.repo
            )),
        }
    }
}

#[derive(Debug, Clone, Args)]
struct OwnerArgs {
    /// Organization path or user login
    owner: String,

    /// The owner is a user rather than an organization
    #[arg(short, long)]
    user: bool,
}

impl OwnerArgs {
    fn to_ref(&self) -> OwnerRef {
        owner_ref(&self.owner, self.user)
    }
}

fn owner_ref(owner: &str, user: bool) -> OwnerRef {
    if user {
        OwnerRef::user(owner)
    } else {
        OwnerRef::organization(owner)
    }
}

#[derive(Subcommand)]
enum RepoAction {
    /// Show one repository
    Get {
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// List repositories of an owner
    List {
        #[command(flatten)]
        owner: OwnerArgs,
    },
    /// Delete a repository
    Delete {
        #[command(flatten)]
        repo: RepoArgs,

        /// Succeed when the repository is already gone
        #[arg(long)]
        if_exists: bool,
    },
}

#[derive(Subcommand)]
enum DeployKeyAction {
    /// Show one deploy key by name
    Get {
        #[command(flatten)]
        repo: RepoArgs,
        name: String,
    },
    /// List deploy keys of a repository
    List {
        #[command(flatten)]
        repo: RepoArgs,
    },
}

#[derive(Subcommand)]
enum TeamAccessAction {
    /// Show one team's access to a repository
    Get {
        #[command(flatten)]
        repo: RepoArgs,
        team: String,
    },
    /// List teams with access to a repository
    List {
        #[command(flatten)]
        repo: RepoArgs,
    },
}

#[derive(Subcommand)]
enum BranchAction {
    /// Show one branch
    Get {
        #[command(flatten)]
        repo: RepoArgs,
        name: String,
    },
    /// List branches of a repository
    List {
        #[command(flatten)]
        repo: RepoArgs,
    },
}

#[derive(Subcommand)]
enum CommitAction {
    /// Show one commit
    Get {
        #[command(flatten)]
        repo: RepoArgs,
        sha: String,
    },
    /// List the history of a branch, newest first
    List {
        #[command(flatten)]
        repo: RepoArgs,

        /// Branch whose history to list
        #[arg(short, long)]
        branch: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MergeArg {
    Merge,
    Squash,
    Rebase,
}

impl From<MergeArg> for MergeMethod {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Merge => MergeMethod::Merge,
            MergeArg::Squash => MergeMethod::Squash,
            MergeArg::Rebase => MergeMethod::Rebase,
        }
    }
}

#[derive(Subcommand)]
enum PrAction {
    /// Show one pull request
    Get {
        #[command(flatten)]
        repo: RepoArgs,
        number: u64,
    },
    /// List pull requests in every state
    List {
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// Merge a pull request
    Merge {
        #[command(flatten)]
        repo: RepoArgs,
        number: u64,

        /// Merge strategy
        #[arg(short, long, value_enum, default_value_t = MergeArg::Merge)]
        method: MergeArg,

        /// Commit message for the merge or squash commit
        #[arg(long)]
        message: Option<String>,
    },
}

#[derive(Subcommand)]
enum OrgAction {
    /// Show one organization
    Get { org: String },
    /// List organizations visible to the token
    List,
}

#[derive(Subcommand)]
enum UserAction {
    /// Show one user
    Get { login: String },
    /// List users
    List,
}

#[derive(Subcommand)]
enum TeamAction {
    /// Show one team
    Get { org: String, team: String },
    /// List teams of an organization
    List { org: String },
    /// List members of a team
    Members { org: String, team: String },
    /// Show one member of a team
    Member {
        org: String,
        team: String,
        login: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logs only when stdout is not a terminal
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("forgekit=info,forgekit_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        commands::meta::handle_completions(*shell)?;
        return Ok(());
    }

    // Load configuration (config files -> env vars -> defaults), then flags
    let config = config::Config::load().with_overrides(cli.provider, cli.host);
    let provider_config = config.provider_config()?;
    let backend = Backend::connect(&provider_config).await?;

    let cancel = CancelToken::new();
    shutdown::cancel_on_ctrl_c(cancel.clone());

    let format = cli.output;
    with_backend!(&backend, provider => {
        commands::run(provider, cli.command, &cancel, &config, format).await
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn repo_args(repo: &str, user: bool) -> RepoArgs {
        RepoArgs {
            repo: repo.to_string(),
            user,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repo_splits_at_last_slash() {
        let r = repo_args("platform/infra/tools", false).to_ref().unwrap();
        assert_eq!(r.owner, OwnerRef::organization("platform/infra"));
        assert_eq!(r.name, "tools");
    }

    #[test]
    fn user_flag_selects_user_owner() {
        let r = repo_args("alice/dotfiles", true).to_ref().unwrap();
        assert_eq!(r.owner, OwnerRef::user("alice"));
    }

    #[test]
    fn repo_without_owner_is_rejected() {
        assert!(repo_args("dotfiles", false).to_ref().is_err());
        assert!(repo_args("/dotfiles", false).to_ref().is_err());
        assert!(repo_args("alice/", false).to_ref().is_err());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "forgekit", "repo", "list", "acme", "-p", "gitlab", "-o", "json",
        ])
        .unwrap();
        assert_eq!(cli.provider.as_deref(), Some("gitlab"));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Repo {
                action: RepoAction::List { .. }
            }
        ));
    }

    #[test]
    fn merge_method_defaults_to_merge() {
        let cli =
            Cli::try_parse_from(["forgekit", "pr", "merge", "acme/api", "7", "--message", "ok"])
                .unwrap();
        match cli.command {
            Commands::Pr {
                action:
                    PrAction::Merge {
                        number,
                        method,
                        message,
                        ..
                    },
            } => {
                assert_eq!(number, 7);
                assert_eq!(MergeMethod::from(method), MergeMethod::Merge);
                assert_eq!(message.as_deref(), Some("ok"));
            }
            _ => panic!("expected pr merge"),
        }
    }
}
