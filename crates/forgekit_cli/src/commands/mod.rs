pub(crate) mod meta;
pub(crate) mod output;
pub(crate) mod reconcile;
pub(crate) mod show;

use forgekit::CancelToken;
use forgekit::platform::{
    CommitHistoryRef, GitProvider, OrganizationRef, ProviderRoot, PullRequestApi, TeamMembersApi,
    TeamRef, UserRef,
};

use crate::config::Config;
use crate::manifest::Manifest;
use crate::{
    BranchAction, Commands, CommitAction, DeployKeyAction, OrgAction, PrAction, RepoAction,
    TeamAccessAction, TeamAction, UserAction,
};
use output::{ObjectRow, OutputFormat, print_rows};
use reconcile::{ReconcileOptions, reconcile_manifest};

pub(crate) type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Run one provider-bound command.
pub(crate) async fn run<P: GitProvider>(
    provider: &P,
    command: Commands,
    cancel: &CancelToken,
    config: &Config,
    format: OutputFormat,
) -> CmdResult {
    match command {
        Commands::Reconcile { manifest, dry_run } => {
            let manifest = Manifest::load(&manifest)?;
            let options = ReconcileOptions {
                dry_run,
                retry: config.reconcile.retry(),
            };
            let deadline = tokio::time::Instant::now() + config.reconcile.deadline();
            let run_token = cancel.child_with_deadline(deadline);

            let rows = reconcile_manifest(provider, &run_token, &manifest, &options).await;
            print_rows(&rows, format)?;

            let failed = rows.iter().filter(|row| row.is_failure()).count();
            if failed > 0 {
                return Err(format!("{failed} of {} resources failed", rows.len()).into());
            }
        }
        Commands::Repo { action } => handle_repo(provider, action, cancel, format).await?,
        Commands::DeployKey { action } => match action {
            DeployKeyAction::List { repo } => {
                show::print_list(provider.deploy_keys(), cancel, &repo.to_ref()?, format).await?
            }
            DeployKeyAction::Get { repo, name } => {
                let r = repo.to_ref()?.deploy_key(name);
                show::print_one(provider.deploy_keys(), cancel, &r, format).await?
            }
        },
        Commands::TeamAccess { action } => match action {
            TeamAccessAction::List { repo } => {
                show::print_list(provider.team_access(), cancel, &repo.to_ref()?, format).await?
            }
            TeamAccessAction::Get { repo, team } => {
                let r = repo.to_ref()?.team_access(team);
                show::print_one(provider.team_access(), cancel, &r, format).await?
            }
        },
        Commands::Branch { action } => match action {
            BranchAction::List { repo } => {
                show::print_list(provider.branches(), cancel, &repo.to_ref()?, format).await?
            }
            BranchAction::Get { repo, name } => {
                let r = repo.to_ref()?.branch(name);
                show::print_one(provider.branches(), cancel, &r, format).await?
            }
        },
        Commands::Commit { action } => match action {
            CommitAction::List { repo, branch } => {
                let history = CommitHistoryRef {
                    branch: repo.to_ref()?.branch(branch),
                };
                show::print_list(provider.commits(), cancel, &history, format).await?
            }
            CommitAction::Get { repo, sha } => {
                let r = repo.to_ref()?.commit(sha);
                show::print_one(provider.commits(), cancel, &r, format).await?
            }
        },
        Commands::Pr { action } => handle_pr(provider, action, cancel, format).await?,
        Commands::Org { action } => match action {
            OrgAction::List => {
                show::print_list(provider.organizations(), cancel, &ProviderRoot, format).await?
            }
            OrgAction::Get { org } => {
                let r = OrganizationRef::new(org);
                show::print_one(provider.organizations(), cancel, &r, format).await?
            }
        },
        Commands::User { action } => match action {
            UserAction::List => {
                show::print_list(provider.users(), cancel, &ProviderRoot, format).await?
            }
            UserAction::Get { login } => {
                show::print_one(provider.users(), cancel, &UserRef::new(login), format).await?
            }
        },
        Commands::Team { action } => handle_team(provider, action, cancel, format).await?,
        // Handled before a backend is connected.
        Commands::Completions { .. } => {}
    }
    Ok(())
}

async fn handle_repo<P: GitProvider>(
    provider: &P,
    action: RepoAction,
    cancel: &CancelToken,
    format: OutputFormat,
) -> CmdResult {
    let repos = provider.repositories();
    match action {
        RepoAction::List { owner } => {
            show::print_list(repos, cancel, &owner.to_ref(), format).await?
        }
        RepoAction::Get { repo } => show::print_one(repos, cancel, &repo.to_ref()?, format).await?,
        RepoAction::Delete { repo, if_exists } => {
            let r = repo.to_ref()?;
            if if_exists {
                if !repos.delete_if_exists(cancel, &r).await? {
                    println!("{r} does not exist");
                    return Ok(());
                }
            } else {
                repos.delete(cancel, &r).await?;
            }
            tracing::info!(repository = %r, "Deleted");
            println!("Deleted {r}");
        }
    }
    Ok(())
}

async fn handle_pr<P: GitProvider>(
    provider: &P,
    action: PrAction,
    cancel: &CancelToken,
    format: OutputFormat,
) -> CmdResult {
    let pulls = provider.pull_requests();
    match action {
        PrAction::List { repo } => show::print_list(pulls, cancel, &repo.to_ref()?, format).await?,
        PrAction::Get { repo, number } => {
            let r = repo.to_ref()?.pull_request(number);
            show::print_one(pulls, cancel, &r, format).await?
        }
        PrAction::Merge {
            repo,
            number,
            method,
            message,
        } => {
            let r = repo.to_ref()?.pull_request(number);
            let merged = pulls
                .api()
                .merge(cancel, &r, method.into(), message.as_deref())
                .await?;
            tracing::info!(pull_request = %r, "Merged");
            print_rows(&[ObjectRow::from_object(&merged)], format)?;
        }
    }
    Ok(())
}

async fn handle_team<P: GitProvider>(
    provider: &P,
    action: TeamAction,
    cancel: &CancelToken,
    format: OutputFormat,
) -> CmdResult {
    let teams = provider.teams();
    match action {
        TeamAction::List { org } => {
            show::print_list(teams, cancel, &OrganizationRef::new(org), format).await?
        }
        TeamAction::Get { org, team } => {
            let r = TeamRef::new(OrganizationRef::new(org), team);
            show::print_one(teams, cancel, &r, format).await?
        }
        TeamAction::Members { org, team } => {
            let r = TeamRef::new(OrganizationRef::new(org), team);
            let members = teams.api().list_members(cancel, &r).await?;
            show::print_members(&members, format)?
        }
        TeamAction::Member { org, team, login } => {
            let r = TeamRef::new(OrganizationRef::new(org), team);
            let member = teams
                .api()
                .get_member(cancel, &r, &UserRef::new(login))
                .await?;
            show::print_members(&[member], format)?
        }
    }
    Ok(())
}
