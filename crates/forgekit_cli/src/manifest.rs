//! Desired-state manifests for `forgekit reconcile`.
//!
//! ```toml
//! [[repositories]]
//! owner = "platform"        # organization; use `user = "alice"` for user repos
//! name = "infra"
//! description = "Infrastructure"
//! visibility = "private"
//! default_branch = "main"
//!
//!   [[repositories.deploy_keys]]
//!   name = "ci"
//!   key = "ssh-ed25519 AAAA..."
//!   read_only = true
//!
//!   [[repositories.team_access]]
//!   team = "ops"
//!   permission = "push"
//! ```

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};
use forgekit::platform::{
    DeployKeyInfo, OwnerRef, Permission, RepositoryInfo, RepositoryRef, TeamAccessInfo, Visibility,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest: {0}")]
    Load(#[from] config::ConfigError),
    #[error("repository `{name}` needs exactly one of `owner` or `user`")]
    Owner { name: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub repositories: Vec<RepositoryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryEntry {
    /// Organization (or project key / group path) owning the repository.
    #[serde(default)]
    pub owner: Option<String>,
    /// User account owning the repository.
    #[serde(default)]
    pub user: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub deploy_keys: Vec<DeployKeyEntry>,
    #[serde(default)]
    pub team_access: Vec<TeamAccessEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DeployKeyEntry {
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub read_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TeamAccessEntry {
    pub team: String,
    #[serde(default)]
    pub permission: Option<Permission>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let settings = ConfigBuilder::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn from_toml(content: &str) -> Result<Self, ManifestError> {
        let settings = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

impl RepositoryEntry {
    pub fn repository_ref(&self) -> Result<RepositoryRef, ManifestError> {
        let owner = match (&self.owner, &self.user) {
            (Some(org), None) => OwnerRef::organization(org.as_str()),
            (None, Some(login)) => OwnerRef::user(login.as_str()),
            _ => {
                return Err(ManifestError::Owner {
                    name: self.name.clone(),
                });
            }
        };
        Ok(RepositoryRef::new(owner, self.name.as_str()))
    }

    pub fn desired(&self) -> RepositoryInfo {
        RepositoryInfo {
            description: self.description.clone(),
            default_branch: self.default_branch.clone(),
            visibility: self.visibility,
        }
    }
}

impl DeployKeyEntry {
    pub fn desired(&self) -> DeployKeyInfo {
        DeployKeyInfo {
            key: self.key.clone(),
            read_only: self.read_only,
        }
    }
}

impl TeamAccessEntry {
    pub fn desired(&self) -> TeamAccessInfo {
        TeamAccessInfo {
            permission: self.permission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[repositories]]
        owner = "platform"
        name = "infra"
        description = "Infrastructure"
        visibility = "private"

          [[repositories.deploy_keys]]
          name = "ci"
          key = "ssh-ed25519 AAAA"
          read_only = true

          [[repositories.team_access]]
          team = "ops"
          permission = "push"

        [[repositories]]
        user = "alice"
        name = "dotfiles"
    "#;

    #[test]
    fn parses_nested_entries() {
        let manifest = Manifest::from_toml(SAMPLE).unwrap();
        assert_eq!(manifest.repositories.len(), 2);

        let infra = &manifest.repositories[0];
        assert_eq!(infra.desired().visibility, Some(Visibility::Private));
        assert_eq!(infra.desired().default_branch, None);
        assert_eq!(infra.deploy_keys[0].desired().read_only, Some(true));
        assert_eq!(
            infra.team_access[0].desired().permission,
            Some(Permission::Push)
        );
        assert_eq!(
            infra.repository_ref().unwrap().to_string(),
            "repository platform/infra"
        );

        let dotfiles = &manifest.repositories[1];
        assert!(dotfiles.deploy_keys.is_empty());
        assert!(!dotfiles.repository_ref().unwrap().owner.is_organization());
    }

    #[test]
    fn owner_must_be_unambiguous() {
        let manifest = Manifest::from_toml(
            r#"
            [[repositories]]
            owner = "platform"
            user = "alice"
            name = "infra"
            "#,
        )
        .unwrap();
        assert!(matches!(
            manifest.repositories[0].repository_ref(),
            Err(ManifestError::Owner { .. })
        ));
    }

    #[test]
    fn empty_manifest_has_no_repositories() {
        assert!(Manifest::from_toml("").unwrap().repositories.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Manifest::load(Path::new("/nonexistent/forgekit-manifest.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Load(_)));
    }
}
