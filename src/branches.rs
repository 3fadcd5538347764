use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// A retail branch. The directory is read-only for this service.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
}

/// Read-only, ordered directory of branches with an explicitly configured
/// default branch. Initial stock and manual adjustments land on the default
/// branch; everything else treats branches uniformly.
#[derive(Debug, Clone)]
pub struct BranchDirectory {
    branches: Vec<Branch>,
    default_branch_id: Uuid,
}

impl BranchDirectory {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let branches = cfg
            .branches
            .iter()
            .map(|b| Branch {
                id: b.id,
                name: b.name.clone(),
                is_default: b.id == cfg.default_branch_id,
            })
            .collect();

        Self {
            branches,
            default_branch_id: cfg.default_branch_id,
        }
    }

    /// All branches, in configured order.
    pub fn all(&self) -> &[Branch] {
        &self.branches
    }

    pub fn get(&self, id: Uuid) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == id)
    }

    /// Like `get`, but produces the validation error stock operations report
    /// for unknown branch ids.
    pub fn require(&self, id: Uuid) -> Result<&Branch, ServiceError> {
        self.get(id)
            .ok_or_else(|| ServiceError::ValidationError(format!("Unknown branch: {}", id)))
    }

    pub fn default_branch(&self) -> &Branch {
        // Membership is validated at config load; the directory never changes
        // after that.
        self.branches
            .iter()
            .find(|b| b.id == self.default_branch_id)
            .expect("default branch is validated at startup")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BranchConfig;

    fn directory() -> BranchDirectory {
        let main = Uuid::new_v4();
        let second = Uuid::new_v4();
        let cfg = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "x".repeat(64),
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "test".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 5,
            db_acquire_timeout_secs: 5,
            event_channel_capacity: 16,
            branches: vec![
                BranchConfig {
                    id: main,
                    name: "Main".to_string(),
                },
                BranchConfig {
                    id: second,
                    name: "Branch2".to_string(),
                },
            ],
            default_branch_id: main,
        };
        BranchDirectory::from_config(&cfg)
    }

    #[test]
    fn default_branch_is_flagged() {
        let dir = directory();
        assert_eq!(dir.default_branch().name, "Main");
        assert!(dir.default_branch().is_default);
        assert_eq!(dir.all().len(), 2);
        assert!(!dir.all()[1].is_default);
    }

    #[test]
    fn require_unknown_branch_fails() {
        let dir = directory();
        assert!(dir.require(Uuid::new_v4()).is_err());
        assert!(dir.require(dir.default_branch().id).is_ok());
    }
}
