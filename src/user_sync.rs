use crate::storage::{self, NewUser, User, UserUpdate};
use crate::types::{Role, Severity};
use miette::{IntoDiagnostic, Result};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::fs;

/// User definition from JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDefinition {
    /// Username (unique identifier)
    pub username: String,
    /// Plain text password, only used when the user is first created
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_classification")]
    pub alert_classification: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_role() -> Role {
    Role::Operator
}

fn default_classification() -> Severity {
    Severity::Critical
}

/// Root structure of the users JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersFile {
    pub users: Vec<UserDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Sync users from a JSON file to the database (idempotent)
pub async fn sync_users_from_file(db: &DatabaseConnection, file_path: &str) -> Result<SyncSummary> {
    tracing::info!("Loading users from {}", file_path);

    let content = fs::read_to_string(file_path)
        .into_diagnostic()
        .map_err(|e| miette::miette!("Failed to read users file at '{}': {}", file_path, e))?;

    let users_file: UsersFile = serde_json::from_str(&content)
        .into_diagnostic()
        .map_err(|e| {
            miette::miette!(
                "Failed to parse users JSON file: {}\n\nExpected format:\n{{\n  \"users\": [\n    {{\n      \"username\": \"maria\",\n      \"password\": \"initial-password\",\n      \"name\": \"Maria Souza\",\n      \"role\": \"manager\",\n      \"alertClassification\": \"warning\",\n      \"enabled\": true\n    }}\n  ]\n}}",
                e
            )
        })?;

    tracing::info!("Found {} user(s) in file", users_file.users.len());

    let mut summary = SyncSummary::default();
    for user_def in users_file.users {
        match sync_user(db, &user_def).await? {
            SyncResult::Created => summary.created += 1,
            SyncResult::Updated => summary.updated += 1,
            SyncResult::Unchanged => summary.unchanged += 1,
        }
    }

    tracing::info!(
        "User sync complete: {} created, {} updated, {} unchanged",
        summary.created,
        summary.updated,
        summary.unchanged
    );

    Ok(summary)
}

#[derive(Debug)]
enum SyncResult {
    Created,
    Updated,
    Unchanged,
}

/// Fields of `user_def` that differ from `existing`.
fn pending_changes(existing: &User, user_def: &UserDefinition) -> Option<UserUpdate> {
    let mut update = UserUpdate::default();
    let mut changed = false;

    if let Some(name) = &user_def.name {
        if &existing.name != name {
            update.name = Some(name.clone());
            changed = true;
        }
    }
    if existing.email != user_def.email {
        update.email = Some(user_def.email.clone());
        changed = true;
    }
    if existing.role != user_def.role {
        update.role = Some(user_def.role);
        changed = true;
    }
    if existing.alert_classification != user_def.alert_classification {
        update.alert_classification = Some(user_def.alert_classification);
        changed = true;
    }
    if existing.enabled != user_def.enabled {
        update.enabled = Some(user_def.enabled);
        changed = true;
    }

    changed.then_some(update)
}

/// Sync a single user (idempotent)
async fn sync_user(db: &DatabaseConnection, user_def: &UserDefinition) -> Result<SyncResult> {
    let existing = storage::get_user_by_username(db, &user_def.username).await?;

    let result = match existing {
        None => {
            tracing::info!("Creating user: {}", user_def.username);
            let user = storage::create_user(
                db,
                NewUser {
                    username: user_def.username.clone(),
                    password: user_def.password.clone(),
                    name: user_def.name.clone().unwrap_or_default(),
                    email: user_def.email.clone(),
                    role: user_def.role,
                    alert_classification: user_def.alert_classification,
                },
            )
            .await?;

            if !user_def.enabled {
                storage::update_user(
                    db,
                    &user.id,
                    UserUpdate {
                        enabled: Some(false),
                        ..Default::default()
                    },
                )
                .await?;
            }

            SyncResult::Created
        }
        Some(existing_user) => match pending_changes(&existing_user, user_def) {
            Some(update) => {
                tracing::info!("Updating user: {}", user_def.username);
                storage::update_user(db, &existing_user.id, update).await?;
                SyncResult::Updated
            }
            None => SyncResult::Unchanged,
        },
    };

    Ok(result)
}
