use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One run of a scheduled or manually triggered background job.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_executions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub job_name: String, // "mark_stale_devices_offline" | "purge_old_access_logs"
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub success: Option<i64>, // NULL while running
    pub error_message: Option<String>,
    pub records_processed: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
