//! Read-only aggregates for the dashboard landing page.
//!
//! Every figure is a plain count over the live tables; nothing is cached.
//! "Today" means since midnight UTC.

use crate::entities;
use crate::errors::LavError;
use crate::storage::{self, AccessLog, AccessLogFilter, Alert, AlertFilter};
use crate::types::{ClientStatus, DeviceStatus, Severity, StoreStatus};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_STATS_DAYS: u32 = 7;
pub const MAX_STATS_DAYS: u32 = 90;
pub const DEFAULT_ACTIVITY_LIMIT: u64 = 10;
pub const MAX_ACTIVITY_LIMIT: u64 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub stores: StoreTotals,
    pub devices: DeviceTotals,
    pub clients: ClientTotals,
    pub alerts: AlertTotals,
    pub accesses_today: AccessTotals,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTotals {
    pub total: u64,
    pub active: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTotals {
    pub total: u64,
    pub online: u64,
    pub offline: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTotals {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub blocked: u64,
    pub vip: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTotals {
    pub active: u64,
    pub critical: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessTotals {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    /// `YYYY-MM-DD`
    pub date: String,
    pub successful: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOverview {
    pub store_id: i32,
    pub name: String,
    pub code: String,
    pub status: StoreStatus,
    pub devices_online: u64,
    pub devices_offline: u64,
    pub active_alerts: u64,
    pub accesses_today: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub access_logs: Vec<AccessLog>,
    pub alerts: Vec<Alert>,
}

fn start_of_day(at: DateTime<Utc>) -> i64 {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp())
        .unwrap_or_else(|| at.timestamp())
}

pub async fn summary(db: &DatabaseConnection) -> Result<Summary, LavError> {
    summary_at(db, Utc::now()).await
}

pub async fn summary_at(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<Summary, LavError> {
    use entities::{access_log, alert, client, device, store};

    let stores = StoreTotals {
        total: store::Entity::find().count(db).await?,
        active: store::Entity::find()
            .filter(store::Column::Status.eq(StoreStatus::Active.as_str()))
            .count(db)
            .await?,
    };

    let online = device::Entity::find()
        .filter(device::Column::Status.eq(DeviceStatus::Online.as_str()))
        .count(db)
        .await?;
    let device_total = device::Entity::find().count(db).await?;
    let devices = DeviceTotals {
        total: device_total,
        online,
        offline: device_total.saturating_sub(online),
    };

    let client_count = |status: ClientStatus| {
        client::Entity::find()
            .filter(client::Column::Status.eq(status.as_str()))
            .count(db)
    };
    let clients = ClientTotals {
        total: client::Entity::find().count(db).await?,
        active: client_count(ClientStatus::Active).await?,
        inactive: client_count(ClientStatus::Inactive).await?,
        blocked: client_count(ClientStatus::Blocked).await?,
        vip: client_count(ClientStatus::Vip).await?,
    };

    let alerts = AlertTotals {
        active: alert::Entity::find()
            .filter(alert::Column::Resolved.eq(0))
            .count(db)
            .await?,
        critical: alert::Entity::find()
            .filter(alert::Column::Resolved.eq(0))
            .filter(alert::Column::Severity.eq(Severity::Critical.as_str()))
            .count(db)
            .await?,
    };

    let since = start_of_day(now);
    let successful = access_log::Entity::find()
        .filter(access_log::Column::CreatedAt.gte(since))
        .filter(access_log::Column::Success.eq(1))
        .count(db)
        .await?;
    let total = access_log::Entity::find()
        .filter(access_log::Column::CreatedAt.gte(since))
        .count(db)
        .await?;

    Ok(Summary {
        stores,
        devices,
        clients,
        alerts,
        accesses_today: AccessTotals {
            total,
            successful,
            failed: total.saturating_sub(successful),
        },
    })
}

pub fn clamp_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, MAX_STATS_DAYS)
}

/// Successful and failed accesses per UTC day, oldest first. Days without
/// activity are present with zero counts.
pub async fn access_stats(db: &DatabaseConnection, days: u32) -> Result<Vec<DayStats>, LavError> {
    access_stats_at(db, days, Utc::now()).await
}

pub async fn access_stats_at(
    db: &DatabaseConnection,
    days: u32,
    now: DateTime<Utc>,
) -> Result<Vec<DayStats>, LavError> {
    use entities::access_log::{Column, Entity};

    let days = clamp_days(Some(days));
    let today = now.date_naive();
    let first_day = today - Duration::days(i64::from(days) - 1);
    let since = start_of_day(now) - (i64::from(days) - 1) * 86_400;

    let mut buckets: BTreeMap<NaiveDate, (u64, u64)> = first_day
        .iter_days()
        .take(days as usize)
        .map(|d| (d, (0, 0)))
        .collect();

    let rows: Vec<(i64, i64)> = Entity::find()
        .select_only()
        .column(Column::CreatedAt)
        .column(Column::Success)
        .filter(Column::CreatedAt.gte(since))
        .into_tuple()
        .all(db)
        .await?;

    for (created_at, success) in rows {
        let Some(day) = DateTime::from_timestamp(created_at, 0).map(|t| t.date_naive()) else {
            continue;
        };
        if let Some(bucket) = buckets.get_mut(&day) {
            if success != 0 {
                bucket.0 += 1;
            } else {
                bucket.1 += 1;
            }
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(date, (successful, failed))| DayStats {
            date: date.format("%Y-%m-%d").to_string(),
            successful,
            failed,
        })
        .collect())
}

pub async fn store_overview(db: &DatabaseConnection) -> Result<Vec<StoreOverview>, LavError> {
    store_overview_at(db, Utc::now()).await
}

pub async fn store_overview_at(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<StoreOverview>, LavError> {
    use entities::{access_log, alert, device, store};

    let since = start_of_day(now);
    let stores = store::Entity::find()
        .order_by_asc(store::Column::Name)
        .all(db)
        .await?;

    let mut overview = Vec::with_capacity(stores.len());
    for s in stores {
        let devices_total = device::Entity::find()
            .filter(device::Column::StoreId.eq(s.id))
            .count(db)
            .await?;
        let devices_online = device::Entity::find()
            .filter(device::Column::StoreId.eq(s.id))
            .filter(device::Column::Status.eq(DeviceStatus::Online.as_str()))
            .count(db)
            .await?;
        let active_alerts = alert::Entity::find()
            .filter(alert::Column::StoreId.eq(s.id))
            .filter(alert::Column::Resolved.eq(0))
            .count(db)
            .await?;
        let accesses_today = access_log::Entity::find()
            .filter(access_log::Column::StoreId.eq(s.id))
            .filter(access_log::Column::CreatedAt.gte(since))
            .count(db)
            .await?;

        overview.push(StoreOverview {
            status: s.status.parse()?,
            store_id: s.id,
            name: s.name,
            code: s.code,
            devices_online,
            devices_offline: devices_total.saturating_sub(devices_online),
            active_alerts,
            accesses_today,
        });
    }
    Ok(overview)
}

pub async fn recent_activity(
    db: &DatabaseConnection,
    limit: Option<u64>,
) -> Result<RecentActivity, LavError> {
    let limit = limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);

    let access_logs = storage::list_access_logs(
        db,
        &AccessLogFilter {
            limit: Some(limit),
            ..Default::default()
        },
    )
    .await?;
    let alerts = storage::list_alerts(
        db,
        &AlertFilter {
            limit: Some(limit),
            ..Default::default()
        },
    )
    .await?;

    Ok(RecentActivity {
        access_logs,
        alerts,
    })
}
