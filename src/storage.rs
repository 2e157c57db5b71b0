use crate::entities;
use crate::errors::LavError;
use crate::settings::{Auth as AuthCfg, Database as DbCfg};
use crate::types::{
    AccessMethod, ClientStatus, DeviceKind, DeviceStatus, Role, Severity, StoreStatus,
};
use base64ct::Encoding;
use chrono::{NaiveTime, Utc};
use migration::MigratorTrait;
use rand::RngCore;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 1000;

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, LavError> {
    let db = Database::connect(&cfg.url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn random_id() -> String {
    let mut bytes = [0u8; 18];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}

fn flag(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Deserialize a present field into `Some(value)`, keeping `null` as
/// `Some(None)`. Combined with `#[serde(default)]` a missing field stays
/// `None`, so PATCH bodies can distinguish "clear" from "leave alone".
pub(crate) fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn require_text(field: &str, value: &str) -> Result<(), LavError> {
    if value.trim().is_empty() {
        return Err(LavError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub alert_classification: Severity,
    pub enabled: bool,
    pub failed_login_attempts: i64,
    pub locked_until: Option<i64>,
    pub last_login_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip)]
    pub password_hash: String,
}

impl TryFrom<entities::user::Model> for User {
    type Error = LavError;

    fn try_from(m: entities::user::Model) -> Result<Self, Self::Error> {
        Ok(User {
            role: m.role.parse()?,
            alert_classification: m.alert_classification.parse()?,
            id: m.id,
            username: m.username,
            name: m.name,
            email: m.email,
            enabled: m.enabled != 0,
            failed_login_attempts: m.failed_login_attempts,
            locked_until: m.locked_until,
            last_login_at: m.last_login_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
            password_hash: m.password_hash,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_classification")]
    pub alert_classification: Severity,
}

fn default_role() -> Role {
    Role::Operator
}

fn default_classification() -> Severity {
    Severity::Critical
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    pub role: Option<Role>,
    pub alert_classification: Option<Severity>,
    pub enabled: Option<bool>,
    pub password: Option<String>,
}

fn validate_username(username: &str) -> Result<(), LavError> {
    let len = username.chars().count();
    if !(3..=64).contains(&len) || username.chars().any(char::is_whitespace) {
        return Err(LavError::BadRequest(
            "username must be 3-64 characters without spaces".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LavError> {
    if password.chars().count() < 8 {
        return Err(LavError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, LavError> {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| LavError::Other(format!("Password hashing failed: {}", e)))?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool, LavError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| LavError::Other(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn create_user(db: &DatabaseConnection, input: NewUser) -> Result<User, LavError> {
    let username = input.username.trim().to_string();
    validate_username(&username)?;
    validate_password(&input.password)?;

    if get_user_by_username(db, &username).await?.is_some() {
        return Err(LavError::Conflict(format!(
            "username '{}' is already taken",
            username
        )));
    }

    let ts = now();
    let name = if input.name.trim().is_empty() {
        username.clone()
    } else {
        input.name.trim().to_string()
    };

    let user = entities::user::ActiveModel {
        id: Set(random_id()),
        username: Set(username),
        name: Set(name),
        email: Set(input.email),
        password_hash: Set(hash_password(&input.password)?),
        role: Set(input.role.as_str().to_string()),
        alert_classification: Set(input.alert_classification.as_str().to_string()),
        enabled: Set(1),
        created_at: Set(ts),
        updated_at: Set(ts),
        failed_login_attempts: Set(0),
        locked_until: Set(None),
        last_login_at: Set(None),
    };

    user.insert(db).await?.try_into()
}

pub async fn get_user(db: &DatabaseConnection, id: &str) -> Result<Option<User>, LavError> {
    entities::User::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(User::try_from)
        .transpose()
}

pub async fn get_user_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<User>, LavError> {
    use entities::user::{Column, Entity};

    Entity::find()
        .filter(Column::Username.eq(username))
        .one(db)
        .await?
        .map(User::try_from)
        .transpose()
}

pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<User>, LavError> {
    use entities::user::{Column, Entity};

    Entity::find()
        .order_by_asc(Column::Username)
        .all(db)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
}

async fn find_user_model(
    db: &DatabaseConnection,
    id: &str,
) -> Result<entities::user::Model, LavError> {
    entities::User::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| LavError::NotFound(format!("User not found: {}", id)))
}

/// Apply a partial update. Only fields present in `update` change.
pub async fn update_user(
    db: &DatabaseConnection,
    id: &str,
    update: UserUpdate,
) -> Result<User, LavError> {
    let model = find_user_model(db, id).await?;
    let mut active = model.into_active_model();

    if let Some(name) = update.name {
        require_text("name", &name)?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(email) = update.email {
        active.email = Set(email);
    }
    if let Some(role) = update.role {
        active.role = Set(role.as_str().to_string());
    }
    if let Some(classification) = update.alert_classification {
        active.alert_classification = Set(classification.as_str().to_string());
    }
    if let Some(enabled) = update.enabled {
        active.enabled = Set(flag(enabled));
    }
    if let Some(password) = update.password {
        validate_password(&password)?;
        active.password_hash = Set(hash_password(&password)?);
    }
    active.updated_at = Set(now());

    active.update(db).await?.try_into()
}

pub async fn delete_user(db: &DatabaseConnection, id: &str) -> Result<(), LavError> {
    let result = entities::User::delete_by_id(id.to_string())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(LavError::NotFound(format!("User not found: {}", id)));
    }
    Ok(())
}

pub async fn change_password(
    db: &DatabaseConnection,
    id: &str,
    current: &str,
    new_password: &str,
) -> Result<(), LavError> {
    let model = find_user_model(db, id).await?;
    if !verify_password(current, &model.password_hash)? {
        return Err(LavError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }
    validate_password(new_password)?;

    let mut active = model.into_active_model();
    active.password_hash = Set(hash_password(new_password)?);
    active.updated_at = Set(now());
    active.update(db).await?;
    Ok(())
}

/// Clear lockout counters so the user can log in again.
pub async fn unlock_user(db: &DatabaseConnection, id: &str) -> Result<User, LavError> {
    let model = find_user_model(db, id).await?;
    let mut active = model.into_active_model();
    active.failed_login_attempts = Set(0);
    active.locked_until = Set(None);
    active.updated_at = Set(now());
    active.update(db).await?.try_into()
}

/// Make sure at least one enabled admin exists. When none does, an `admin`
/// account is created (or re-enabled) with a random password, which is
/// returned so the caller can print it once.
pub async fn ensure_admin(db: &DatabaseConnection) -> Result<Option<String>, LavError> {
    use entities::user::{Column, Entity};
    use sea_orm::PaginatorTrait;

    let admins = Entity::find()
        .filter(Column::Role.eq(Role::Admin.as_str()))
        .filter(Column::Enabled.eq(1))
        .count(db)
        .await?;
    if admins > 0 {
        return Ok(None);
    }

    let password = random_id();
    match find_user_model_by_username(db, "admin").await? {
        Some(existing) => {
            let mut active = existing.into_active_model();
            active.role = Set(Role::Admin.as_str().to_string());
            active.enabled = Set(1);
            active.password_hash = Set(hash_password(&password)?);
            active.failed_login_attempts = Set(0);
            active.locked_until = Set(None);
            active.updated_at = Set(now());
            active.update(db).await?;
        }
        None => {
            create_user(
                db,
                NewUser {
                    username: "admin".to_string(),
                    password: password.clone(),
                    name: "Administrator".to_string(),
                    email: None,
                    role: Role::Admin,
                    alert_classification: Severity::Info,
                },
            )
            .await?;
        }
    }
    Ok(Some(password))
}

async fn find_user_model_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<entities::user::Model>, LavError> {
    use entities::user::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::Username.eq(username))
        .one(db)
        .await?)
}

/// Check credentials and maintain the lockout counters.
///
/// Unknown users and wrong passwords are indistinguishable to the caller.
/// After `max_failed_logins` consecutive failures the account is locked for
/// `lockout_secs`; a successful login resets the counters.
pub async fn login(
    db: &DatabaseConnection,
    auth: &AuthCfg,
    username: &str,
    password: &str,
) -> Result<User, LavError> {
    use entities::user::{Column, Entity};

    let invalid = || LavError::Unauthorized("Invalid username or password".to_string());

    let model = Entity::find()
        .filter(Column::Username.eq(username.trim()))
        .one(db)
        .await?
        .ok_or_else(invalid)?;

    let ts = now();
    if let Some(until) = model.locked_until {
        if until > ts {
            return Err(LavError::Locked { until });
        }
    }
    if model.enabled == 0 {
        return Err(LavError::Forbidden("Account is disabled".to_string()));
    }

    let ok = verify_password(password, &model.password_hash)?;
    let attempts = model.failed_login_attempts;
    let mut active = model.into_active_model();

    if ok {
        active.failed_login_attempts = Set(0);
        active.locked_until = Set(None);
        active.last_login_at = Set(Some(ts));
        return active.update(db).await?.try_into();
    }

    let attempts = attempts + 1;
    if attempts >= auth.max_failed_logins {
        let until = ts + auth.lockout_secs;
        tracing::warn!(username, until, "Account locked after repeated failed logins");
        active.failed_login_attempts = Set(0);
        active.locked_until = Set(Some(until));
        active.update(db).await?;
        return Err(LavError::Locked { until });
    }

    active.failed_login_attempts = Set(attempts);
    active.locked_until = Set(None);
    active.update(db).await?;
    Err(invalid())
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub manager_name: Option<String>,
    pub wash_price_cents: i64,
    pub dry_price_cents: i64,
    pub opens_at: String,
    pub closes_at: String,
    pub wifi_ssid: Option<String>,
    pub wifi_password: Option<String>,
    pub door_password: Option<String>,
    pub biometry: Option<String>,
    pub status: StoreStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Store {
    /// Hide Wi-Fi and door secrets.
    pub fn redacted(mut self) -> Self {
        self.wifi_password = None;
        self.door_password = None;
        self
    }
}

impl TryFrom<entities::store::Model> for Store {
    type Error = LavError;

    fn try_from(m: entities::store::Model) -> Result<Self, Self::Error> {
        Ok(Store {
            status: m.status.parse()?,
            id: m.id,
            name: m.name,
            code: m.code,
            address: m.address,
            city: m.city,
            phone: m.phone,
            email: m.email,
            manager_name: m.manager_name,
            wash_price_cents: m.wash_price_cents,
            dry_price_cents: m.dry_price_cents,
            opens_at: m.opens_at,
            closes_at: m.closes_at,
            wifi_ssid: m.wifi_ssid,
            wifi_password: m.wifi_password,
            door_password: m.door_password,
            biometry: m.biometry,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStore {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub wash_price_cents: i64,
    #[serde(default)]
    pub dry_price_cents: i64,
    #[serde(default = "default_opens_at")]
    pub opens_at: String,
    #[serde(default = "default_closes_at")]
    pub closes_at: String,
    #[serde(default)]
    pub wifi_ssid: Option<String>,
    #[serde(default)]
    pub wifi_password: Option<String>,
    #[serde(default)]
    pub door_password: Option<String>,
    #[serde(default)]
    pub biometry: Option<String>,
    #[serde(default = "default_store_status")]
    pub status: StoreStatus,
}

fn default_opens_at() -> String {
    "07:00".to_string()
}

fn default_closes_at() -> String {
    "22:00".to_string()
}

fn default_store_status() -> StoreStatus {
    StoreStatus::Active
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub manager_name: Option<Option<String>>,
    pub wash_price_cents: Option<i64>,
    pub dry_price_cents: Option<i64>,
    pub opens_at: Option<String>,
    pub closes_at: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub wifi_ssid: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub wifi_password: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub door_password: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub biometry: Option<Option<String>>,
    pub status: Option<StoreStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFilter {
    pub status: Option<StoreStatus>,
}

fn validate_schedule_time(field: &str, value: &str) -> Result<(), LavError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map(|_| ())
        .map_err(|_| LavError::BadRequest(format!("{field} must be formatted as HH:MM")))
}

fn validate_price(field: &str, cents: i64) -> Result<(), LavError> {
    if cents < 0 {
        return Err(LavError::BadRequest(format!("{field} cannot be negative")));
    }
    Ok(())
}

/// A biometry device may only be linked to a store that owns it, or be
/// unassigned (in which case linking assigns it).
async fn check_biometry_link(
    db: &DatabaseConnection,
    store_id: Option<i32>,
    device_id: &str,
) -> Result<entities::device::Model, LavError> {
    let device = entities::Device::find_by_id(device_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| {
            LavError::BadRequest(format!("Biometry device not found: {}", device_id))
        })?;

    match device.store_id {
        Some(owner) if Some(owner) != store_id => Err(LavError::Conflict(format!(
            "Device {} already belongs to store {}",
            device_id, owner
        ))),
        _ => Ok(device),
    }
}

async fn assign_device_to_store(
    db: &DatabaseConnection,
    device: entities::device::Model,
    store_id: i32,
) -> Result<(), LavError> {
    if device.store_id == Some(store_id) {
        return Ok(());
    }
    let mut active = device.into_active_model();
    active.store_id = Set(Some(store_id));
    active.updated_at = Set(now());
    active.update(db).await?;
    Ok(())
}

pub async fn create_store(db: &DatabaseConnection, input: NewStore) -> Result<Store, LavError> {
    require_text("name", &input.name)?;
    require_text("code", &input.code)?;
    validate_price("washPriceCents", input.wash_price_cents)?;
    validate_price("dryPriceCents", input.dry_price_cents)?;
    validate_schedule_time("opensAt", &input.opens_at)?;
    validate_schedule_time("closesAt", &input.closes_at)?;

    let biometry_device = match &input.biometry {
        Some(device_id) => Some(check_biometry_link(db, None, device_id).await?),
        None => None,
    };

    let ts = now();
    let store = entities::store::ActiveModel {
        name: Set(input.name.trim().to_string()),
        code: Set(input.code.trim().to_string()),
        address: Set(input.address),
        city: Set(input.city),
        phone: Set(input.phone),
        email: Set(input.email),
        manager_name: Set(input.manager_name),
        wash_price_cents: Set(input.wash_price_cents),
        dry_price_cents: Set(input.dry_price_cents),
        opens_at: Set(input.opens_at),
        closes_at: Set(input.closes_at),
        wifi_ssid: Set(input.wifi_ssid),
        wifi_password: Set(input.wifi_password),
        door_password: Set(input.door_password),
        biometry: Set(input.biometry),
        status: Set(input.status.as_str().to_string()),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    };
    let model = store.insert(db).await?;

    if let Some(device) = biometry_device {
        assign_device_to_store(db, device, model.id).await?;
    }

    model.try_into()
}

pub async fn get_store(db: &DatabaseConnection, id: i32) -> Result<Option<Store>, LavError> {
    entities::Store::find_by_id(id)
        .one(db)
        .await?
        .map(Store::try_from)
        .transpose()
}

pub async fn list_stores(
    db: &DatabaseConnection,
    filter: &StoreFilter,
) -> Result<Vec<Store>, LavError> {
    use entities::store::{Column, Entity};

    let mut query = Entity::find();
    if let Some(status) = filter.status {
        query = query.filter(Column::Status.eq(status.as_str()));
    }
    query
        .order_by_asc(Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(Store::try_from)
        .collect()
}

pub async fn update_store(
    db: &DatabaseConnection,
    id: i32,
    update: StoreUpdate,
) -> Result<Store, LavError> {
    let model = entities::Store::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| LavError::NotFound(format!("Store not found: {}", id)))?;

    let mut biometry_device = None;
    if let Some(Some(device_id)) = &update.biometry {
        biometry_device = Some(check_biometry_link(db, Some(id), device_id).await?);
    }

    let mut active = model.into_active_model();
    if let Some(name) = update.name {
        require_text("name", &name)?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(code) = update.code {
        require_text("code", &code)?;
        active.code = Set(code.trim().to_string());
    }
    if let Some(v) = update.address {
        active.address = Set(v);
    }
    if let Some(v) = update.city {
        active.city = Set(v);
    }
    if let Some(v) = update.phone {
        active.phone = Set(v);
    }
    if let Some(v) = update.email {
        active.email = Set(v);
    }
    if let Some(v) = update.manager_name {
        active.manager_name = Set(v);
    }
    if let Some(cents) = update.wash_price_cents {
        validate_price("washPriceCents", cents)?;
        active.wash_price_cents = Set(cents);
    }
    if let Some(cents) = update.dry_price_cents {
        validate_price("dryPriceCents", cents)?;
        active.dry_price_cents = Set(cents);
    }
    if let Some(t) = update.opens_at {
        validate_schedule_time("opensAt", &t)?;
        active.opens_at = Set(t);
    }
    if let Some(t) = update.closes_at {
        validate_schedule_time("closesAt", &t)?;
        active.closes_at = Set(t);
    }
    if let Some(v) = update.wifi_ssid {
        active.wifi_ssid = Set(v);
    }
    if let Some(v) = update.wifi_password {
        active.wifi_password = Set(v);
    }
    if let Some(v) = update.door_password {
        active.door_password = Set(v);
    }
    if let Some(v) = update.biometry {
        active.biometry = Set(v);
    }
    if let Some(status) = update.status {
        active.status = Set(status.as_str().to_string());
    }
    active.updated_at = Set(now());

    let updated = active.update(db).await?;
    if let Some(device) = biometry_device {
        assign_device_to_store(db, device, id).await?;
    }

    updated.try_into()
}

/// Delete a store. Devices, clients, logs and alerts keep their rows with
/// the store reference cleared.
pub async fn delete_store(db: &DatabaseConnection, id: i32) -> Result<(), LavError> {
    let result = entities::Store::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(LavError::NotFound(format!("Store not found: {}", id)));
    }
    Ok(())
}

// ============================================================================
// Devices
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub store_id: Option<i32>,
    pub status: DeviceStatus,
    pub last_seen_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<entities::device::Model> for Device {
    type Error = LavError;

    fn try_from(m: entities::device::Model) -> Result<Self, Self::Error> {
        Ok(Device {
            kind: m.kind.parse()?,
            status: m.status.parse()?,
            id: m.id,
            name: m.name,
            store_id: m.store_id,
            last_seen_at: m.last_seen_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub store_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub kind: Option<DeviceKind>,
    #[serde(default, deserialize_with = "nullable")]
    pub store_id: Option<Option<i32>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFilter {
    pub store_id: Option<i32>,
    pub status: Option<DeviceStatus>,
}

/// Device ids become MQTT topic levels, so wildcard and separator
/// characters are not allowed.
pub fn validate_device_id(id: &str) -> Result<(), LavError> {
    if id.is_empty()
        || id.len() > 64
        || id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '+' | '#'))
    {
        return Err(LavError::BadRequest(
            "device id must be 1-64 characters without spaces, '/', '+' or '#'".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_store_exists(db: &DatabaseConnection, store_id: i32) -> Result<(), LavError> {
    if entities::Store::find_by_id(store_id).one(db).await?.is_none() {
        return Err(LavError::BadRequest(format!(
            "Store not found: {}",
            store_id
        )));
    }
    Ok(())
}

/// Drop `biometry` links pointing at `device_id` from every store except
/// `keep_store`.
async fn clear_biometry_links(
    db: &DatabaseConnection,
    device_id: &str,
    keep_store: Option<i32>,
) -> Result<u64, LavError> {
    use entities::store::{Column, Entity};

    let mut query = Entity::update_many()
        .col_expr(Column::Biometry, Expr::value(Option::<String>::None))
        .col_expr(Column::UpdatedAt, Expr::value(now()))
        .filter(Column::Biometry.eq(device_id));
    if let Some(store_id) = keep_store {
        query = query.filter(Column::Id.ne(store_id));
    }
    Ok(query.exec(db).await?.rows_affected)
}

pub async fn create_device(db: &DatabaseConnection, input: NewDevice) -> Result<Device, LavError> {
    validate_device_id(&input.id)?;
    require_text("name", &input.name)?;
    if let Some(store_id) = input.store_id {
        ensure_store_exists(db, store_id).await?;
    }
    if entities::Device::find_by_id(input.id.clone())
        .one(db)
        .await?
        .is_some()
    {
        return Err(LavError::Conflict(format!(
            "Device {} already exists",
            input.id
        )));
    }

    let ts = now();
    let device = entities::device::ActiveModel {
        id: Set(input.id),
        name: Set(input.name.trim().to_string()),
        kind: Set(input.kind.as_str().to_string()),
        store_id: Set(input.store_id),
        status: Set(DeviceStatus::Offline.as_str().to_string()),
        last_seen_at: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
    };

    device.insert(db).await?.try_into()
}

pub async fn get_device(db: &DatabaseConnection, id: &str) -> Result<Option<Device>, LavError> {
    entities::Device::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(Device::try_from)
        .transpose()
}

pub async fn list_devices(
    db: &DatabaseConnection,
    filter: &DeviceFilter,
) -> Result<Vec<Device>, LavError> {
    use entities::device::{Column, Entity};

    let mut query = Entity::find();
    if let Some(store_id) = filter.store_id {
        query = query.filter(Column::StoreId.eq(store_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(Column::Status.eq(status.as_str()));
    }
    query
        .order_by_asc(Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(Device::try_from)
        .collect()
}

pub async fn update_device(
    db: &DatabaseConnection,
    id: &str,
    update: DeviceUpdate,
) -> Result<Device, LavError> {
    let model = entities::Device::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| LavError::NotFound(format!("Device not found: {}", id)))?;

    let mut active = model.clone().into_active_model();
    if let Some(name) = update.name {
        require_text("name", &name)?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(kind) = update.kind {
        active.kind = Set(kind.as_str().to_string());
    }
    if let Some(store_id) = update.store_id {
        if let Some(sid) = store_id {
            ensure_store_exists(db, sid).await?;
        }
        if store_id != model.store_id {
            clear_biometry_links(db, id, store_id).await?;
        }
        active.store_id = Set(store_id);
    }
    active.updated_at = Set(now());

    active.update(db).await?.try_into()
}

pub async fn delete_device(db: &DatabaseConnection, id: &str) -> Result<(), LavError> {
    clear_biometry_links(db, id, None).await?;
    let result = entities::Device::delete_by_id(id.to_string())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(LavError::NotFound(format!("Device not found: {}", id)));
    }
    Ok(())
}

/// Record a connectivity report. Returns the updated device together with
/// its previous status, or `None` for unknown devices.
pub async fn set_device_status(
    db: &DatabaseConnection,
    id: &str,
    status: DeviceStatus,
    seen_at: i64,
) -> Result<Option<(Device, DeviceStatus)>, LavError> {
    let Some(model) = entities::Device::find_by_id(id.to_string()).one(db).await? else {
        return Ok(None);
    };
    let previous: DeviceStatus = model.status.parse()?;

    let mut active = model.into_active_model();
    active.status = Set(status.as_str().to_string());
    if status == DeviceStatus::Online {
        active.last_seen_at = Set(Some(seen_at));
    }
    active.updated_at = Set(now());
    let device: Device = active.update(db).await?.try_into()?;

    Ok(Some((device, previous)))
}

/// Devices reported online whose last report is older than `cutoff`.
pub async fn stale_online_devices(
    db: &DatabaseConnection,
    cutoff: i64,
) -> Result<Vec<Device>, LavError> {
    use entities::device::{Column, Entity};
    use sea_orm::Condition;

    Entity::find()
        .filter(Column::Status.eq(DeviceStatus::Online.as_str()))
        .filter(
            Condition::any()
                .add(Column::LastSeenAt.lt(cutoff))
                .add(Column::LastSeenAt.is_null()),
        )
        .all(db)
        .await?
        .into_iter()
        .map(Device::try_from)
        .collect()
}

// ============================================================================
// Clients
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i32,
    pub name: String,
    pub document: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub store_id: Option<i32>,
    pub biometric_id: Option<String>,
    pub status: ClientStatus,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<entities::client::Model> for Client {
    type Error = LavError;

    fn try_from(m: entities::client::Model) -> Result<Self, Self::Error> {
        Ok(Client {
            status: m.status.parse()?,
            id: m.id,
            name: m.name,
            document: m.document,
            phone: m.phone,
            email: m.email,
            store_id: m.store_id,
            biometric_id: m.biometric_id,
            notes: m.notes,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub store_id: Option<i32>,
    #[serde(default)]
    pub biometric_id: Option<String>,
    #[serde(default = "default_client_status")]
    pub status: ClientStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_client_status() -> ClientStatus {
    ClientStatus::Active
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub document: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub store_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub biometric_id: Option<Option<String>>,
    pub status: Option<ClientStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFilter {
    pub store_id: Option<i32>,
    pub status: Option<ClientStatus>,
    /// Case-sensitive substring match on the client name
    pub search: Option<String>,
}

pub async fn create_client(db: &DatabaseConnection, input: NewClient) -> Result<Client, LavError> {
    require_text("name", &input.name)?;
    if let Some(store_id) = input.store_id {
        ensure_store_exists(db, store_id).await?;
    }

    let ts = now();
    let client = entities::client::ActiveModel {
        name: Set(input.name.trim().to_string()),
        document: Set(input.document),
        phone: Set(input.phone),
        email: Set(input.email),
        store_id: Set(input.store_id),
        biometric_id: Set(input.biometric_id),
        status: Set(input.status.as_str().to_string()),
        notes: Set(input.notes),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    };

    client.insert(db).await?.try_into()
}

pub async fn get_client(db: &DatabaseConnection, id: i32) -> Result<Option<Client>, LavError> {
    entities::Client::find_by_id(id)
        .one(db)
        .await?
        .map(Client::try_from)
        .transpose()
}

pub async fn list_clients(
    db: &DatabaseConnection,
    filter: &ClientFilter,
) -> Result<Vec<Client>, LavError> {
    use entities::client::{Column, Entity};

    let mut query = Entity::find();
    if let Some(store_id) = filter.store_id {
        query = query.filter(Column::StoreId.eq(store_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(Column::Status.eq(status.as_str()));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        query = query.filter(Column::Name.contains(search.trim()));
    }
    query
        .order_by_asc(Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(Client::try_from)
        .collect()
}

pub async fn update_client(
    db: &DatabaseConnection,
    id: i32,
    update: ClientUpdate,
) -> Result<Client, LavError> {
    let model = entities::Client::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| LavError::NotFound(format!("Client not found: {}", id)))?;

    let mut active = model.into_active_model();
    if let Some(name) = update.name {
        require_text("name", &name)?;
        active.name = Set(name.trim().to_string());
    }
    if let Some(v) = update.document {
        active.document = Set(v);
    }
    if let Some(v) = update.phone {
        active.phone = Set(v);
    }
    if let Some(v) = update.email {
        active.email = Set(v);
    }
    if let Some(store_id) = update.store_id {
        if let Some(sid) = store_id {
            ensure_store_exists(db, sid).await?;
        }
        active.store_id = Set(store_id);
    }
    if let Some(v) = update.biometric_id {
        active.biometric_id = Set(v);
    }
    if let Some(status) = update.status {
        active.status = Set(status.as_str().to_string());
    }
    if let Some(v) = update.notes {
        active.notes = Set(v);
    }
    active.updated_at = Set(now());

    active.update(db).await?.try_into()
}

pub async fn delete_client(db: &DatabaseConnection, id: i32) -> Result<(), LavError> {
    let result = entities::Client::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(LavError::NotFound(format!("Client not found: {}", id)));
    }
    Ok(())
}

// ============================================================================
// Access logs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLog {
    pub id: i32,
    pub user_id: Option<String>,
    pub client_id: Option<i32>,
    pub device_id: Option<String>,
    pub store_id: Option<i32>,
    pub method: AccessMethod,
    pub success: bool,
    pub details: Option<String>,
    pub created_at: i64,
}

impl TryFrom<entities::access_log::Model> for AccessLog {
    type Error = LavError;

    fn try_from(m: entities::access_log::Model) -> Result<Self, Self::Error> {
        Ok(AccessLog {
            method: m.method.parse()?,
            id: m.id,
            user_id: m.user_id,
            client_id: m.client_id,
            device_id: m.device_id,
            store_id: m.store_id,
            success: m.success != 0,
            details: m.details,
            created_at: m.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAccessLog {
    pub user_id: Option<String>,
    pub client_id: Option<i32>,
    pub device_id: Option<String>,
    pub store_id: Option<i32>,
    pub method: AccessMethod,
    pub success: bool,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogFilter {
    pub store_id: Option<i32>,
    pub device_id: Option<String>,
    pub user_id: Option<String>,
    pub client_id: Option<i32>,
    pub success: Option<bool>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub async fn record_access_log(
    db: &DatabaseConnection,
    input: NewAccessLog,
) -> Result<AccessLog, LavError> {
    let log = entities::access_log::ActiveModel {
        user_id: Set(input.user_id),
        client_id: Set(input.client_id),
        device_id: Set(input.device_id),
        store_id: Set(input.store_id),
        method: Set(input.method.as_str().to_string()),
        success: Set(flag(input.success)),
        details: Set(input.details),
        created_at: Set(now()),
        ..Default::default()
    };

    log.insert(db).await?.try_into()
}

/// Newest first.
pub async fn list_access_logs(
    db: &DatabaseConnection,
    filter: &AccessLogFilter,
) -> Result<Vec<AccessLog>, LavError> {
    use entities::access_log::{Column, Entity};

    let mut query = Entity::find();
    if let Some(store_id) = filter.store_id {
        query = query.filter(Column::StoreId.eq(store_id));
    }
    if let Some(device_id) = &filter.device_id {
        query = query.filter(Column::DeviceId.eq(device_id.as_str()));
    }
    if let Some(user_id) = &filter.user_id {
        query = query.filter(Column::UserId.eq(user_id.as_str()));
    }
    if let Some(client_id) = filter.client_id {
        query = query.filter(Column::ClientId.eq(client_id));
    }
    if let Some(success) = filter.success {
        query = query.filter(Column::Success.eq(flag(success)));
    }
    if let Some(since) = filter.since {
        query = query.filter(Column::CreatedAt.gte(since));
    }
    if let Some(until) = filter.until {
        query = query.filter(Column::CreatedAt.lt(until));
    }

    query
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .limit(clamp_limit(filter.limit))
        .offset(filter.offset.unwrap_or(0))
        .all(db)
        .await?
        .into_iter()
        .map(AccessLog::try_from)
        .collect()
}

pub async fn purge_access_logs_before(
    db: &DatabaseConnection,
    cutoff: i64,
) -> Result<u64, LavError> {
    use entities::access_log::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

// ============================================================================
// Alerts
// ============================================================================

pub const ALERT_DEVICE_OFFLINE: &str = "device_offline";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: i32,
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    pub device_id: Option<String>,
    pub store_id: Option<i32>,
    pub resolved: bool,
    pub resolved_at: Option<i64>,
    pub resolved_by: Option<String>,
    pub created_at: i64,
}

impl TryFrom<entities::alert::Model> for Alert {
    type Error = LavError;

    fn try_from(m: entities::alert::Model) -> Result<Self, Self::Error> {
        Ok(Alert {
            severity: m.severity.parse()?,
            id: m.id,
            kind: m.kind,
            message: m.message,
            device_id: m.device_id,
            store_id: m.store_id,
            resolved: m.resolved != 0,
            resolved_at: m.resolved_at,
            resolved_by: m.resolved_by,
            created_at: m.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    pub device_id: Option<String>,
    pub store_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFilter {
    pub resolved: Option<bool>,
    pub severity: Option<Severity>,
    pub store_id: Option<i32>,
    pub device_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub async fn create_alert(db: &DatabaseConnection, input: NewAlert) -> Result<Alert, LavError> {
    let alert = entities::alert::ActiveModel {
        kind: Set(input.kind),
        severity: Set(input.severity.as_str().to_string()),
        message: Set(input.message),
        device_id: Set(input.device_id),
        store_id: Set(input.store_id),
        resolved: Set(0),
        resolved_at: Set(None),
        resolved_by: Set(None),
        created_at: Set(now()),
        ..Default::default()
    };

    alert.insert(db).await?.try_into()
}

pub async fn get_alert(db: &DatabaseConnection, id: i32) -> Result<Option<Alert>, LavError> {
    entities::Alert::find_by_id(id)
        .one(db)
        .await?
        .map(Alert::try_from)
        .transpose()
}

/// Newest first.
pub async fn list_alerts(
    db: &DatabaseConnection,
    filter: &AlertFilter,
) -> Result<Vec<Alert>, LavError> {
    use entities::alert::{Column, Entity};

    let mut query = Entity::find();
    if let Some(resolved) = filter.resolved {
        query = query.filter(Column::Resolved.eq(flag(resolved)));
    }
    if let Some(severity) = filter.severity {
        query = query.filter(Column::Severity.eq(severity.as_str()));
    }
    if let Some(store_id) = filter.store_id {
        query = query.filter(Column::StoreId.eq(store_id));
    }
    if let Some(device_id) = &filter.device_id {
        query = query.filter(Column::DeviceId.eq(device_id.as_str()));
    }

    query
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id)
        .limit(clamp_limit(filter.limit))
        .offset(filter.offset.unwrap_or(0))
        .all(db)
        .await?
        .into_iter()
        .map(Alert::try_from)
        .collect()
}

/// Move an alert from active to resolved. The update only matches active
/// rows, so an alert can never be resolved twice or reopened.
pub async fn resolve_alert(
    db: &DatabaseConnection,
    id: i32,
    resolved_by: &str,
) -> Result<Alert, LavError> {
    use entities::alert::{Column, Entity};

    let result = Entity::update_many()
        .col_expr(Column::Resolved, Expr::value(1i64))
        .col_expr(Column::ResolvedAt, Expr::value(now()))
        .col_expr(Column::ResolvedBy, Expr::value(resolved_by.to_string()))
        .filter(Column::Id.eq(id))
        .filter(Column::Resolved.eq(0))
        .exec(db)
        .await?;

    let alert = get_alert(db, id)
        .await?
        .ok_or_else(|| LavError::NotFound(format!("Alert not found: {}", id)))?;

    if result.rows_affected == 0 {
        return Err(LavError::Conflict(format!(
            "Alert {} is already resolved",
            id
        )));
    }
    Ok(alert)
}

// ============================================================================
// System configuration
// ============================================================================

pub const SYSTEM_CONFIG_ID: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub company_name: String,
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub support_email: Option<String>,
    pub support_phone: Option<String>,
    pub timezone: String,
    pub device_offline_after_secs: i64,
    pub access_log_retention_days: i64,
    pub updated_at: i64,
}

impl From<entities::system_config::Model> for SystemConfig {
    fn from(m: entities::system_config::Model) -> Self {
        SystemConfig {
            company_name: m.company_name,
            logo_url: m.logo_url,
            primary_color: m.primary_color,
            support_email: m.support_email,
            support_phone: m.support_phone,
            timezone: m.timezone,
            device_offline_after_secs: m.device_offline_after_secs,
            access_log_retention_days: m.access_log_retention_days,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub logo_url: Option<Option<String>>,
    pub primary_color: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub support_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub support_phone: Option<Option<String>>,
    pub timezone: Option<String>,
    pub device_offline_after_secs: Option<i64>,
    pub access_log_retention_days: Option<i64>,
}

/// Upper bound for `access_log_retention_days` (100 years).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

fn validate_color(value: &str) -> Result<(), LavError> {
    let hex = value.strip_prefix('#').unwrap_or("");
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LavError::BadRequest(
            "primaryColor must be a #RRGGBB hex color".to_string(),
        ));
    }
    Ok(())
}

/// Read the singleton configuration row, inserting defaults on first use.
pub async fn get_system_config(db: &DatabaseConnection) -> Result<SystemConfig, LavError> {
    use entities::system_config::{Column, Entity};
    use sea_orm::sea_query::OnConflict;

    if let Some(model) = Entity::find_by_id(SYSTEM_CONFIG_ID).one(db).await? {
        return Ok(model.into());
    }

    let defaults = entities::system_config::ActiveModel {
        id: Set(SYSTEM_CONFIG_ID),
        company_name: Set("LavControl".to_string()),
        logo_url: Set(None),
        primary_color: Set("#0ea5e9".to_string()),
        support_email: Set(None),
        support_phone: Set(None),
        timezone: Set("UTC".to_string()),
        device_offline_after_secs: Set(300),
        access_log_retention_days: Set(365),
        updated_at: Set(now()),
    };

    // Two first readers may race; the loser keeps the winner's row.
    Entity::insert(defaults)
        .on_conflict(OnConflict::column(Column::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    Entity::find_by_id(SYSTEM_CONFIG_ID)
        .one(db)
        .await?
        .map(SystemConfig::from)
        .ok_or_else(|| LavError::Other("system config row missing after insert".to_string()))
}

pub async fn update_system_config(
    db: &DatabaseConnection,
    update: ConfigUpdate,
) -> Result<SystemConfig, LavError> {
    get_system_config(db).await?;
    let model = entities::SystemConfig::find_by_id(SYSTEM_CONFIG_ID)
        .one(db)
        .await?
        .ok_or_else(|| LavError::Other("system config row missing".to_string()))?;

    let mut active = model.into_active_model();
    if let Some(name) = update.company_name {
        require_text("companyName", &name)?;
        active.company_name = Set(name.trim().to_string());
    }
    if let Some(v) = update.logo_url {
        active.logo_url = Set(v);
    }
    if let Some(color) = update.primary_color {
        validate_color(&color)?;
        active.primary_color = Set(color);
    }
    if let Some(v) = update.support_email {
        active.support_email = Set(v);
    }
    if let Some(v) = update.support_phone {
        active.support_phone = Set(v);
    }
    if let Some(tz) = update.timezone {
        require_text("timezone", &tz)?;
        active.timezone = Set(tz);
    }
    if let Some(secs) = update.device_offline_after_secs {
        if secs < 30 {
            return Err(LavError::BadRequest(
                "deviceOfflineAfterSecs must be at least 30".to_string(),
            ));
        }
        active.device_offline_after_secs = Set(secs);
    }
    if let Some(days) = update.access_log_retention_days {
        if !(0..=MAX_RETENTION_DAYS).contains(&days) {
            return Err(LavError::BadRequest(format!(
                "accessLogRetentionDays must be between 0 and {}",
                MAX_RETENTION_DAYS
            )));
        }
        active.access_log_retention_days = Set(days);
    }
    active.updated_at = Set(now());

    Ok(active.update(db).await?.into())
}
