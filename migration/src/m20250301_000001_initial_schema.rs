use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable foreign keys for SQLite
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            manager
                .get_connection()
                .execute_unprepared("PRAGMA foreign_keys = ON")
                .await?;
        }

        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(string(Users::Name))
                    .col(string_null(Users::Email))
                    .col(string(Users::PasswordHash))
                    .col(
                        ColumnDef::new(Users::Role)
                            .string()
                            .not_null()
                            .default("operator"),
                    )
                    .col(
                        ColumnDef::new(Users::AlertClassification)
                            .string()
                            .not_null()
                            .default("critical"),
                    )
                    .col(
                        ColumnDef::new(Users::Enabled)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(big_integer(Users::CreatedAt))
                    .col(big_integer(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create stores table
        manager
            .create_table(
                Table::create()
                    .table(Stores::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stores::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(Stores::Name))
                    .col(
                        ColumnDef::new(Stores::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(string_null(Stores::Address))
                    .col(string_null(Stores::City))
                    .col(string_null(Stores::Phone))
                    .col(string_null(Stores::Email))
                    .col(string_null(Stores::ManagerName))
                    .col(
                        ColumnDef::new(Stores::WashPriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Stores::DryPriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(string(Stores::OpensAt))
                    .col(string(Stores::ClosesAt))
                    .col(string_null(Stores::WifiSsid))
                    .col(string_null(Stores::WifiPassword))
                    .col(string_null(Stores::DoorPassword))
                    .col(string_null(Stores::Biometry))
                    .col(
                        ColumnDef::new(Stores::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(big_integer(Stores::CreatedAt))
                    .col(big_integer(Stores::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create devices table
        manager
            .create_table(
                Table::create()
                    .table(Devices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Devices::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(Devices::Name))
                    .col(string(Devices::Kind))
                    .col(integer_null(Devices::StoreId))
                    .col(
                        ColumnDef::new(Devices::Status)
                            .string()
                            .not_null()
                            .default("offline"),
                    )
                    .col(big_integer_null(Devices::LastSeenAt))
                    .col(big_integer(Devices::CreatedAt))
                    .col(big_integer(Devices::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_devices_store")
                            .from(Devices::Table, Devices::StoreId)
                            .to(Stores::Table, Stores::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_devices_store")
                    .table(Devices::Table)
                    .col(Devices::StoreId)
                    .to_owned(),
            )
            .await?;

        // Create clients table
        manager
            .create_table(
                Table::create()
                    .table(Clients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Clients::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(Clients::Name))
                    .col(string_null(Clients::Document))
                    .col(string_null(Clients::Phone))
                    .col(string_null(Clients::Email))
                    .col(integer_null(Clients::StoreId))
                    .col(string_null(Clients::BiometricId))
                    .col(
                        ColumnDef::new(Clients::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(string_null(Clients::Notes))
                    .col(big_integer(Clients::CreatedAt))
                    .col(big_integer(Clients::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clients_store")
                            .from(Clients::Table, Clients::StoreId)
                            .to(Stores::Table, Stores::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Create access_logs table
        manager
            .create_table(
                Table::create()
                    .table(AccessLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccessLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string_null(AccessLogs::UserId))
                    .col(integer_null(AccessLogs::ClientId))
                    .col(string_null(AccessLogs::DeviceId))
                    .col(integer_null(AccessLogs::StoreId))
                    .col(string(AccessLogs::Method))
                    .col(big_integer(AccessLogs::Success))
                    .col(string_null(AccessLogs::Details))
                    .col(big_integer(AccessLogs::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_access_logs_user")
                            .from(AccessLogs::Table, AccessLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_access_logs_client")
                            .from(AccessLogs::Table, AccessLogs::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_access_logs_device")
                            .from(AccessLogs::Table, AccessLogs::DeviceId)
                            .to(Devices::Table, Devices::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_access_logs_store")
                            .from(AccessLogs::Table, AccessLogs::StoreId)
                            .to(Stores::Table, Stores::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_access_logs_created")
                    .table(AccessLogs::Table)
                    .col(AccessLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Create alerts table
        manager
            .create_table(
                Table::create()
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alerts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(Alerts::Kind))
                    .col(string(Alerts::Severity))
                    .col(string(Alerts::Message))
                    .col(string_null(Alerts::DeviceId))
                    .col(integer_null(Alerts::StoreId))
                    .col(
                        ColumnDef::new(Alerts::Resolved)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(big_integer_null(Alerts::ResolvedAt))
                    .col(string_null(Alerts::ResolvedBy))
                    .col(big_integer(Alerts::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alerts_device")
                            .from(Alerts::Table, Alerts::DeviceId)
                            .to(Devices::Table, Devices::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alerts_store")
                            .from(Alerts::Table, Alerts::StoreId)
                            .to(Stores::Table, Stores::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_alerts_resolved")
                    .table(Alerts::Table)
                    .col(Alerts::Resolved)
                    .to_owned(),
            )
            .await?;

        // Create system_config table (singleton row, id = 1)
        manager
            .create_table(
                Table::create()
                    .table(SystemConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemConfig::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(SystemConfig::CompanyName))
                    .col(string_null(SystemConfig::LogoUrl))
                    .col(string(SystemConfig::PrimaryColor))
                    .col(string_null(SystemConfig::SupportEmail))
                    .col(string_null(SystemConfig::SupportPhone))
                    .col(string(SystemConfig::Timezone))
                    .col(big_integer(SystemConfig::DeviceOfflineAfterSecs))
                    .col(big_integer(SystemConfig::AccessLogRetentionDays))
                    .col(big_integer(SystemConfig::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create job_executions table with backend-specific ID type
        let id_col = match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => ColumnDef::new(JobExecutions::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key()
                .to_owned(),
            _ => ColumnDef::new(JobExecutions::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key()
                .to_owned(),
        };

        manager
            .create_table(
                Table::create()
                    .table(JobExecutions::Table)
                    .if_not_exists()
                    .col(id_col)
                    .col(string(JobExecutions::JobName))
                    .col(big_integer(JobExecutions::StartedAt))
                    .col(big_integer_null(JobExecutions::CompletedAt))
                    .col(big_integer_null(JobExecutions::Success))
                    .col(string_null(JobExecutions::ErrorMessage))
                    .col(big_integer_null(JobExecutions::RecordsProcessed))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_job_executions_started")
                    .table(JobExecutions::Table)
                    .col(JobExecutions::StartedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobExecutions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SystemConfig::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Alerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AccessLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Clients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Devices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Stores::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Name,
    Email,
    PasswordHash,
    Role,
    AlertClassification,
    Enabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Stores {
    Table,
    Id,
    Name,
    Code,
    Address,
    City,
    Phone,
    Email,
    ManagerName,
    WashPriceCents,
    DryPriceCents,
    OpensAt,
    ClosesAt,
    WifiSsid,
    WifiPassword,
    DoorPassword,
    Biometry,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Devices {
    Table,
    Id,
    Name,
    Kind,
    StoreId,
    Status,
    LastSeenAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Clients {
    Table,
    Id,
    Name,
    Document,
    Phone,
    Email,
    StoreId,
    BiometricId,
    Status,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum AccessLogs {
    Table,
    Id,
    UserId,
    ClientId,
    DeviceId,
    StoreId,
    Method,
    Success,
    Details,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Alerts {
    Table,
    Id,
    Kind,
    Severity,
    Message,
    DeviceId,
    StoreId,
    Resolved,
    ResolvedAt,
    ResolvedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SystemConfig {
    Table,
    Id,
    CompanyName,
    LogoUrl,
    PrimaryColor,
    SupportEmail,
    SupportPhone,
    Timezone,
    DeviceOfflineAfterSecs,
    AccessLogRetentionDays,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum JobExecutions {
    Table,
    Id,
    JobName,
    StartedAt,
    CompletedAt,
    Success,
    ErrorMessage,
    RecordsProcessed,
}
