pub mod access_log;
pub mod alert;
pub mod client;
pub mod device;
pub mod job_execution;
pub mod store;
pub mod system_config;
pub mod user;

pub use access_log::Entity as AccessLog;
pub use alert::Entity as Alert;
pub use client::Entity as Client;
pub use device::Entity as Device;
pub use job_execution::Entity as JobExecution;
pub use store::Entity as Store;
pub use system_config::Entity as SystemConfig;
pub use user::Entity as User;
