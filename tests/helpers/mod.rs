#![allow(dead_code)]

pub mod app;
pub mod builders;
pub mod db;

pub use app::TestApp;
pub use builders::{DeviceBuilder, StoreBuilder, UserBuilder};
pub use db::TestDb;
