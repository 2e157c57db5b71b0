use lavcontrol::storage;
use lavcontrol::types::{DeviceKind, DeviceStatus, Role, Severity};
use sea_orm::DatabaseConnection;

/// Builder for creating test users
pub struct UserBuilder {
    username: String,
    password: String,
    role: Role,
    alert_classification: Severity,
    enabled: bool,
}

impl UserBuilder {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            password: "password123".to_string(),
            role: Role::Operator,
            alert_classification: Severity::Critical,
            enabled: true,
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_alert_classification(mut self, severity: Severity) -> Self {
        self.alert_classification = severity;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> storage::User {
        let user = storage::create_user(
            db,
            storage::NewUser {
                username: self.username,
                password: self.password,
                name: String::new(),
                email: None,
                role: self.role,
                alert_classification: self.alert_classification,
            },
        )
        .await
        .expect("Failed to create test user");

        if self.enabled {
            return user;
        }
        storage::update_user(
            db,
            &user.id,
            storage::UserUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to disable test user")
    }
}

/// Builder for creating test stores
pub struct StoreBuilder {
    input: storage::NewStore,
}

impl StoreBuilder {
    pub fn new(code: &str) -> Self {
        let input = serde_json::from_value(serde_json::json!({
            "name": format!("Store {}", code),
            "code": code,
        }))
        .expect("valid store input");
        Self { input }
    }

    pub fn with_secrets(mut self, wifi_password: &str, door_password: &str) -> Self {
        self.input.wifi_ssid = Some("lav-guest".to_string());
        self.input.wifi_password = Some(wifi_password.to_string());
        self.input.door_password = Some(door_password.to_string());
        self
    }

    pub fn with_biometry(mut self, device_id: &str) -> Self {
        self.input.biometry = Some(device_id.to_string());
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> storage::Store {
        storage::create_store(db, self.input)
            .await
            .expect("Failed to create test store")
    }
}

/// Builder for creating test devices
pub struct DeviceBuilder {
    id: String,
    kind: DeviceKind,
    store_id: Option<i32>,
    online: bool,
}

impl DeviceBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: DeviceKind::Facial,
            store_id: None,
            online: false,
        }
    }

    pub fn in_store(mut self, store_id: i32) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn online(mut self) -> Self {
        self.online = true;
        self
    }

    pub async fn create(self, db: &DatabaseConnection) -> storage::Device {
        let device = storage::create_device(
            db,
            storage::NewDevice {
                id: self.id.clone(),
                name: format!("Door {}", self.id),
                kind: self.kind,
                store_id: self.store_id,
            },
        )
        .await
        .expect("Failed to create test device");

        if !self.online {
            return device;
        }
        storage::set_device_status(
            db,
            &self.id,
            DeviceStatus::Online,
            chrono::Utc::now().timestamp(),
        )
        .await
        .expect("Failed to set device online")
        .map(|(device, _)| device)
        .expect("Device vanished")
    }
}
