//! String-backed enumerations persisted in the database.
//!
//! Columns store the lowercase name; parsing rejects anything else with a
//! `BadRequest` so handlers can surface validation failures directly.

use crate::errors::LavError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = LavError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(LavError::BadRequest(format!(
                        "Invalid {}: '{}' (expected one of: {})",
                        $label,
                        other,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }
    };
}

string_enum!(
    /// Dashboard user role. Admins manage everything, managers manage
    /// stores/devices/clients, operators work day to day.
    Role, "role" {
        Admin => "admin",
        Manager => "manager",
        Operator => "operator",
    }
);

string_enum!(
    /// Alert severity. Also used as a user's alert classification: the
    /// minimum severity they want to be notified about.
    Severity, "severity" {
        Critical => "critical",
        Warning => "warning",
        Info => "info",
    }
);

string_enum!(StoreStatus, "store status" {
    Active => "active",
    Inactive => "inactive",
});

string_enum!(DeviceKind, "device kind" {
    Facial => "facial",
    Fingerprint => "fingerprint",
    Keypad => "keypad",
});

string_enum!(DeviceStatus, "device status" {
    Online => "online",
    Offline => "offline",
});

string_enum!(ClientStatus, "client status" {
    Active => "active",
    Inactive => "inactive",
    Blocked => "blocked",
    Vip => "vip",
});

string_enum!(AccessMethod, "access method" {
    Facial => "facial",
    Fingerprint => "fingerprint",
    Password => "password",
    Remote => "remote",
});

string_enum!(
    /// Commands a door controller understands.
    DeviceCommand, "command" {
        Open => "open",
        Lock => "lock",
        Unlock => "unlock",
        Restart => "restart",
    }
);

impl Role {
    /// Stores, devices and clients may be changed by admins and managers.
    pub fn can_manage_sites(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl Severity {
    fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 2,
            Severity::Warning => 1,
            Severity::Info => 0,
        }
    }

    /// Whether an alert of severity `self` should reach a user whose
    /// classification is `threshold`.
    pub fn notifies(&self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }
}
