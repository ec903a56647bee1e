//! Notification permission model and the status summary shown to the user.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform permission to display notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Not requested yet
    Default,
}

/// The user's saved notification choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPreference {
    Granted,
    Denied,
    Disabled,
}

impl NotificationPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPreference::Granted => "granted",
            NotificationPreference::Denied => "denied",
            NotificationPreference::Disabled => "disabled",
        }
    }
}

impl fmt::Display for NotificationPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "granted" => Ok(NotificationPreference::Granted),
            "denied" => Ok(NotificationPreference::Denied),
            "disabled" => Ok(NotificationPreference::Disabled),
            other => Err(format!("unknown notification preference: {}", other)),
        }
    }
}

/// Whether notifications should be shown.
///
/// An explicit "disabled" choice always wins. Otherwise either a granted
/// platform permission or a saved "granted" choice enables them.
pub fn notifications_enabled(
    preference: Option<NotificationPreference>,
    permission: Permission,
) -> bool {
    match preference {
        Some(NotificationPreference::Disabled) => false,
        Some(NotificationPreference::Granted) => true,
        _ => permission == Permission::Granted,
    }
}

/// What the host platform can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSupport {
    /// The notification capability exists at all
    pub supported: bool,
    /// Running as an installed app rather than a browser tab
    pub installed: bool,
    /// A browser that only offers notifications to installed apps
    pub install_required: bool,
}

/// Notification status summary for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStatus {
    pub supported: bool,
    pub installed: bool,
    pub install_required: bool,
    pub permission: Permission,
    pub blocked: bool,
    /// Human-readable explanation of the current state
    pub message: String,
}

impl NotificationStatus {
    /// Summarize the platform state.
    ///
    /// An unsupported platform reports a denied permission.
    pub fn evaluate(support: PlatformSupport, permission: Permission) -> Self {
        let permission = if support.supported {
            permission
        } else {
            Permission::Denied
        };
        let blocked = permission == Permission::Denied;

        let message = if !support.supported {
            if support.install_required && !support.installed {
                "To receive notifications on this browser, add the app to your home screen and open it from there."
            } else {
                "Your browser does not support notifications."
            }
        } else if blocked {
            "Notifications are blocked. Reset the permission in the site settings."
        } else if permission == Permission::Granted {
            "Notifications are enabled."
        } else {
            "Click to enable notifications."
        };

        Self {
            supported: support.supported,
            installed: support.installed,
            install_required: support.install_required,
            permission,
            blocked,
            message: message.to_string(),
        }
    }
}

/// Result of asking the user for notification permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub granted: bool,
    pub message: String,
}

impl PermissionRequest {
    pub fn granted() -> Self {
        Self {
            granted: true,
            message: "Notifications enabled!".to_string(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            granted: false,
            message: message.into(),
        }
    }

    /// Outcome for a permission the platform just answered.
    pub fn from_answer(permission: Permission) -> Self {
        match permission {
            Permission::Granted => Self::granted(),
            Permission::Denied => Self::refused(
                "Notifications were denied. You can re-enable them in the site settings.",
            ),
            Permission::Default => Self::refused("Permission request dismissed."),
        }
    }
}
