//! Command envelope and payload shapes.
//!
//! A [`Command`] is what travels over the wire inside a
//! [`crate::HeartbeatResponse`]. [`CommandPayload`] is the strongly-typed
//! shape an orchestrator builds before serializing it into `Command::payload`
//! (a JSON string, per the wire shape in the specification's external
//! interfaces section — kept as a string rather than a nested object so the
//! agent can treat unknown future fields opaquely).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directories an `APPLY_CONFIG` command may write under. Anything else,
/// or any path containing `..`, is rejected before the command is ever
/// queued for an agent.
pub const APPLY_CONFIG_ALLOWED_ROOTS: &[&str] = &[
    "/etc/netly",
    "/etc/wireguard",
    "/etc/systemd/system",
    "/etc/sing-box",
    "/var/lib/netly",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    ApplyConfig,
    InstallService,
    RemoveService,
    Restart,
    Stop,
    Start,
    ExecuteScript,
    UpdateAgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Delivered,
    Succeeded,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadValidationError {
    #[error("target path `{0}` escapes its allowed root")]
    PathTraversal(String),
    #[error("target path `{0}` is not under an allowed netly directory")]
    DisallowedRoot(String),
    #[error("service name `{0}` contains illegal characters")]
    BadServiceName(String),
}

/// Strongly-typed payload for every [`CommandType`]. Serializes with an
/// internal `kind` tag purely for readability in logs; the wire format is
/// the JSON-stringified form stored in `Command::payload`, not this enum
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CommandPayload {
    ApplyConfig {
        target_path: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        service_name: Option<String>,
        #[serde(default)]
        backup: bool,
        #[serde(default)]
        enable: bool,
    },
    InstallService {
        service_name: String,
        content: String,
        start_now: bool,
    },
    RemoveService {
        service_name: String,
    },
    Restart {
        service_name: String,
    },
    Stop {
        service_name: String,
    },
    Start {
        service_name: String,
    },
    ExecuteScript {
        script: String,
        #[serde(default = "default_interpreter")]
        interpreter: String,
    },
    UpdateAgent {
        download_url: String,
        checksum_sha256: String,
    },
}

fn default_interpreter() -> String {
    "bash".to_string()
}

impl CommandPayload {
    pub fn command_type(&self) -> CommandType {
        match self {
            CommandPayload::ApplyConfig { .. } => CommandType::ApplyConfig,
            CommandPayload::InstallService { .. } => CommandType::InstallService,
            CommandPayload::RemoveService { .. } => CommandType::RemoveService,
            CommandPayload::Restart { .. } => CommandType::Restart,
            CommandPayload::Stop { .. } => CommandType::Stop,
            CommandPayload::Start { .. } => CommandType::Start,
            CommandPayload::ExecuteScript { .. } => CommandType::ExecuteScript,
            CommandPayload::UpdateAgent { .. } => CommandType::UpdateAgent,
        }
    }

    /// Local-contract validation run before a command is ever persisted to
    /// the task registry. Mirrors the agent-side checks described for
    /// `CMD_APPLY_CONFIG` / `CMD_INSTALL_SERVICE`, duplicated here so the
    /// control plane never queues a command it already knows is illegal.
    pub fn validate(&self) -> Result<(), PayloadValidationError> {
        match self {
            CommandPayload::ApplyConfig { target_path, .. } => validate_target_path(target_path),
            CommandPayload::InstallService { service_name, .. }
            | CommandPayload::RemoveService { service_name }
            | CommandPayload::Restart { service_name }
            | CommandPayload::Stop { service_name }
            | CommandPayload::Start { service_name } => validate_service_name(service_name),
            CommandPayload::ExecuteScript { .. } | CommandPayload::UpdateAgent { .. } => Ok(()),
        }
    }
}

fn validate_target_path(path: &str) -> Result<(), PayloadValidationError> {
    if path.contains("..") {
        return Err(PayloadValidationError::PathTraversal(path.to_string()));
    }
    let under_allowed_root = APPLY_CONFIG_ALLOWED_ROOTS
        .iter()
        .any(|root| path == *root || path.starts_with(&format!("{root}/")));
    if !under_allowed_root {
        return Err(PayloadValidationError::DisallowedRoot(path.to_string()));
    }
    Ok(())
}

fn validate_service_name(name: &str) -> Result<(), PayloadValidationError> {
    let safe = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if safe {
        Ok(())
    } else {
        Err(PayloadValidationError::BadServiceName(name.to_string()))
    }
}

/// Wire representation of a queued command, exactly the shape returned
/// inside a heartbeat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub node_id: u64,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    /// JSON-stringified [`CommandPayload`].
    pub payload: String,
    pub priority: i32,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_config_rejects_traversal() {
        let p = CommandPayload::ApplyConfig {
            target_path: "/etc/wireguard/../../etc/passwd".into(),
            content: String::new(),
            service_name: None,
            backup: false,
            enable: false,
        };
        assert_eq!(
            p.validate(),
            Err(PayloadValidationError::PathTraversal(
                "/etc/wireguard/../../etc/passwd".into()
            ))
        );
    }

    #[test]
    fn apply_config_rejects_outside_allowed_roots() {
        let p = CommandPayload::ApplyConfig {
            target_path: "/home/user/.ssh/authorized_keys".into(),
            content: String::new(),
            service_name: None,
            backup: false,
            enable: false,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn apply_config_accepts_allowed_root() {
        let p = CommandPayload::ApplyConfig {
            target_path: "/etc/wireguard/wg0.conf".into(),
            content: "[Interface]".into(),
            service_name: Some("wg-quick@wg0".into()),
            backup: true,
            enable: true,
        };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn service_name_rejects_metacharacters() {
        let p = CommandPayload::RemoveService {
            service_name: "wg0; rm -rf /".into(),
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn command_type_round_trips_through_json() {
        let json = serde_json::to_string(&CommandType::ApplyConfig).unwrap();
        assert_eq!(json, "\"APPLY_CONFIG\"");
        let back: CommandType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CommandType::ApplyConfig);
    }
}
