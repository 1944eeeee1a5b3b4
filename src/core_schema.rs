//! Core metadata domain
//!
//! The `esphomeyaml` section names the device, picks the chip and board, and
//! can declare boot and shutdown automations.

use crate::schema::{FieldKind, MapSchema};

pub const CORE_DOMAIN: &str = "esphomeyaml";
pub const NETWORK_DOMAIN: &str = "wifi";

/// Domains every configuration must contain
pub const REQUIRED_DOMAINS: [&str; 2] = [CORE_DOMAIN, NETWORK_DOMAIN];

pub const CONF_NAME: &str = "name";
pub const CONF_PLATFORM: &str = "platform";
pub const CONF_BOARD: &str = "board";
pub const CONF_LIBRARY_URI: &str = "library_uri";
pub const CONF_SIMPLIFY: &str = "simplify";
pub const CONF_USE_BUILD_FLAGS: &str = "use_build_flags";
pub const CONF_BOARD_FLASH_MODE: &str = "board_flash_mode";
pub const CONF_ON_BOOT: &str = "on_boot";
pub const CONF_ON_SHUTDOWN: &str = "on_shutdown";
pub const CONF_TRIGGER_ID: &str = "trigger_id";
pub const CONF_PRIORITY: &str = "priority";
pub const CONF_THEN: &str = "then";

pub const DEFAULT_LIBRARY_URI: &str = "https://github.com/OttoWinter/esphomelib.git#v1.6.2";

pub const BUILD_FLASH_MODES: [&str; 4] = ["qio", "qout", "dio", "dout"];

pub const STARTUP_TRIGGER: &str = "esphomelib::StartupTrigger";
pub const SHUTDOWN_TRIGGER: &str = "esphomelib::ShutdownTrigger";

/// Shared shape of an automation: its action list is validated downstream
pub fn automation_schema() -> MapSchema {
    MapSchema::new().optional(CONF_THEN, FieldKind::Any)
}

/// Schema of the core metadata domain
pub fn core_schema() -> MapSchema {
    let on_boot = automation_schema()
        .generate_id(CONF_TRIGGER_ID, FieldKind::DeclareId(STARTUP_TRIGGER.into()))
        .optional(CONF_PRIORITY, FieldKind::Float);
    let on_shutdown = automation_schema()
        .generate_id(CONF_TRIGGER_ID, FieldKind::DeclareId(SHUTDOWN_TRIGGER.into()));

    MapSchema::new()
        .required(CONF_NAME, FieldKind::ValidName)
        .required(CONF_PLATFORM, FieldKind::String)
        .required(CONF_BOARD, FieldKind::String)
        .with_default(CONF_LIBRARY_URI, FieldKind::String, DEFAULT_LIBRARY_URI)
        .with_default(CONF_SIMPLIFY, FieldKind::Bool, true)
        .with_default(CONF_USE_BUILD_FLAGS, FieldKind::Bool, true)
        .optional(CONF_BOARD_FLASH_MODE, FieldKind::one_of(BUILD_FLASH_MODES))
        .optional(CONF_ON_BOOT, FieldKind::list(FieldKind::Map(on_boot)))
        .optional(CONF_ON_SHUTDOWN, FieldKind::list(FieldKind::Map(on_shutdown)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, Value};
    use crate::schema::{ConfigSchema, ViolationKind};

    fn minimal() -> Vec<(&'static str, Node)> {
        vec![
            (CONF_NAME, Node::from("d1")),
            (CONF_PLATFORM, Node::from("esp32")),
            (CONF_BOARD, Node::from("nodemcu")),
        ]
    }

    #[test]
    fn test_core_defaults_applied() {
        let validated = core_schema().validate(&Node::mapping(minimal())).unwrap();
        assert_eq!(
            validated.get(CONF_LIBRARY_URI).and_then(Node::as_str),
            Some(DEFAULT_LIBRARY_URI)
        );
        assert_eq!(validated.get(CONF_SIMPLIFY), Some(&Node::from(true)));
        assert_eq!(validated.get(CONF_USE_BUILD_FLAGS), Some(&Node::from(true)));
        assert!(validated.get(CONF_ON_BOOT).is_none());
    }

    #[test]
    fn test_on_boot_declares_trigger() {
        let mut fields = minimal();
        fields.push((
            CONF_ON_BOOT,
            Node::mapping([(CONF_PRIORITY, Node::from(-10i64))]),
        ));
        let validated = core_schema().validate(&Node::mapping(fields)).unwrap();
        let boot = validated.get(CONF_ON_BOOT).and_then(Node::as_sequence).unwrap();
        assert_eq!(boot.len(), 1);
        assert_eq!(boot[0].get(CONF_PRIORITY).map(|n| &n.value), Some(&Value::Float(-10.0)));
        let trigger = boot[0].get(CONF_TRIGGER_ID).and_then(Node::as_identifier).unwrap();
        assert!(trigger.is_declaration());
        assert_eq!(trigger.type_tag(), Some(STARTUP_TRIGGER));
    }

    #[test]
    fn test_shutdown_rejects_priority() {
        let mut fields = minimal();
        fields.push((
            CONF_ON_SHUTDOWN,
            Node::sequence([Node::mapping([(CONF_PRIORITY, Node::from(1i64))])]),
        ));
        let err = core_schema().validate(&Node::mapping(fields)).unwrap_err();
        assert_eq!(err.kind, ViolationKind::ExtraKey);
        assert_eq!(err.path, vec![CONF_ON_SHUTDOWN, "0", CONF_PRIORITY]);
    }

    #[test]
    fn test_missing_board_is_violation() {
        let fields: Vec<_> = minimal().into_iter().filter(|(k, _)| *k != CONF_BOARD).collect();
        let err = core_schema().validate(&Node::mapping(fields)).unwrap_err();
        assert_eq!(err.kind, ViolationKind::MissingKey);
    }
}
