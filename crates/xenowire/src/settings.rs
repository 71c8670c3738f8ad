use std::fs;
use std::path::Path;

use serde::Deserialize;
use xenowire_frame::{CodeDef, MessageRegistry, ProtocolConfig};

use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID};

/// Contents of a `--config` file.
///
/// ```json
/// {
///   "protocol": { "preload": 175, "max_retries": 5 },
///   "codes": [{ "code": 256, "name": "telemetry", "demands_ack": true }]
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub protocol: ProtocolConfig,
    pub codes: Vec<CodeDef>,
}

impl Settings {
    /// Load settings and apply command-line overrides.
    pub fn load(path: Option<&Path>, preload: Option<u8>) -> CliResult<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|err| {
                    io_error(&format!("failed reading {}", path.display()), err)
                })?;
                serde_json::from_str::<Settings>(&text).map_err(|err| {
                    CliError::new(
                        DATA_INVALID,
                        format!("invalid config {}: {err}", path.display()),
                    )
                })?
            }
            None => Settings::default(),
        };

        if let Some(preload) = preload {
            settings.protocol.preload = preload;
        }
        settings
            .protocol
            .validate()
            .map_err(|err| frame_error("invalid protocol config", err))?;
        Ok(settings)
    }

    pub fn registry(&self) -> MessageRegistry {
        let mut registry = MessageRegistry::new();
        for def in &self.codes {
            registry.register(def.clone());
        }
        registry
    }
}
