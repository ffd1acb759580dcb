// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use log::debug;
use serde::Deserialize;

use crate::{ArmRegister, RegisterWidth, WriterError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct HookConfig {
    pub trampoline: ConfigSectionTrampoline,
    pub jump: ConfigSectionJump,
    pub log: ConfigSectionLog,
}

impl HookConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, WriterError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;

        debug!("Configuratie geladen: {config:?}");
        Ok(config)
    }

    fn validate(&self) -> Result<(), WriterError> {
        let register = self.trampoline.scratch_register;
        if !register.is_general_purpose() || register.describe().width() != RegisterWidth::W64 {
            return Err(WriterError::UnsupportedRegister {
                instruction: "scratch-register",
                register,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigSectionTrampoline {
    /// Clobbered by every far jump and call stub.
    pub scratch_register: ArmRegister,
}

impl Default for ConfigSectionTrampoline {
    fn default() -> Self {
        Self {
            scratch_register: ArmRegister::IP1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigSectionJump {
    /// Use a single `B` when the target is within reach.
    pub allow_near: bool,
}

impl Default for ConfigSectionJump {
    fn default() -> Self {
        Self {
            allow_near: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigSectionLog {
    /// Log every composed stub instruction by instruction.
    pub dump_instructions: bool,
}
