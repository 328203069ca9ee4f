//! VM configuration
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. Config file: explicit path, `LUNE_CONFIG_PATH`, or `lune.toml` in the working directory
//! 3. `LUNE_*` environment variables (e.g. `LUNE_VALUE_STACK_CAPACITY=4096`)
//! 4. Builder overrides

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default capacity of both processor stacks
pub const DEFAULT_STACK_CAPACITY: usize = 131_072;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum number of values on one processor's value stack
    pub value_stack_capacity: usize,

    /// Maximum number of in-flight frames on one processor
    pub execution_stack_capacity: usize,

    /// Whether calls and resumes are timed into performance counters
    pub performance_stats: bool,

    /// Default `tracing` filter directive used by the CLI
    pub log_filter: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            value_stack_capacity: DEFAULT_STACK_CAPACITY,
            execution_stack_capacity: DEFAULT_STACK_CAPACITY,
            performance_stats: true,
            log_filter: "info".to_string(),
        }
    }
}

impl VmConfig {
    pub fn builder() -> VmConfigBuilder {
        VmConfigBuilder::default()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }

    fn validate(&self) -> Result<()> {
        if self.value_stack_capacity == 0 {
            anyhow::bail!("value_stack_capacity must be greater than zero");
        }
        if self.execution_stack_capacity == 0 {
            anyhow::bail!("execution_stack_capacity must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct VmConfigBuilder {
    config_path: Option<PathBuf>,
    value_stack_capacity: Option<usize>,
    execution_stack_capacity: Option<usize>,
    performance_stats: Option<bool>,
}

impl VmConfigBuilder {
    /// Use this config file instead of the default search (the file must exist)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn value_stack_capacity(mut self, capacity: usize) -> Self {
        self.value_stack_capacity = Some(capacity);
        self
    }

    pub fn execution_stack_capacity(mut self, capacity: usize) -> Self {
        self.execution_stack_capacity = Some(capacity);
        self
    }

    pub fn performance_stats(mut self, enabled: bool) -> Self {
        self.performance_stats = Some(enabled);
        self
    }

    pub fn build(self) -> Result<VmConfig> {
        let path = self
            .config_path
            .or_else(|| std::env::var("LUNE_CONFIG_PATH").ok().map(PathBuf::from));

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("lune").required(false),
        };

        let mut vm_config: VmConfig = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("LUNE").try_parsing(true))
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if let Some(capacity) = self.value_stack_capacity {
            vm_config.value_stack_capacity = capacity;
        }
        if let Some(capacity) = self.execution_stack_capacity {
            vm_config.execution_stack_capacity = capacity;
        }
        if let Some(enabled) = self.performance_stats {
            vm_config.performance_stats = enabled;
        }

        vm_config.validate()?;
        Ok(vm_config)
    }
}
