//! Compiler configuration for extensibility.
//!
//! An embedding caller can register extra map-file search paths or
//! inject extern overloads programmatically, without needing a `.map`
//! file on disk for every native module.

use std::path::PathBuf;

use crate::types::IrType;

/// An extern overload registered directly in code rather than loaded from
/// a `.map` file.
#[derive(Debug, Clone)]
pub struct ExternOverride {
    pub module: String,
    pub function: String,
    pub arg_types: Vec<IrType>,
    pub native_symbol: String,
    pub return_type: IrType,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub map_search_paths: Vec<PathBuf>,
    pub extra_externs: Vec<ExternOverride>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_map_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_search_paths.push(path.into());
        self
    }

    pub fn with_extern(mut self, extern_override: ExternOverride) -> Self {
        self.extra_externs.push(extern_override);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_search_paths() {
        let config = CompilerConfig::new()
            .with_map_path("a")
            .with_map_path("b");
        assert_eq!(config.map_search_paths.len(), 2);
    }
}
