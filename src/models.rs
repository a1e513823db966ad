use serde::Serialize;
use std::fmt;

/// A published crate and the functions built from its documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crate {
    pub name: String,
    pub version: String,
    pub functions: Vec<Function>,
}

impl Crate {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            functions: Vec::new(),
        }
    }

    /// Key under which the decompiler names this crate's `function_name`.
    pub fn symbol_path(&self, function_name: &str) -> String {
        format!("{}::{function_name}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Function {
    pub name: String,
    pub is_unsafe: bool,
    pub source: String,
    pub decompiles: Vec<String>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_unsafe: false,
            source: String::new(),
            decompiles: Vec::new(),
        }
    }
}

impl fmt::Display for Crate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "/// CRATE: {}@{}", self.name, self.version)?;
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let safety = if self.is_unsafe { "UNSAFE" } else { "SAFE" };
        writeln!(f, "/// {safety} FUNCTION: {}", self.name)?;
        writeln!(f, "{}", self.source)?;
        for (id, decompile) in self.decompiles.iter().enumerate() {
            writeln!(f, "/// DECOMPILE: {}.{id}", self.name)?;
            writeln!(f, "{decompile}")?;
        }
        Ok(())
    }
}
