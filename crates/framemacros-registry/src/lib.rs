//! Function registry for synthesized computations
//!
//! Functions are native closures over runtime values, looked up by name
//! and argument count. The same name may carry several overloads with
//! different arities (`startswith(s, p)` tests a string, `startswith(p)`
//! builds a column selector).

use framemacros_ir::{SpecError, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

mod builtins;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FunctionError {
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{0}")]
    Domain(String),

    #[error(transparent)]
    Spec(#[from] SpecError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("No method {func} accepting {actual} argument(s); expected {expected}")]
    ArityMismatch {
        func: String,
        expected: String,
        actual: usize,
    },

    #[error("{func}: {source}")]
    Function {
        func: String,
        #[source]
        source: FunctionError,
    },
}

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, argc: usize) -> bool {
        match *self {
            Arity::Exact(n) => argc == n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&argc),
            Arity::AtLeast(lo) => argc >= lo,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::Range(lo, hi) => write!(f, "{}..={}", lo, hi),
            Arity::AtLeast(lo) => write!(f, "{} or more", lo),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub arity: Arity,
    pub is_aggregate: bool,
    /// Returns a column specifier rather than data.
    #[serde(default)]
    pub is_selector: bool,
}

impl FunctionSignature {
    pub fn scalar(name: impl Into<String>, arity: Arity) -> Self {
        Self {
            name: name.into(),
            arity,
            is_aggregate: false,
            is_selector: false,
        }
    }

    pub fn aggregate(name: impl Into<String>) -> Self {
        Self {
            is_aggregate: true,
            ..Self::scalar(name, Arity::Exact(1))
        }
    }

    pub fn selector(name: impl Into<String>, arity: Arity) -> Self {
        Self {
            is_selector: true,
            ..Self::scalar(name, arity)
        }
    }
}

pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

#[derive(Clone)]
pub struct FunctionDef {
    pub signature: FunctionSignature,
    func: NativeFn,
}

impl FunctionDef {
    pub fn call(&self, args: &[Value]) -> Result<Value, FunctionError> {
        (self.func)(args)
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

pub struct FunctionRegistry {
    functions: HashMap<String, Vec<FunctionDef>>,
    version: String, // Semver for plan compatibility
}

impl FunctionRegistry {
    pub fn new(version: impl Into<String>) -> Self {
        let mut registry = Self::empty(version);
        builtins::register_builtins(&mut registry);
        registry
    }

    /// Registry without builtins.
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            functions: HashMap::new(),
            version: version.into(),
        }
    }

    /// Add an overload. Later registrations shadow earlier ones that accept
    /// the same argument count.
    pub fn register<F>(&mut self, signature: FunctionSignature, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.functions
            .entry(signature.name.clone())
            .or_default()
            .insert(
                0,
                FunctionDef {
                    signature,
                    func: Arc::new(func),
                },
            );
    }

    pub fn register_native<F>(&mut self, name: impl Into<String>, arity: Arity, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.register(FunctionSignature::scalar(name, arity), func);
    }

    pub fn lookup(&self, name: &str, argc: usize) -> Result<&FunctionDef, RegistryError> {
        let overloads = self
            .functions
            .get(name)
            .ok_or_else(|| RegistryError::FunctionNotFound(name.to_string()))?;

        overloads
            .iter()
            .find(|def| def.signature.arity.accepts(argc))
            .ok_or_else(|| RegistryError::ArityMismatch {
                func: name.to_string(),
                expected: overloads
                    .iter()
                    .map(|def| def.signature.arity.to_string())
                    .collect::<Vec<_>>()
                    .join(" | "),
                actual: argc,
            })
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RegistryError> {
        self.lookup(name, args.len())?
            .call(args)
            .map_err(|source| RegistryError::Function {
                func: name.to_string(),
                source,
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new("0.1.0")
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("version", &self.version)
            .field("functions", &self.functions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemacros_ir::ColumnSpec;

    #[test]
    fn test_builtin_lookup() {
        let registry = FunctionRegistry::default();

        let def = registry.lookup("uppercase", 1).unwrap();
        assert_eq!(def.signature.name, "uppercase");
        assert!(!def.signature.is_aggregate);
    }

    #[test]
    fn test_aggregate_lookup() {
        let registry = FunctionRegistry::default();

        let def = registry.lookup("sum", 1).unwrap();
        assert!(def.signature.is_aggregate);
    }

    #[test]
    fn test_overload_by_arity() {
        let registry = FunctionRegistry::default();

        assert_eq!(
            registry
                .call("startswith", &[Value::from("Mary"), Value::from("M")])
                .unwrap(),
            Value::Bool(true)
        );
        assert!(registry.lookup("startswith", 1).unwrap().signature.is_selector);
        assert!(matches!(
            registry.call("startswith", &[Value::from("S")]).unwrap(),
            Value::Spec(ColumnSpec::Predicate { .. })
        ));
    }

    #[test]
    fn test_unknown_and_arity_errors() {
        let registry = FunctionRegistry::default();

        assert_eq!(
            registry.call("frobnicate", &[]),
            Err(RegistryError::FunctionNotFound("frobnicate".to_string()))
        );
        assert!(matches!(
            registry.call("uppercase", &[]),
            Err(RegistryError::ArityMismatch { actual: 0, .. })
        ));
    }

    #[test]
    fn test_native_registration_shadows_builtin() {
        let mut registry = FunctionRegistry::default();
        registry.register_native("abs", Arity::Exact(1), |_| Ok(Value::Int(42)));

        assert_eq!(registry.call("abs", &[Value::Int(-1)]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_function_error_carries_name() {
        let registry = FunctionRegistry::default();

        let err = registry.call("uppercase", &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "uppercase: expected string, got int");
    }

    #[test]
    fn test_empty_registry_keeps_version() {
        let registry = FunctionRegistry::empty("2.1.0");
        assert_eq!(registry.version(), "2.1.0");
        assert!(registry.names().is_empty());
        assert!(matches!(
            registry.lookup("uppercase", 1),
            Err(RegistryError::FunctionNotFound(_))
        ));
    }
}
