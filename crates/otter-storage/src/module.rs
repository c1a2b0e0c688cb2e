//! Script module surface: the op table exported as `@system.storage`.

use crate::bridge::{PreferenceBridge, Promise};
use crate::error::{StorageError, StorageResult};
use crate::request::Operation;
use crate::value::JsValue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Specifier scripts import the module by
pub const MODULE_NAME: &str = "@system.storage";

pub type OpHandler = Arc<dyn Fn(&PreferenceBridge, &[JsValue]) -> StorageResult<Promise> + Send + Sync>;

#[derive(Clone)]
pub struct OpDecl {
    name: String,
    handler: OpHandler,
}

impl OpDecl {
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub fn op<F>(name: &str, handler: F) -> OpDecl
where
    F: Fn(&PreferenceBridge, &[JsValue]) -> StorageResult<Promise> + Send + Sync + 'static,
{
    OpDecl {
        name: name.to_string(),
        handler: Arc::new(handler),
    }
}

/// Declarations for `get`, `set`, `delete` and `clear`
pub fn storage_ops() -> Vec<OpDecl> {
    Operation::ALL
        .into_iter()
        .map(|operation| op(operation.name(), move |bridge, args| bridge.operate(operation, args)))
        .collect()
}

/// A loaded `@system.storage` module
pub struct StorageModule {
    bridge: PreferenceBridge,
    ops: Mutex<HashMap<String, OpDecl>>,
}

impl StorageModule {
    /// Load the module, exporting every storage op
    pub fn new(bridge: PreferenceBridge) -> StorageResult<Self> {
        let module = Self {
            bridge,
            ops: Mutex::new(HashMap::new()),
        };
        for op in storage_ops() {
            module.register(op)?;
        }
        debug!(module = MODULE_NAME, "Storage module loaded");
        Ok(module)
    }

    pub fn register(&self, op: OpDecl) -> StorageResult<()> {
        let mut ops = self.ops.lock();
        if ops.contains_key(op.name()) {
            return Err(StorageError::DuplicateOp(op.name().to_string()));
        }
        ops.insert(op.name().to_string(), op);
        Ok(())
    }

    /// Exported function names, sorted
    pub fn exports(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ops.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke an exported function
    pub fn call(&self, name: &str, args: &[JsValue]) -> StorageResult<Promise> {
        let op = self
            .ops
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownOp(name.to_string()))?;
        (op.handler)(&self.bridge, args)
    }

    pub fn bridge(&self) -> &PreferenceBridge {
        &self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn module() -> StorageModule {
        let bridge = PreferenceBridge::new(StorageConfig::new().preferences_dir("/nonexistent"));
        StorageModule::new(bridge).unwrap()
    }

    #[test]
    fn test_exports() {
        assert_eq!(module().exports(), vec!["clear", "delete", "get", "set"]);
    }

    #[test]
    fn test_duplicate_op_rejected() {
        let module = module();
        let err = module
            .register(op("get", |bridge, args| bridge.get(args)))
            .unwrap_err();
        assert_eq!(err, StorageError::DuplicateOp("get".to_string()));
    }

    #[test]
    fn test_unknown_op() {
        let err = module().call("keys", &[]).unwrap_err();
        assert_eq!(err, StorageError::UnknownOp("keys".to_string()));
    }

    #[test]
    fn test_call_checks_arguments() {
        let err = module().call("get", &[]).unwrap_err();
        assert_eq!(
            err,
            StorageError::type_error("Not enough arguments, expected 1.")
        );
    }
}
