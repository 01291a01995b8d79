//! Processing-block collaborator interface.
//!
//! A processing block is a pipeline stage (detector, fitter, estimator, ...)
//! that reads its inputs from a [`Context`] and writes its results back into
//! the same tree. Blocks are created from a configuration Context whose
//! `unit_type` member selects the factory registered in a [`BlockRegistry`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ContextError, Result};
use crate::value::Context;

/// A pipeline stage that mutates a Context in place.
pub trait ProcessingBlock: Send {
    fn process(&mut self, ctx: &mut Context) -> Result<()>;
}

impl<F> ProcessingBlock for F
where
    F: FnMut(&mut Context) -> Result<()> + Send,
{
    fn process(&mut self, ctx: &mut Context) -> Result<()> {
        self(ctx)
    }
}

/// Shared handle to a registered block factory.
pub type BlockFactory = Arc<dyn Fn(&Context) -> Result<Box<dyn ProcessingBlock>> + Send + Sync>;

struct Unit {
    factory: BlockFactory,
    default_model: Option<PathBuf>,
}

/// Maps `unit_type` names to block factories.
#[derive(Default)]
pub struct BlockRegistry {
    units: BTreeMap<String, Unit>,
}

impl BlockRegistry {
    /// Config member that selects the factory.
    pub const UNIT_TYPE_KEY: &'static str = "unit_type";

    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `unit_type`, replacing any previous one.
    pub fn register<F>(&mut self, unit_type: impl Into<String>, factory: F)
    where
        F: Fn(&Context) -> Result<Box<dyn ProcessingBlock>> + Send + Sync + 'static,
    {
        self.insert(unit_type.into(), Arc::new(factory), None);
    }

    /// Register a unit whose model file defaults to `model` relative to the
    /// SDK path when the config carries no `model_path`.
    pub fn register_with_model<F>(
        &mut self,
        unit_type: impl Into<String>,
        model: impl Into<PathBuf>,
        factory: F,
    ) where
        F: Fn(&Context) -> Result<Box<dyn ProcessingBlock>> + Send + Sync + 'static,
    {
        self.insert(unit_type.into(), Arc::new(factory), Some(model.into()));
    }

    fn insert(&mut self, unit_type: String, factory: BlockFactory, default_model: Option<PathBuf>) {
        if self.units.contains_key(&unit_type) {
            tracing::debug!(unit_type = %unit_type, "replacing processing block factory");
        }
        self.units.insert(
            unit_type,
            Unit {
                factory,
                default_model,
            },
        );
    }

    pub fn contains(&self, unit_type: &str) -> bool {
        self.units.contains_key(unit_type)
    }

    pub fn unit_types(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    fn unit_for(&self, config: &Context) -> Result<(&str, &Unit)> {
        let unit_type = config
            .at(Self::UNIT_TYPE_KEY)
            .ok()
            .and_then(|v| v.get_ref::<String>().ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ContextError::Block("config has no unit_type".to_string()))?;
        self.units
            .get_key_value(unit_type.as_str())
            .map(|(name, unit)| (name.as_str(), unit))
            .ok_or_else(|| ContextError::Block(format!("unknown unit_type: {unit_type}")))
    }

    /// Build the block selected by `config["unit_type"]`.
    pub fn create(&self, config: &Context) -> Result<Box<dyn ProcessingBlock>> {
        let (unit_type, unit) = self.unit_for(config)?;
        tracing::debug!(unit_type, "creating processing block");
        (unit.factory)(config)
    }
}

impl fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("unit_types", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Entry point that creates blocks on behalf of an installed SDK.
#[derive(Debug)]
pub struct Service {
    sdk_path: PathBuf,
    registry: BlockRegistry,
}

impl Service {
    /// Config member carrying the SDK installation path.
    pub const SDK_PATH_KEY: &'static str = "@sdk_path";
    /// Config member naming the model file of a block.
    pub const MODEL_PATH_KEY: &'static str = "model_path";

    pub fn new(sdk_path: impl Into<PathBuf>) -> Self {
        Self::with_registry(sdk_path, BlockRegistry::new())
    }

    pub fn with_registry(sdk_path: impl Into<PathBuf>, registry: BlockRegistry) -> Self {
        Self {
            sdk_path: sdk_path.into(),
            registry,
        }
    }

    pub fn sdk_path(&self) -> &Path {
        &self.sdk_path
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BlockRegistry {
        &mut self.registry
    }

    /// A fresh, empty Context.
    pub fn create_context(&self) -> Context {
        Context::new()
    }

    /// Create a block from a copy of `config` with the SDK path injected and,
    /// when the unit has a default model and none is configured, the model
    /// path resolved against the SDK path.
    pub fn create_processing_block(&self, config: &Context) -> Result<Box<dyn ProcessingBlock>> {
        let (config, factory) = self.prepare(config)?;
        factory(&config)
    }

    /// Resolve the factory for `config` and the config it will receive,
    /// without running the factory.
    pub fn prepare(&self, config: &Context) -> Result<(Context, BlockFactory)> {
        let mut config = config.clone();
        config.put(
            Self::SDK_PATH_KEY,
            self.sdk_path.to_string_lossy().into_owned(),
        )?;

        let (unit_type, unit) = self.registry.unit_for(&config)?;
        let has_model = !config
            .get_key_or(Self::MODEL_PATH_KEY, String::new())
            .is_empty();
        if let (Some(model), false) = (&unit.default_model, has_model) {
            let resolved = self.sdk_path.join(model);
            config.put(Self::MODEL_PATH_KEY, resolved.to_string_lossy().into_owned())?;
        }

        tracing::debug!(unit_type, "creating processing block");
        Ok((config, Arc::clone(&unit.factory)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_blocks() {
        let mut block = |ctx: &mut Context| ctx.put("seen", true);
        let mut ctx = Context::new();
        block.process(&mut ctx).unwrap();
        assert!(ctx["seen"].get::<bool>().unwrap());
    }

    #[test]
    fn debug_lists_unit_types() {
        let mut registry = BlockRegistry::new();
        registry.register("noop", |_| {
            Ok(Box::new(|_: &mut Context| -> Result<()> { Ok(()) }) as Box<dyn ProcessingBlock>)
        });
        assert_eq!(format!("{registry:?}"), r#"BlockRegistry { unit_types: ["noop"] }"#);
    }
}
