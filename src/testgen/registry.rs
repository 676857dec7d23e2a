use std::collections::BTreeMap;

use crate::error::InvocationError;
use crate::llm::client::{LlmClient, ProviderConfig};
use crate::testgen::generator::{
    GenerationContext, LlmTestGenerator, RetryPolicy, SkeletonGenerator, TestCodeGenerator,
};

/// Everything a generator factory may need. Fields a factory does not use
/// are ignored.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub context: GenerationContext,
    pub retry: RetryPolicy,
    pub provider: ProviderConfig,
}

pub type GeneratorFactory =
    fn(&GeneratorSettings) -> Result<Box<dyn TestCodeGenerator>, InvocationError>;

/// Name -> generator constructor, filled once at startup.
pub struct GeneratorRegistry {
    factories: BTreeMap<&'static str, GeneratorFactory>,
}

impl GeneratorRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register("llm", build_llm);
        reg.register("skeleton", build_skeleton);
        reg
    }

    pub fn register(&mut self, name: &'static str, factory: GeneratorFactory) {
        self.factories.insert(name, factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn build(
        &self,
        name: &str,
        settings: &GeneratorSettings,
    ) -> Result<Box<dyn TestCodeGenerator>, InvocationError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| InvocationError::UnknownGenerator(name.to_string()))?;

        factory(settings)
    }
}

fn build_llm(settings: &GeneratorSettings) -> Result<Box<dyn TestCodeGenerator>, InvocationError> {
    let client = LlmClient::new(settings.provider.clone())?;
    let gen = LlmTestGenerator::new(Box::new(client), settings.context.clone())
        .with_retry(settings.retry);
    Ok(Box::new(gen))
}

fn build_skeleton(_: &GeneratorSettings) -> Result<Box<dyn TestCodeGenerator>, InvocationError> {
    Ok(Box::new(SkeletonGenerator))
}
