//! Generator registry — the single source of truth for which formats exist.
//!
//! Generators are stateless once built but construction is not free, so one
//! shared instance per format is cached behind a read-write lock. The
//! process-wide registry lives behind a [`OnceLock`]; tests that must not
//! leak instances across cases use their own registry or [`GeneratorRegistry::clear`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::cii::CiiGenerator;
use super::descriptor::{Syntax, descriptor_for};
use super::facturx::FacturXGenerator;
use super::fatturapa::FatturaPaGenerator;
use super::ksef::KsefGenerator;
use super::ubl::UblGenerator;
use super::FormatGenerator;
use crate::core::{FormatId, UnknownFormatError};

pub struct GeneratorRegistry {
    cache: RwLock<HashMap<FormatId, Arc<dyn FormatGenerator>>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get the shared generator for a format key.
    ///
    /// The same key always yields the identical instance until [`clear`]
    /// is called; unknown keys fail with [`UnknownFormatError`].
    ///
    /// [`clear`]: Self::clear
    pub fn create(&self, id: &str) -> Result<Arc<dyn FormatGenerator>, UnknownFormatError> {
        Ok(self.create_for(FormatId::parse(id)?))
    }

    /// Get the shared generator for an already-parsed format id.
    pub fn create_for(&self, format: FormatId) -> Arc<dyn FormatGenerator> {
        if let Some(generator) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&format)
        {
            return Arc::clone(generator);
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // A racing writer may have built it between the locks; the first
        // insert wins and everyone shares that instance.
        Arc::clone(
            cache
                .entry(format)
                .or_insert_with(|| build_generator(format)),
        )
    }

    /// All supported format keys, in registry order.
    pub fn available_formats(&self) -> Vec<&'static str> {
        FormatId::ALL.iter().map(|f| f.as_str()).collect()
    }

    /// Drop every cached instance; subsequent `create` calls construct
    /// fresh generators.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_generator(format: FormatId) -> Arc<dyn FormatGenerator> {
    let descriptor = descriptor_for(format);
    match descriptor.syntax {
        Syntax::Ubl => Arc::new(UblGenerator::new(descriptor)),
        Syntax::Cii if descriptor.embeds_pdf => Arc::new(FacturXGenerator::new(descriptor)),
        Syntax::Cii => Arc::new(CiiGenerator::new(descriptor)),
        Syntax::FatturaPa => Arc::new(FatturaPaGenerator::new(descriptor)),
        Syntax::KsefFa => Arc::new(KsefGenerator::new(descriptor)),
    }
}

/// The process-wide registry.
pub fn global_registry() -> &'static GeneratorRegistry {
    static REGISTRY: OnceLock<GeneratorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(GeneratorRegistry::new)
}
