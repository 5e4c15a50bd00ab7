//! One owner for every store a running VM saves and restores.

use crate::config::{ConfigError, SaveConfig};
use crate::descriptor::DescriptorError;
use crate::dialogue_log::DialogueLog;
use crate::glyph::GlyphPool;
use crate::parts::PartsEngine;
use crate::scene_cache::SceneCache;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schema(#[from] DescriptorError),
}

/// Every store the VM's save system touches. Contexts are independent, so
/// several may coexist.
#[derive(Debug)]
pub struct SaveContext {
    config: SaveConfig,
    pub dialogue_log: DialogueLog,
    pub scene_cache: SceneCache,
    pub glyphs: GlyphPool,
    pub parts: PartsEngine,
}

impl SaveContext {
    pub fn new(config: SaveConfig) -> Result<Self, ContextError> {
        config.validate()?;
        Ok(Self {
            dialogue_log: DialogueLog::new(config.dialogue_log_capacity),
            scene_cache: SceneCache::new(config.scene_cache_capacity),
            glyphs: GlyphPool::new(config.glyph_pool_capacity),
            parts: PartsEngine::new(&config.parts)?,
            config,
        })
    }

    pub fn with_defaults() -> Result<Self, ContextError> {
        Self::new(SaveConfig::default())
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    /// Return every store to its freshly constructed state.
    pub fn reset(&mut self) -> Result<(), ContextError> {
        *self = Self::new(self.config.clone())?;
        tracing::debug!("save context reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::PartsNumber;
    use crate::render::NullRenderer;

    #[test]
    fn new_context_uses_config_capacities() {
        let config = SaveConfig {
            dialogue_log_capacity: 3,
            scene_cache_capacity: 4,
            ..SaveConfig::default()
        };
        let ctx = SaveContext::new(config).unwrap();
        assert_eq!(ctx.dialogue_log.capacity(), 3);
        assert_eq!(ctx.scene_cache.capacity(), 4);
        assert_eq!(ctx.dialogue_log.page_count(), 1);
        assert!(ctx.parts.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SaveConfig {
            dialogue_log_capacity: 0,
            ..SaveConfig::default()
        };
        assert!(matches!(
            SaveContext::new(config),
            Err(ContextError::Config(ConfigError::ZeroCapacity { .. }))
        ));
    }

    #[test]
    fn reset_empties_every_store() {
        let mut ctx = SaveContext::with_defaults().unwrap();
        let mut r = NullRenderer::new();
        ctx.dialogue_log.add_text("line");
        ctx.dialogue_log.new_page();
        ctx.parts.get_or_create(PartsNumber(1));
        ctx.glyphs.create(
            crate::glyph::GlyphSpec {
                ch: 'x',
                font_size: 16,
                color: [0, 0, 0],
            },
            &mut r,
        );

        ctx.reset().unwrap();
        assert_eq!(ctx.dialogue_log.page_count(), 1);
        assert_eq!(ctx.dialogue_log.text_count(0), Ok(0));
        assert!(ctx.parts.is_empty());
        assert!(ctx.glyphs.is_empty());
        assert!(ctx.scene_cache.is_empty());
    }

    #[test]
    fn contexts_are_independent() {
        let mut a = SaveContext::with_defaults().unwrap();
        let b = SaveContext::with_defaults().unwrap();
        a.dialogue_log.add_text("only in a");
        assert_eq!(a.dialogue_log.text_count(0), Ok(1));
        assert_eq!(b.dialogue_log.text_count(0), Ok(0));
    }
}
