//! Source composition: the precedence mechanism.
//!
//! A [`Pipeline`] builds the record in a scratch value, applying each source
//! in order against that same value, and assigns it to the caller's
//! destination only when every source succeeded. A failed pipeline leaves the
//! destination exactly as it was.

use std::fmt;

use tracing::debug;

use crate::context::Context;
use crate::error::LayerfigError;
use crate::source::Source;

/// An ordered list of sources; later sources override earlier ones.
pub struct Pipeline<T> {
    sources: Vec<Box<dyn Source<T>>>,
}

/// Compose `sources` into a [`Pipeline`], applied in the given order.
pub fn compose<T>(sources: Vec<Box<dyn Source<T>>>) -> Pipeline<T> {
    Pipeline { sources }
}

impl<T> Pipeline<T> {
    pub fn push(&mut self, source: impl Source<T> + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
        }
    }
}

impl<T: Default> Pipeline<T> {
    /// Resolve into a fresh value instead of an existing destination.
    pub fn resolve(&self, ctx: &Context) -> Result<T, LayerfigError> {
        let mut cfg = T::default();
        self.apply(ctx, &mut cfg)?;
        Ok(cfg)
    }
}

impl<T: Default> Source<T> for Pipeline<T> {
    fn apply(&self, ctx: &Context, dest: &mut T) -> Result<(), LayerfigError> {
        let mut cfg = T::default();
        for (index, source) in self.sources.iter().enumerate() {
            debug!(index, "applying config source");
            source
                .apply(ctx, &mut cfg)
                .map_err(|e| LayerfigError::Source {
                    index,
                    source: Box::new(e),
                })?;
        }
        *dest = cfg;
        Ok(())
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("sources", &self.sources.len())
            .finish()
    }
}
