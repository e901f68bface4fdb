//! The [`Source`] abstraction and the defaults source.
//!
//! A source mutates part of a record from one origin. Sources are unaware of
//! each other; precedence comes entirely from the order a
//! [`Pipeline`](crate::Pipeline) applies them in, each one seeing the record
//! as the previous ones left it.

use crate::context::Context;
use crate::error::LayerfigError;
use crate::record::Record;

pub trait Source<T> {
    fn apply(&self, ctx: &Context, cfg: &mut T) -> Result<(), LayerfigError>;
}

impl<T, F> Source<T> for F
where
    F: Fn(&Context, &mut T) -> Result<(), LayerfigError>,
{
    fn apply(&self, ctx: &Context, cfg: &mut T) -> Result<(), LayerfigError> {
        self(ctx, cfg)
    }
}

/// Applies [`Record::set_defaults`]. Never fails; a record without a
/// defaults block is left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSource;

impl<T: Record> Source<T> for DefaultSource {
    fn apply(&self, _ctx: &Context, cfg: &mut T) -> Result<(), LayerfigError> {
        cfg.set_defaults();
        Ok(())
    }
}
