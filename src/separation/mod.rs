//! Two-stem separation behind a single-method adapter.
//!
//! The processor only ever sees [`Separator::separate`]; how the tool is run
//! and how its output tree is searched lives in the implementations.

mod demucs;
mod resolve;

pub use demucs::DemucsSeparator;
pub use resolve::{find_model_root, resolve_stems};

use std::path::Path;

use crate::{error::Result, types::SeparatedStems};

pub trait Separator: Send + Sync {
    /// Splits `input` into a vocal and a residual stem somewhere under
    /// `output_root`, blocking until both files exist.
    fn separate(&self, input: &Path, output_root: &Path) -> Result<SeparatedStems>;
}

impl<S: Separator + ?Sized> Separator for Box<S> {
    fn separate(&self, input: &Path, output_root: &Path) -> Result<SeparatedStems> {
        (**self).separate(input, output_root)
    }
}
