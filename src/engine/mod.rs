pub mod soffice;
pub mod types;

use anyhow::Result;
use std::sync::Arc;

pub use types::{ConvertIn, ConvertOut, EngineDiag};

pub trait Engine {
    fn doctor(&self) -> Result<EngineDiag>;
    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut>;
}

impl<E: Engine + ?Sized> Engine for Arc<E> {
    fn doctor(&self) -> Result<EngineDiag> {
        (**self).doctor()
    }

    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut> {
        (**self).convert(req)
    }
}
