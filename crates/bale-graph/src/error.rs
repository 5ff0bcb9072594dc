use thiserror::Error;

use crate::ModuleId;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("module '{0}' is already in the graph")]
    DuplicateModule(ModuleId),

    #[error("module '{0}' is not in the graph")]
    UnknownModule(ModuleId),
}
