use crate::entity::EntityId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("object {0} is not tracked by this index")]
    NotTracked(EntityId),
}
