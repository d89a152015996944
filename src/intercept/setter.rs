//! Write-hook interception.

use super::Restoration;
use crate::error::Result;
use crate::listeners::Publisher;
use crate::types::{ActiveInfo, Key};
use crate::value::Object;
use std::sync::Arc;

/// Hook `(owner, key)` so every successful write publishes the new value.
///
/// The slot descriptor is left untouched; the write itself keeps its
/// original semantics and the hook runs after it completes.
pub(crate) fn install(owner: &Object, key: &Key, publisher: Publisher) -> Result<Restoration> {
    owner.install_hook(
        key,
        Arc::new(move |value| publisher.publish(ActiveInfo::default(), value, None)),
    )?;
    Ok(Restoration::Setter {
        owner: owner.clone(),
        key: key.clone(),
    })
}
