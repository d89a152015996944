//! Function-call interception.

use super::Restoration;
use crate::error::Result;
use crate::listeners::Publisher;
use crate::types::{ActiveInfo, InfoOptions, Key};
use crate::value::{Function, Object, Value};
use std::time::Instant;

/// Replace the function at `(owner, key)` with a forwarding wrapper.
///
/// The wrapper calls `original` with the same arguments, publishes the call
/// and hands back exactly what `original` returned, errors included.
pub(crate) fn install(
    owner: &Object,
    key: &Key,
    original: Function,
    publisher: Publisher,
    options: InfoOptions,
) -> Result<Restoration> {
    let target = original.clone();
    let wrapper = Function::wrapping(&original, move |args| {
        let started = options.performance.then(Instant::now);
        let result = target.call(args);

        let info = ActiveInfo {
            id: None,
            function: Some(target.clone()),
            arguments: Some(args.to_vec()),
            info: options,
            performance: started.map(|s| s.elapsed()),
            error: result.as_ref().err().cloned(),
        };
        let output = result.as_ref().map_or(Value::Null, Clone::clone);
        publisher.publish(info, &output, None);

        result
    });

    owner.swap_function(key, &original, wrapper.clone())?;
    Ok(Restoration::Function {
        owner: owner.clone(),
        key: key.clone(),
        original,
        wrapper,
    })
}
