//! Callable values.

use super::Value;
use crate::error::CallError;
use std::fmt;
use std::sync::Arc;

type Body = dyn Fn(&[Value]) -> Result<Value, CallError> + Send + Sync;

struct FunctionInner {
    name: String,
    body: Box<Body>,
    /// Set on wrappers installed by function interception.
    original: Option<Function>,
}

/// A shared callable held in an object slot.
///
/// Identity is by reference: clones compare equal, two separately created
/// functions never do.
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionInner>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(FunctionInner {
                name: name.into(),
                body: Box::new(body),
                original: None,
            }),
        }
    }

    /// Wrap `original`, keeping its name and remembering it for restoration.
    pub(crate) fn wrapping<F>(original: &Function, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(FunctionInner {
                name: original.name().to_string(),
                body: Box::new(body),
                original: Some(original.clone()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        (self.inner.body)(args)
    }

    /// True for wrappers installed by function interception.
    pub fn is_instrumented(&self) -> bool {
        self.inner.original.is_some()
    }

    /// The function this wrapper forwards to.
    pub fn original(&self) -> Option<&Function> {
        self.inner.original.as_ref()
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_instrumented() {
            write!(f, "Function({}, instrumented)", self.name())
        } else {
            write!(f, "Function({})", self.name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_keeps_name_and_original() {
        let double = Function::new("double", |args| match args.first() {
            Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
            _ => Err(CallError::new("expected an integer")),
        });
        let inner = double.clone();
        let wrapper = Function::wrapping(&double, move |args| inner.call(args));

        assert_eq!(wrapper.name(), "double");
        assert!(wrapper.is_instrumented());
        assert!(wrapper.original().unwrap().ptr_eq(&double));
        assert!(matches!(wrapper.call(&[Value::Int(4)]), Ok(Value::Int(8))));
        assert_eq!(
            wrapper.call(&[]).unwrap_err(),
            CallError::new("expected an integer")
        );
    }
}
