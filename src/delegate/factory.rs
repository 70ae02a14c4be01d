//! Factories of last resort.

use std::any::type_name;
use std::marker::PhantomData;

/// Creates an instance when resolution yields nothing usable.
pub trait InstanceFactory<T>: Send + Sync {
    fn create(&self) -> Result<T, FactoryError>;
}

#[derive(Debug, thiserror::Error)]
#[error("cannot create `{type_name}`: {reason}")]
pub struct FactoryError {
    pub type_name: &'static str,
    pub reason: String,
}

impl FactoryError {
    pub fn new<T>(reason: impl Into<String>) -> Self {
        Self {
            type_name: type_name::<T>(),
            reason: reason.into(),
        }
    }
}

/// Uses `T::default()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFactory;

impl<T: Default> InstanceFactory<T> for DefaultFactory {
    fn create(&self) -> Result<T, FactoryError> {
        Ok(T::default())
    }
}

/// Never produces an instance; resolution failures become errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFactory;

impl<T> InstanceFactory<T> for NoFactory {
    fn create(&self) -> Result<T, FactoryError> {
        Err(FactoryError::new::<T>("no fallback construction configured"))
    }
}

/// Wraps a closure.
pub struct FnFactory<T, F> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> FnFactory<T, F>
where
    F: Fn() -> Result<T, FactoryError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<T, F> InstanceFactory<T> for FnFactory<T, F>
where
    F: Fn() -> Result<T, FactoryError> + Send + Sync,
{
    fn create(&self) -> Result<T, FactoryError> {
        (self.f)()
    }
}
