//! Evaluation context handed to memoized computations.
use std::{any::type_name, fmt, ops::Deref, sync::Arc};

use downcast_rs::{DowncastSync, impl_downcast};

use crate::{
    registry::LetName,
    utils::error::{MemoError, MemoResult},
};

/// A value that can be stored in a memoized slot.
///
/// Implemented for every `'static + Send + Sync` type. Slots store values type-erased and typed
/// reads downcast them back. Values do not need to implement `Debug`: an erased value formats as
/// the name of its type.
pub trait MemoValue: DowncastSync {
    /// Name of the concrete type of the value.
    fn value_type_name(&self) -> &'static str;
}
impl_downcast!(sync MemoValue);

impl<T: Send + Sync + 'static> MemoValue for T {
    fn value_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

impl fmt::Debug for dyn MemoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", <dyn MemoValue as MemoValue>::value_type_name(self))
    }
}

/// Resolves memoized attributes of the instance a computation runs against.
pub(crate) trait Resolve {
    fn resolve(&self, name: &str) -> MemoResult<Arc<dyn MemoValue>>;
}

/// View of the instance under evaluation.
///
/// Dereferences to the base fields of the instance, and resolves other memoized attributes
/// through [`Scope::get`]. For mutable blueprints, resolving an attribute that is not computed yet
/// evaluates it first. For immutable blueprints only attributes declared earlier are available
/// while the instance is being constructed.
///
/// An attribute reading itself, directly or through other attributes, fails with
/// [`MemoError::Cycle`].
pub struct Scope<'a, T> {
    fields: &'a T,
    resolver: &'a dyn Resolve,
}

impl<'a, T> Scope<'a, T> {
    pub(crate) fn new(fields: &'a T, resolver: &'a dyn Resolve) -> Self {
        Self { fields, resolver }
    }

    /// Base fields of the instance.
    pub fn fields(&self) -> &'a T {
        self.fields
    }

    /// Read the memoized attribute `name` as a `V`.
    pub fn get<V: MemoValue>(&self, name: &str) -> MemoResult<Arc<V>> {
        downcast(name, self.resolver.resolve(name)?)
    }

    /// Read the memoized attribute `name` without assuming its type.
    pub fn get_dyn(&self, name: &str) -> MemoResult<Arc<dyn MemoValue>> {
        self.resolver.resolve(name)
    }
}

impl<T> Deref for Scope<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.fields
    }
}

pub(crate) fn downcast<V: MemoValue>(name: &str, value: Arc<dyn MemoValue>) -> MemoResult<Arc<V>> {
    value
        .downcast_arc::<V>()
        .map_err(|_| MemoError::TypeMismatch {
            name: LetName::from(name),
            expected: type_name::<V>(),
        })
}

#[cfg(test)]
mod tests {
    use crate::Blueprint;

    use super::*;

    /// Deliberately without `Debug`.
    struct Opaque(u32);

    #[test]
    fn values_without_debug_can_be_memoized() {
        let mut blueprint = Blueprint::<u32>::new("Counter");
        blueprint.declare("opaque", |n| Ok(Opaque(**n + 1)));

        let instance = blueprint.construct(1).unwrap();
        assert_eq!(instance.get::<Opaque>("opaque").unwrap().0, 2);

        let rendered = format!("{instance:?}");
        assert!(rendered.contains(type_name::<Opaque>()), "unexpected output: {rendered}");
    }

    #[test]
    fn erased_value_formats_as_its_type() {
        let value: Arc<dyn MemoValue> = Arc::new(7u8);
        assert_eq!(format!("{value:?}"), "<u8>");
    }
}
