//! Instances stamped from a [`crate::Blueprint`].
//!
//! [`Instance`] is the single-threaded instance: lazy attributes are cached in per-instance slots
//! and a computed-flag set records which slots hold a value. [`Frozen`] is the read-only form an
//! instance takes once every slot is populated. [`sync::SyncInstance`] shares lazy attributes
//! between threads.
use std::{cell::RefCell, fmt, sync::Arc};

use bit_set::BitSet;
use log::{debug, trace};

use crate::{
    blueprint::{EvaluatorKind, Layout},
    registry::LetName,
    scope::{MemoValue, Resolve, downcast},
    utils::error::{MemoError, MemoResult},
};

pub mod sync;

/// Single-threaded instance of a blueprint.
///
/// For mutable blueprints, [`Instance::get`] computes an attribute on its first successful
/// access and caches it; a failing computation leaves the slot unset so the next access retries.
/// For immutable blueprints every slot is populated during construction and reads never compute.
///
/// Reading an attribute from inside its own computation fails with [`MemoError::Cycle`].
pub struct Instance<T> {
    fields: T,
    layout: Arc<Layout<T>>,
    slots: RefCell<Vec<Option<Arc<dyn MemoValue>>>>,
    computed: RefCell<BitSet>,
    evaluating: RefCell<BitSet>,
}

/// Marks a slot as being evaluated until dropped, unwinding included.
struct Evaluating<'a> {
    set: &'a RefCell<BitSet>,
    index: usize,
}

impl Drop for Evaluating<'_> {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(self.index);
    }
}

impl<T> Instance<T> {
    pub(crate) fn construct(layout: Arc<Layout<T>>, fields: T) -> MemoResult<Self> {
        let len = layout.len();
        let instance = Self {
            fields,
            slots: RefCell::new(vec![None; len]),
            computed: RefCell::new(BitSet::with_capacity(len)),
            evaluating: RefCell::new(BitSet::with_capacity(len)),
            layout,
        };

        if instance.layout.kind.is_immutable() {
            instance.on_construct()?;
        }

        debug!(
            "Constructed {} instance of `{}` with {} memoized attribute(s)",
            instance.layout.kind, instance.layout.name, len
        );
        Ok(instance)
    }

    /// Construction hook of immutable blueprints: evaluate every pending computation in
    /// declaration order.
    fn on_construct(&self) -> MemoResult<()> {
        for index in 0..self.layout.len() {
            let value = self.layout.evaluate(index, &self.fields, self)?;
            self.store(index, value);
        }
        Ok(())
    }

    fn cached(&self, index: usize) -> Option<Arc<dyn MemoValue>> {
        if !self.computed.borrow().contains(index) {
            return None;
        }
        self.slots.borrow()[index].clone()
    }

    /// Write `value` into the slot at `index` unless it is already populated, and return what
    /// the slot holds afterwards.
    fn store(&self, index: usize, value: Arc<dyn MemoValue>) -> Arc<dyn MemoValue> {
        if let Some(existing) = self.cached(index) {
            return existing;
        }

        self.slots.borrow_mut()[index] = Some(Arc::clone(&value));
        self.computed.borrow_mut().insert(index);
        value
    }

    /// Read the memoized attribute `name` without assuming its type.
    pub fn get_dyn(&self, name: &str) -> MemoResult<Arc<dyn MemoValue>> {
        let index = self.layout.index_of(name)?;
        if let Some(value) = self.cached(index) {
            if self.layout.trace {
                trace!("Cache hit for `{}` on an instance of `{}`", name, self.layout.name);
            }
            return Ok(value);
        }

        match self.layout.kind {
            EvaluatorKind::Mutable => {
                if !self.evaluating.borrow_mut().insert(index) {
                    return Err(MemoError::Cycle {
                        name: self.layout.name_at(index).clone(),
                    });
                }
                let guard = Evaluating {
                    set: &self.evaluating,
                    index,
                };

                // No borrow is held while evaluating, the computation may read other attributes.
                let value = self.layout.evaluate(index, &self.fields, self);
                drop(guard);
                Ok(self.store(index, value?))
            }
            EvaluatorKind::Immutable => Err(MemoError::Unset {
                name: self.layout.name_at(index).clone(),
            }),
        }
    }

    /// Read the memoized attribute `name` as a `V`.
    pub fn get<V: MemoValue>(&self, name: &str) -> MemoResult<Arc<V>> {
        downcast(name, self.get_dyn(name)?)
    }

    /// Current content of the slot `name`, without evaluating it.
    ///
    /// Returns `None` when the slot is unset, the name is not declared, or the slot holds another
    /// type.
    pub fn peek<V: MemoValue>(&self, name: &str) -> Option<Arc<V>> {
        let index = self.layout.registry.position(name)?;
        self.cached(index)?.downcast_arc::<V>().ok()
    }

    pub fn is_computed(&self, name: &str) -> bool {
        self.layout
            .registry
            .position(name)
            .is_some_and(|index| self.computed.borrow().contains(index))
    }

    /// Names whose slot is populated, in declaration order.
    pub fn computed(&self) -> Vec<LetName> {
        let computed = self.computed.borrow();
        self.layout
            .registry
            .iter()
            .enumerate()
            .filter(|(index, _)| computed.contains(*index))
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Evaluate every memoized attribute that is not computed yet, in declaration order.
    pub fn force_all(&self) -> MemoResult<()> {
        for name in self.layout.registry.iter() {
            self.get_dyn(name)?;
        }
        Ok(())
    }

    /// Turn this instance into a read-only [`Frozen`] instance.
    ///
    /// Fails with [`MemoError::Unpopulated`] if a slot is still unset. Immutable instances can
    /// always be frozen; mutable ones usually go through [`Self::force_all`] first.
    pub fn freeze(self) -> MemoResult<Frozen<T>> {
        let slots = self
            .slots
            .into_inner()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| MemoError::Unpopulated {
                    blueprint: self.layout.name.clone(),
                    name: self.layout.name_at(index).clone(),
                })
            })
            .collect::<MemoResult<Vec<_>>>()?;

        Ok(Frozen {
            fields: self.fields,
            layout: self.layout,
            slots,
        })
    }

    pub fn fields(&self) -> &T {
        &self.fields
    }

    pub fn into_fields(self) -> T {
        self.fields
    }

    pub fn blueprint_name(&self) -> &str {
        &self.layout.name
    }

    pub fn kind(&self) -> EvaluatorKind {
        self.layout.kind
    }

    /// Memoized attributes of this instance, in declaration order.
    pub fn list_declared(&self) -> &[LetName] {
        self.layout.registry.list()
    }
}

impl<T> Resolve for Instance<T> {
    fn resolve(&self, name: &str) -> MemoResult<Arc<dyn MemoValue>> {
        self.get_dyn(name)
    }
}

impl<T: fmt::Debug> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("blueprint", &self.layout.name)
            .field("fields", &self.fields)
            .field("slots", &self.slots.borrow())
            .finish()
    }
}

/// Instance whose memoized attributes are all populated and can no longer change.
///
/// `Frozen<T>` is `Send + Sync` whenever `T` is.
pub struct Frozen<T> {
    fields: T,
    layout: Arc<Layout<T>>,
    slots: Vec<Arc<dyn MemoValue>>,
}

impl<T> Frozen<T> {
    pub fn get_dyn(&self, name: &str) -> MemoResult<Arc<dyn MemoValue>> {
        let index = self.layout.index_of(name)?;
        Ok(Arc::clone(&self.slots[index]))
    }

    pub fn get<V: MemoValue>(&self, name: &str) -> MemoResult<Arc<V>> {
        downcast(name, self.get_dyn(name)?)
    }

    pub fn fields(&self) -> &T {
        &self.fields
    }

    pub fn blueprint_name(&self) -> &str {
        &self.layout.name
    }

    pub fn list_declared(&self) -> &[LetName] {
        self.layout.registry.list()
    }
}

impl<T: fmt::Debug> fmt::Debug for Frozen<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frozen")
            .field("blueprint", &self.layout.name)
            .field("fields", &self.fields)
            .field("slots", &self.slots)
            .finish()
    }
}
