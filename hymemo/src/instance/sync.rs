use std::{fmt, sync::Arc};

use log::{debug, trace};

use crate::{
    blueprint::{EvaluatorKind, Layout},
    instance::Frozen,
    registry::LetName,
    scope::{MemoValue, Resolve, downcast},
    utils::{
        error::{MemoError, MemoResult},
        lazy::LazySlot,
    },
};

/// Instance of a blueprint whose lazy attributes can be read from several threads.
///
/// Each slot is a [`LazySlot`]: when several threads request an attribute that is not computed
/// yet, one of them runs the computation and the others wait for its result. A failed
/// computation is not cached; the next reader runs it again.
///
/// A computation that (directly or indirectly) reads its own attribute fails with
/// [`MemoError::Cycle`]. Only the thread running a computation is checked, so a cycle spread
/// across threads still blocks.
pub struct SyncInstance<T> {
    fields: T,
    layout: Arc<Layout<T>>,
    slots: Box<[LazySlot<Arc<dyn MemoValue>>]>,
}

impl<T> SyncInstance<T> {
    pub(crate) fn construct(layout: Arc<Layout<T>>, fields: T) -> MemoResult<Self> {
        let instance = Self {
            fields,
            slots: (0..layout.len()).map(|_| LazySlot::new()).collect(),
            layout,
        };

        if instance.layout.kind.is_immutable() {
            // The instance is not shared yet, nobody else can observe a partially populated slot.
            for index in 0..instance.layout.len() {
                instance.slots[index].get_or_try_init(
                    || {
                        instance
                            .layout
                            .evaluate(index, &instance.fields, &instance)
                    },
                    || instance.cycle(index),
                )?;
            }
        }

        debug!(
            "Constructed {} shared instance of `{}` with {} memoized attribute(s)",
            instance.layout.kind,
            instance.layout.name,
            instance.slots.len()
        );
        Ok(instance)
    }

    pub fn get_dyn(&self, name: &str) -> MemoResult<Arc<dyn MemoValue>> {
        let index = self.layout.index_of(name)?;
        let slot = &self.slots[index];
        if let Some(value) = slot.peek() {
            if self.layout.trace {
                trace!("Cache hit for `{}` on an instance of `{}`", name, self.layout.name);
            }
            return Ok(value);
        }

        match self.layout.kind {
            EvaluatorKind::Mutable => slot.get_or_try_init(
                || self.layout.evaluate(index, &self.fields, self),
                || self.cycle(index),
            ),
            EvaluatorKind::Immutable => Err(MemoError::Unset {
                name: self.layout.name_at(index).clone(),
            }),
        }
    }

    fn cycle(&self, index: usize) -> MemoError {
        MemoError::Cycle {
            name: self.layout.name_at(index).clone(),
        }
    }

    pub fn get<V: MemoValue>(&self, name: &str) -> MemoResult<Arc<V>> {
        downcast(name, self.get_dyn(name)?)
    }

    /// Current content of the slot `name`, without evaluating or waiting for it.
    pub fn peek<V: MemoValue>(&self, name: &str) -> Option<Arc<V>> {
        let index = self.layout.registry.position(name)?;
        self.slots[index].peek()?.downcast_arc::<V>().ok()
    }

    pub fn is_computed(&self, name: &str) -> bool {
        self.layout
            .registry
            .position(name)
            .is_some_and(|index| self.slots[index].is_ready())
    }

    /// Names whose slot is populated, in declaration order.
    pub fn computed(&self) -> Vec<LetName> {
        self.layout
            .registry
            .iter()
            .zip(self.slots.iter())
            .filter(|(_, slot)| slot.is_ready())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Evaluate every memoized attribute that is not computed yet, in declaration order.
    pub fn force_all(&self) -> MemoResult<()> {
        for name in self.layout.registry.iter() {
            self.get_dyn(name)?;
        }
        Ok(())
    }

    /// Turn this instance into a read-only [`Frozen`] instance, failing if a slot is unset.
    pub fn freeze(self) -> MemoResult<Frozen<T>> {
        let slots = self
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.peek().ok_or_else(|| MemoError::Unpopulated {
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

    pub fn blueprint_name(&self) -> &str {
        &self.layout.name
    }

    pub fn kind(&self) -> EvaluatorKind {
        self.layout.kind
    }

    pub fn list_declared(&self) -> &[LetName] {
        self.layout.registry.list()
    }
}

impl<T> Resolve for SyncInstance<T> {
    fn resolve(&self, name: &str) -> MemoResult<Arc<dyn MemoValue>> {
        self.get_dyn(name)
    }
}

impl<T: fmt::Debug> fmt::Debug for SyncInstance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncInstance")
            .field("blueprint", &self.layout.name)
            .field("fields", &self.fields)
            .field("computed", &self.computed())
            .finish()
    }
}
