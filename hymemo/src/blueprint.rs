//! Blueprints: templates carrying memoized attribute declarations.
//!
//! A [`Blueprint`] is attached to one evaluator ([`EvaluatorKind`]) when it is created. Each call
//! to [`Blueprint::declare`] registers a name and binds a computation to it. Instances stamped by
//! [`Blueprint::construct`] evaluate those computations either on first access
//! ([`EvaluatorKind::Mutable`]) or all at once before construction returns
//! ([`EvaluatorKind::Immutable`]).
//!
//! Declarations live in a copy-on-write layout: instances keep the layout they were constructed
//! with, and [`Blueprint::derive`] hands the child a snapshot of the parent's declarations.
use std::{fmt, marker::PhantomData, sync::Arc};

use log::{debug, trace};
use strum::{Display, EnumIs};

use crate::{
    instance::{Instance, sync::SyncInstance},
    registry::{LetName, LetRegistry},
    scope::{MemoValue, Resolve, Scope},
    utils::{
        conf::MemoConfig,
        error::{ComputeError, MemoError, MemoResult},
    },
};

/// Lifecycle policy of the memoized attributes of a blueprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIs, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EvaluatorKind {
    /// Computed on first access, cached thereafter.
    #[default]
    Mutable,

    /// Computed during construction, in declaration order, then read-only.
    Immutable,
}

/// Select the evaluator for a blueprint.
///
/// ```rust
/// # use hymemo::{EvaluatorKind, select};
/// assert_eq!(select(true), EvaluatorKind::Immutable);
/// assert_eq!(select(false), EvaluatorKind::default());
/// ```
pub const fn select(use_immutable: bool) -> EvaluatorKind {
    if use_immutable {
        EvaluatorKind::Immutable
    } else {
        EvaluatorKind::Mutable
    }
}

/// Type-erased computation bound to a memoized attribute.
pub(crate) trait Compute<T>: Send + Sync {
    fn compute(&self, scope: &Scope<'_, T>) -> Result<Arc<dyn MemoValue>, ComputeError>;
}

struct Typed<F, V> {
    compute: F,
    _value: PhantomData<fn() -> V>,
}

impl<T, V, F> Compute<T> for Typed<F, V>
where
    V: MemoValue,
    F: Fn(&Scope<'_, T>) -> Result<V, ComputeError> + Send + Sync,
{
    fn compute(&self, scope: &Scope<'_, T>) -> Result<Arc<dyn MemoValue>, ComputeError> {
        (self.compute)(scope).map(|value| Arc::new(value) as Arc<dyn MemoValue>)
    }
}

/// Dispatch table shared by a blueprint and the instances it stamped.
pub(crate) struct Layout<T> {
    pub(crate) name: String,
    pub(crate) kind: EvaluatorKind,
    pub(crate) trace: bool,
    pub(crate) registry: LetRegistry,
    // INFO: indexed like `registry`
    pub(crate) computations: Vec<Arc<dyn Compute<T>>>,
}

impl<T> Clone for Layout<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            trace: self.trace,
            registry: self.registry.clone(),
            computations: self.computations.clone(),
        }
    }
}

impl<T> Layout<T> {
    pub(crate) fn len(&self) -> usize {
        self.registry.len()
    }

    pub(crate) fn name_at(&self, index: usize) -> &LetName {
        &self.registry.list()[index]
    }

    pub(crate) fn index_of(&self, name: &str) -> MemoResult<usize> {
        self.registry
            .position(name)
            .ok_or_else(|| MemoError::Undeclared {
                blueprint: self.name.clone(),
                name: LetName::from(name),
            })
    }

    /// Run the computation at `index` against an instance.
    pub(crate) fn evaluate(
        &self,
        index: usize,
        fields: &T,
        resolver: &dyn Resolve,
    ) -> MemoResult<Arc<dyn MemoValue>> {
        let name = self.name_at(index);
        if self.trace {
            trace!("Evaluating `{}` on an instance of `{}`", name, self.name);
        }

        let scope = Scope::new(fields, resolver);
        self.computations[index]
            .compute(&scope)
            .map_err(|source| MemoError::Computation {
                name: name.clone(),
                source,
            })
    }
}

/// Template from which instances with memoized attributes are stamped.
///
/// ```rust
/// # use hymemo::{Blueprint, EvaluatorKind};
/// struct User {
///     first_name: String,
///     last_name: String,
/// }
///
/// let mut user = Blueprint::<User>::attach("User", EvaluatorKind::Mutable);
/// user.declare("full_name", |u| Ok(format!("{} {}", u.first_name, u.last_name)));
///
/// let joe = user
///     .construct(User { first_name: "Joe".into(), last_name: "Doe".into() })
///     .unwrap();
/// assert!(joe.peek::<String>("full_name").is_none());
/// assert_eq!(*joe.get::<String>("full_name").unwrap(), "Joe Doe");
/// ```
pub struct Blueprint<T> {
    layout: Arc<Layout<T>>,
}

impl<T> Blueprint<T> {
    /// Create a blueprint using the mutable (lazy) evaluator.
    pub fn new(name: impl Into<String>) -> Self {
        Self::attach(name, EvaluatorKind::Mutable)
    }

    /// Create a blueprint attached to the evaluator `kind`.
    pub fn attach(name: impl Into<String>, kind: EvaluatorKind) -> Self {
        let name = name.into();
        debug!("Attached {} evaluator to blueprint `{}`", kind, name);
        Self {
            layout: Arc::new(Layout {
                name,
                kind,
                trace: false,
                registry: LetRegistry::new(),
                computations: Vec::new(),
            }),
        }
    }

    /// Create a blueprint whose evaluator and tracing come from `config`.
    pub fn with_config(name: impl Into<String>, config: &MemoConfig) -> Self {
        let mut blueprint = Self::attach(name, config.kind());
        Arc::make_mut(&mut blueprint.layout).trace = config.trace_evaluations;
        blueprint
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn kind(&self) -> EvaluatorKind {
        self.layout.kind
    }

    /// Declare the memoized attribute `name`, computed by `compute`.
    ///
    /// `compute` receives a [`Scope`] over the instance being evaluated. Declaring a name twice
    /// keeps its position in [`Self::list_declared`] and replaces the computation. Instances
    /// constructed before this call are not affected.
    pub fn declare<V, F>(&mut self, name: impl Into<LetName>, compute: F) -> &mut Self
    where
        V: MemoValue,
        F: Fn(&Scope<'_, T>) -> Result<V, ComputeError> + Send + Sync + 'static,
    {
        let name = name.into();
        let computation: Arc<dyn Compute<T>> = Arc::new(Typed {
            compute,
            _value: PhantomData,
        });

        let layout = Arc::make_mut(&mut self.layout);
        let (position, inserted) = layout.registry.insert(name.clone());
        if inserted {
            layout.computations.push(computation);
            debug!(
                "Declared memoized attribute `{}` on blueprint `{}` at position {}",
                name, layout.name, position
            );
        } else {
            layout.computations[position] = computation;
            debug!(
                "Replaced computation of memoized attribute `{}` on blueprint `{}`",
                name, layout.name
            );
        }

        self
    }

    /// Names of the memoized attributes, in declaration order.
    pub fn list_declared(&self) -> &[LetName] {
        self.layout.registry.list()
    }

    pub fn registry(&self) -> &LetRegistry {
        &self.layout.registry
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.layout.registry.contains(name)
    }

    /// Derive a child blueprint named `name`.
    ///
    /// The child inherits the evaluator and every attribute declared so far; its computations
    /// run against the child's own instances. Later declarations on either blueprint are not
    /// visible to the other.
    pub fn derive(&self, name: impl Into<String>) -> Self {
        let parent = &*self.layout;
        let child = Layout {
            name: name.into(),
            kind: parent.kind,
            trace: parent.trace,
            registry: parent.registry.on_derive(),
            computations: parent.computations.clone(),
        };

        debug!(
            "Derived blueprint `{}` from `{}` inheriting {} memoized attribute(s)",
            child.name,
            parent.name,
            child.registry.len()
        );
        Self {
            layout: Arc::new(child),
        }
    }

    /// Stamp a single-threaded instance from already bound base `fields`.
    ///
    /// For immutable blueprints every declared attribute is evaluated before this returns, and
    /// the first failing computation fails the construction.
    pub fn construct(&self, fields: T) -> MemoResult<Instance<T>> {
        Instance::construct(Arc::clone(&self.layout), fields)
    }

    /// Stamp an instance whose lazy attributes can be shared between threads.
    pub fn construct_sync(&self, fields: T) -> MemoResult<SyncInstance<T>> {
        SyncInstance::construct(Arc::clone(&self.layout), fields)
    }
}

impl<T> fmt::Debug for Blueprint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("name", &self.layout.name)
            .field("kind", &self.layout.kind)
            .field("declared", &self.layout.registry.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: i64,
        y: i64,
    }

    #[test]
    fn select_defaults_to_mutable() {
        assert_eq!(select(false), EvaluatorKind::Mutable);
        assert_eq!(select(true), EvaluatorKind::Immutable);
        assert_eq!(EvaluatorKind::default(), EvaluatorKind::Mutable);
        assert_eq!(EvaluatorKind::Immutable.to_string(), "immutable");
    }

    #[test]
    fn declarations_are_listed_in_order() {
        for kind in [EvaluatorKind::Mutable, EvaluatorKind::Immutable] {
            let mut blueprint = Blueprint::<Point>::attach("Point", kind);
            blueprint
                .declare("a", |p| Ok(p.x))
                .declare("b", |p| Ok(p.y))
                .declare("c", |p| Ok(p.x + p.y));
            assert_eq!(blueprint.list_declared(), ["a", "b", "c"], "kind {kind}");
        }
    }

    #[test]
    fn redeclaration_replaces_computation_in_place() {
        let mut blueprint = Blueprint::<Point>::new("Point");
        blueprint
            .declare("sum", |p| Ok(p.x + p.y))
            .declare("x", |p| Ok(p.x))
            .declare("sum", |p| Ok(p.x * p.y));

        assert_eq!(blueprint.list_declared(), ["sum", "x"]);
        let point = blueprint.construct(Point { x: 3, y: 4 }).unwrap();
        assert_eq!(*point.get::<i64>("sum").unwrap(), 12);
    }

    #[test]
    fn derivation_snapshots_declarations() {
        let mut parent = Blueprint::<Point>::attach("Point", EvaluatorKind::Immutable);
        parent.declare("x", |p| Ok(p.x));

        let mut child = parent.derive("Point3");
        parent.declare("parent_only", |p| Ok(p.y));
        child.declare("child_only", |p| Ok(-p.y));

        assert_eq!(child.kind(), EvaluatorKind::Immutable);
        assert_eq!(parent.list_declared(), ["x", "parent_only"]);
        assert_eq!(child.list_declared(), ["x", "child_only"]);
    }

    #[test]
    fn instances_keep_their_layout() {
        let mut blueprint = Blueprint::<Point>::new("Point");
        blueprint.declare("x", |p| Ok(p.x));
        let before = blueprint.construct(Point { x: 1, y: 2 }).unwrap();

        blueprint.declare("y", |p| Ok(p.y));
        let after = blueprint.construct(Point { x: 1, y: 2 }).unwrap();

        assert!(before.get::<i64>("y").unwrap_err().is_undeclared());
        assert_eq!(*after.get::<i64>("y").unwrap(), 2);
    }

    #[test]
    fn config_selects_evaluator() {
        let config = MemoConfig {
            immutable: true,
            trace_evaluations: true,
        };
        let blueprint = Blueprint::<Point>::with_config("Point", &config);
        assert!(blueprint.kind().is_immutable());
        assert!(blueprint.list_declared().is_empty());
    }
}
