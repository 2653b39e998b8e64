//! Lazily-computed, memoized attributes declared on blueprints.
//!
//! A [`Blueprint`] is a template for instances. Memoized attributes are declared on it by name,
//! each bound to a computation that reads the instance it runs against through a [`Scope`]. The
//! blueprint is attached to one of two evaluators, chosen with [`select`]:
//! - [`EvaluatorKind::Mutable`]: an attribute is computed on its first access and cached. A
//!   failing computation is not cached and runs again on the next access.
//! - [`EvaluatorKind::Immutable`]: every attribute is computed during construction, in
//!   declaration order. The instance is fully populated before it is returned, and can be turned
//!   into a read-only [`Frozen`] instance.
//!
//! Declared names are tracked in a [`LetRegistry`] and listed in declaration order. Derived
//! blueprints ([`Blueprint::derive`]) start from a snapshot of their parent's declarations.
//!
//! ```rust
//! # use hymemo::{Blueprint, select};
//! struct User {
//!     first_name: String,
//!     last_name: String,
//! }
//!
//! let mut person = Blueprint::<User>::attach("Person", select(true));
//! person.declare("full_name", |u| Ok(format!("{} {}", u.first_name, u.last_name)));
//! let user = person.derive("User");
//!
//! let joe = user
//!     .construct(User { first_name: "Joe".into(), last_name: "Doe".into() })
//!     .unwrap();
//! assert_eq!(user.list_declared(), ["full_name"]);
//! assert_eq!(joe.peek::<String>("full_name").as_deref().map(String::as_str), Some("Joe Doe"));
//! ```

pub mod blueprint;
pub mod instance;
pub mod magic;
pub mod registry;
pub mod scope;
pub mod utils;

pub use blueprint::{Blueprint, EvaluatorKind, select};
pub use instance::{Frozen, Instance, sync::SyncInstance};
pub use registry::{LetName, LetRegistry};
pub use scope::{MemoValue, Scope};
pub use utils::{
    conf::MemoConfig,
    error::{ComputeError, MemoError, MemoResult},
};

/// Generate an extension trait with one typed accessor per memoized attribute.
///
/// ```rust
/// # use hymemo::{Blueprint, lets};
/// struct Circle {
///     radius: f64,
/// }
///
/// lets! {
///     trait CircleLets for Circle {
///         area: f64,
///     }
/// }
///
/// let mut circle = Blueprint::<Circle>::new("Circle");
/// circle.declare("area", |c| Ok(std::f64::consts::PI * c.radius * c.radius));
/// let unit = circle.construct(Circle { radius: 1.0 }).unwrap();
/// assert_eq!(*unit.area().unwrap(), std::f64::consts::PI);
/// ```
#[cfg(feature = "derive")]
pub use hymemo_derive::lets;
