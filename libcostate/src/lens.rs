//! Composable getter/setter pairs
//!
//! A [`Lens<S, A>`] focuses a whole `S` on one part `A`. Both halves are
//! pure: `set` builds a new whole instead of mutating the old one. Lenses
//! compose with [`Lens::compose`] (or `+`) to reach arbitrarily deep parts,
//! and the identity lens is the neutral element of composition.
//!
//! # Example
//!
//! ```
//! use libcostate::Lens;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Street { number: u32, name: String }
//! #[derive(Clone, Debug, PartialEq)]
//! struct Address { city: String, street: Street }
//!
//! let address_street: Lens<Address, Street> = Lens::new(
//!     |a: &Address| a.street.clone(),
//!     |a: &Address, street| Address { street, ..a.clone() },
//! );
//! let street_name: Lens<Street, String> = Lens::new(
//!     |s: &Street| s.name.clone(),
//!     |s: &Street, name| Street { name, ..s.clone() },
//! );
//!
//! let address_street_name = address_street + street_name;
//! let address = Address {
//!     city: "Functional city".to_string(),
//!     street: Street { number: 23, name: "lambda street".to_string() },
//! };
//!
//! let renamed = address_street_name.modify(&address, |name| name.to_uppercase());
//! assert_eq!(renamed.street.name, "LAMBDA STREET");
//! ```

use std::fmt;
use std::ops::Add;
use std::sync::Arc;

type Getter<S, A> = Arc<dyn Fn(&S) -> A + Send + Sync>;
type Setter<S, A> = Arc<dyn Fn(&S, A) -> S + Send + Sync>;

/// Pure, composable accessor between a whole `S` and a part `A`
pub struct Lens<S, A> {
    get: Getter<S, A>,
    set: Setter<S, A>,
}

impl<S, A> Clone for Lens<S, A> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<S, A> fmt::Debug for Lens<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens").field("id", &self.id()).finish()
    }
}

impl<S, A> Lens<S, A> {
    /// Identity of this lens instance, stable across clones
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.get) as *const () as usize
    }
}

impl<S: 'static, A: 'static> Lens<S, A> {
    /// Build a lens from a getter and a copy-on-write setter
    pub fn new<G, T>(get: G, set: T) -> Self
    where
        G: Fn(&S) -> A + Send + Sync + 'static,
        T: Fn(&S, A) -> S + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Read the part out of `whole`
    pub fn get(&self, whole: &S) -> A {
        (self.get)(whole)
    }

    /// Return a copy of `whole` with its part replaced by `part`
    pub fn set(&self, whole: &S, part: A) -> S {
        (self.set)(whole, part)
    }

    /// Return a copy of `whole` with `f` applied to its part
    pub fn modify(&self, whole: &S, f: impl FnOnce(A) -> A) -> S {
        self.set(whole, f(self.get(whole)))
    }

    /// Focus further through `inner`
    ///
    /// The composed getter reads `inner` out of this lens' part; the composed
    /// setter writes the new inner value into the current part and then the
    /// part back into the whole.
    pub fn compose<B: 'static>(&self, inner: &Lens<A, B>) -> Lens<S, B> {
        let (outer_get, outer_set) = (Arc::clone(&self.get), Arc::clone(&self.set));
        let (inner_get, inner_set) = (Arc::clone(&inner.get), Arc::clone(&inner.set));
        let get_part = Arc::clone(&outer_get);

        Lens {
            get: Arc::new(move |whole: &S| inner_get(&outer_get(whole))),
            set: Arc::new(move |whole: &S, value: B| {
                let part = inner_set(&get_part(whole), value);
                outer_set(whole, part)
            }),
        }
    }
}

impl<S: Clone + 'static> Lens<S, S> {
    /// The lens focusing a value on itself
    pub fn identity() -> Self {
        Lens::new(|whole: &S| whole.clone(), |_: &S, part: S| part)
    }
}

impl<S: 'static, A: 'static, B: 'static> Add<Lens<A, B>> for Lens<S, A> {
    type Output = Lens<S, B>;

    fn add(self, inner: Lens<A, B>) -> Lens<S, B> {
        self.compose(&inner)
    }
}
