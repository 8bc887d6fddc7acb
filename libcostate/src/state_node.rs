//! Addressable state tree
//!
//! A root store holds a [`StateNode`]: one value plus any number of keyed
//! child nodes. Children are created the first time a sub-state view
//! references them and are shared copy-on-write between snapshots.
//!
//! Values are type-erased; each view knows its own value type and reads it
//! back through a typed lens built by [`value_lens`] and [`child_lens`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::lens::Lens;

/// Type-erased state value with value equality
pub trait StateValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn eq_value(&self, other: &dyn StateValue) -> bool;
}

impl<T> StateValue for T
where
    T: Any + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_value(&self, other: &dyn StateValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// Key of a child node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKey {
    Name(String),
    Index(i64),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Name(name) => write!(f, "{}", name),
            NodeKey::Index(index) => write!(f, "#{}", index),
        }
    }
}

impl From<&str> for NodeKey {
    fn from(name: &str) -> Self {
        NodeKey::Name(name.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(name: String) -> Self {
        NodeKey::Name(name)
    }
}

macro_rules! index_key {
    ($($t:ty),*) => {
        $(impl From<$t> for NodeKey {
            fn from(index: $t) -> Self {
                NodeKey::Index(i64::from(index))
            }
        })*
    };
}

index_key!(i8, i16, i32, i64, u8, u16, u32);

/// One node of the state tree
#[derive(Clone)]
pub struct StateNode {
    value: Arc<dyn StateValue>,
    children: Arc<BTreeMap<NodeKey, StateNode>>,
}

impl StateNode {
    pub fn new<T: StateValue>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            children: Arc::new(BTreeMap::new()),
        }
    }

    /// The node value, if it is a `T`
    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.value.as_any().downcast_ref::<T>()
    }

    pub fn child(&self, key: &NodeKey) -> Option<&StateNode> {
        self.children.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.children.keys()
    }

    /// Copy of this node holding `value`, children untouched
    pub fn with_value<T: StateValue>(&self, value: T) -> Self {
        Self {
            value: Arc::new(value),
            children: Arc::clone(&self.children),
        }
    }

    /// Copy of this node with `child` stored under `key`
    pub fn with_child(&self, key: NodeKey, child: StateNode) -> Self {
        let mut children = Arc::clone(&self.children);
        Arc::make_mut(&mut children).insert(key, child);
        Self {
            value: Arc::clone(&self.value),
            children,
        }
    }
}

impl PartialEq for StateNode {
    fn eq(&self, other: &Self) -> bool {
        let same_value =
            Arc::ptr_eq(&self.value, &other.value) || self.value.eq_value(other.value.as_ref());
        let same_children =
            Arc::ptr_eq(&self.children, &other.children) || self.children == other.children;
        same_value && same_children
    }
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Lens from a node to its typed value
///
/// A node whose value is not a `T` reads as `init()`.
pub(crate) fn value_lens<T, F>(init: F) -> Lens<StateNode, T>
where
    T: StateValue + Clone,
    F: Fn() -> T + Send + Sync + 'static,
{
    Lens::new(
        move |node: &StateNode| node.value::<T>().cloned().unwrap_or_else(&init),
        |node: &StateNode, value: T| node.with_value(value),
    )
}

/// Lens from a node to its child under `key`
///
/// An absent child reads as a fresh node holding `init()`.
pub(crate) fn child_lens<T, F>(key: NodeKey, init: F) -> Lens<StateNode, StateNode>
where
    T: StateValue,
    F: Fn() -> T + Send + Sync + 'static,
{
    let set_key = key.clone();
    Lens::new(
        move |node: &StateNode| {
            node.child(&key)
                .cloned()
                .unwrap_or_else(|| StateNode::new(init()))
        },
        move |node: &StateNode, child: StateNode| node.with_child(set_key.clone(), child),
    )
}
