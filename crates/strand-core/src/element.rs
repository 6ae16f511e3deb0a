//! Immutable element descriptions consumed by the reconciler.
//!
//! An [`Element`] describes one desired UI node and its children. Elements
//! are produced fresh for every render request and never mutated; the
//! engine consumes them while building the next fiber generation.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Reserved attribute name carrying the content of a text element.
pub const NODE_VALUE: &str = "nodeValue";

/// Ordered attribute map. Insertion order is preserved so attribute
/// application against the render surface is deterministic.
pub type Attributes = IndexMap<String, AttrValue, ahash::RandomState>;

/// A component is a plain function from its attributes to the single
/// element it renders. Using a function pointer (rather than a boxed
/// closure) keeps component identity comparable across generations,
/// which the diff relies on to decide reuse versus replacement.
pub type ComponentFn = fn(&Attributes) -> Element;

/// Cheaply clonable event callback attached to a surface node.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn()>);

impl EventHandler {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn invoke(&self) {
        (self.0)();
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        // Identity, not structure: a freshly built closure is a new handler.
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

/// Attribute values understood by the engine and the render surface.
#[derive(Clone, Debug)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_handler(&self) -> bool {
        matches!(self, AttrValue::Handler(_))
    }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Text(a), AttrValue::Text(b)) => a == b,
            (AttrValue::Number(a), AttrValue::Number(b)) => a == b,
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (AttrValue::Handler(a), AttrValue::Handler(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<EventHandler> for AttrValue {
    fn from(value: EventHandler) -> Self {
        AttrValue::Handler(value)
    }
}

/// What kind of node an element (or the fiber mirroring it) describes.
#[derive(Clone, Debug)]
pub enum ElementKind {
    /// A surface-backed node addressed by its type tag.
    Host(String),
    /// A text-content node; its content lives in the [`NODE_VALUE`] attribute.
    Text,
    /// A component boundary; evaluated rather than materialized.
    Component(ComponentFn),
}

impl PartialEq for ElementKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ElementKind::Host(a), ElementKind::Host(b)) => a == b,
            (ElementKind::Text, ElementKind::Text) => true,
            (ElementKind::Component(a), ElementKind::Component(b)) => {
                *a as usize == *b as usize
            }
            _ => false,
        }
    }
}

/// Immutable description of one desired UI node and its children.
#[derive(Clone, Debug)]
pub struct Element {
    pub kind: ElementKind,
    pub attrs: Attributes,
    pub children: Vec<Element>,
}

impl Element {
    pub fn host(tag: impl Into<String>, attrs: Attributes, children: Vec<Element>) -> Self {
        Self {
            kind: ElementKind::Host(tag.into()),
            attrs,
            children,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        let mut attrs = Attributes::default();
        attrs.insert(NODE_VALUE.to_owned(), AttrValue::Text(content.into()));
        Self {
            kind: ElementKind::Text,
            attrs,
            children: Vec::new(),
        }
    }

    pub fn component(func: ComponentFn, attrs: Attributes) -> Self {
        Self {
            kind: ElementKind::Component(func),
            attrs,
            children: Vec::new(),
        }
    }
}
