//! In-memory render surface.
//!
//! Stores nodes in a slab and records every mutation the committer
//! performs, so tests can assert both the final tree shape and the exact
//! set of operations a commit produced.

use hashbrown::HashMap;

use strand_core::{
    AttrValue, EventHandler, RenderSurface, SurfaceError, SurfaceId, NODE_VALUE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNodeKind {
    Element { tag: String },
    Text,
}

pub struct MemoryNode {
    pub kind: MemoryNodeKind,
    pub properties: HashMap<String, AttrValue>,
    pub listeners: HashMap<String, EventHandler>,
    pub children: Vec<SurfaceId>,
}

impl MemoryNode {
    fn new(kind: MemoryNodeKind) -> Self {
        Self {
            kind,
            properties: HashMap::new(),
            listeners: HashMap::new(),
            children: Vec::new(),
        }
    }
}

/// One recorded surface mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    CreateNode { id: SurfaceId, tag: String },
    CreateText { id: SurfaceId },
    SetProperty { node: SurfaceId, name: String },
    RemoveProperty { node: SurfaceId, name: String },
    AddListener { node: SurfaceId, event: String },
    RemoveListener { node: SurfaceId, event: String },
    AppendChild { parent: SurfaceId, child: SurfaceId },
    RemoveChild { parent: SurfaceId, child: SurfaceId },
}

#[derive(Default)]
pub struct MemorySurface {
    nodes: Vec<Option<MemoryNode>>,
    ops: Vec<SurfaceOp>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: SurfaceId) -> Option<&MemoryNode> {
        self.nodes.get(id).and_then(|slot| slot.as_ref())
    }

    fn node_mut(&mut self, id: SurfaceId) -> Result<&mut MemoryNode, SurfaceError> {
        self.nodes
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or(SurfaceError::Missing { id })
    }

    pub fn children(&self, id: SurfaceId) -> &[SurfaceId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn tag(&self, id: SurfaceId) -> Option<&str> {
        match &self.node(id)?.kind {
            MemoryNodeKind::Element { tag } => Some(tag),
            MemoryNodeKind::Text => None,
        }
    }

    /// Content of a text node, read from its `nodeValue` property.
    pub fn text(&self, id: SurfaceId) -> Option<&str> {
        self.node(id)?.properties.get(NODE_VALUE)?.as_text()
    }

    pub fn property(&self, id: SurfaceId, name: &str) -> Option<&AttrValue> {
        self.node(id)?.properties.get(name)
    }

    pub fn has_listener(&self, id: SurfaceId, event: &str) -> bool {
        self.node(id)
            .map(|node| node.listeners.contains_key(event))
            .unwrap_or(false)
    }

    /// Invokes the listener registered for `event` on `node`, returning
    /// whether one was attached.
    pub fn fire(&self, node: SurfaceId, event: &str) -> bool {
        let handler = self
            .node(node)
            .and_then(|n| n.listeners.get(event))
            .cloned();
        match handler {
            Some(handler) => {
                handler.invoke();
                true
            }
            None => false,
        }
    }

    /// Drains the recorded mutation log.
    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dump_tree(&self, root: SurfaceId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: SurfaceId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            Some(node) => {
                match &node.kind {
                    MemoryNodeKind::Element { tag } => {
                        output.push_str(&format!("{indent}[{id}] <{tag}>\n"));
                    }
                    MemoryNodeKind::Text => {
                        let text = self.text(id).unwrap_or("");
                        output.push_str(&format!("{indent}[{id}] {text:?}\n"));
                    }
                }
                for child in self.children(id).to_vec() {
                    self.dump_node(output, child, depth + 1);
                }
            }
            None => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }

    fn alloc(&mut self, node: MemoryNode) -> SurfaceId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        id
    }

    /// Creates a detached element node to serve as a render container.
    /// Not recorded in the mutation log; it models a mount point that
    /// exists before the engine does.
    pub fn create_container(&mut self) -> SurfaceId {
        self.alloc(MemoryNode::new(MemoryNodeKind::Element {
            tag: "#root".to_owned(),
        }))
    }
}

impl RenderSurface for MemorySurface {
    fn create_node(&mut self, tag: &str) -> Result<SurfaceId, SurfaceError> {
        let id = self.alloc(MemoryNode::new(MemoryNodeKind::Element {
            tag: tag.to_owned(),
        }));
        self.ops.push(SurfaceOp::CreateNode {
            id,
            tag: tag.to_owned(),
        });
        Ok(id)
    }

    fn create_text(&mut self, text: &str) -> Result<SurfaceId, SurfaceError> {
        let id = self.alloc(MemoryNode::new(MemoryNodeKind::Text));
        if !text.is_empty() {
            self.node_mut(id)?
                .properties
                .insert(NODE_VALUE.to_owned(), AttrValue::Text(text.to_owned()));
        }
        self.ops.push(SurfaceOp::CreateText { id });
        Ok(id)
    }

    fn set_property(
        &mut self,
        node: SurfaceId,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), SurfaceError> {
        self.node_mut(node)?
            .properties
            .insert(name.to_owned(), value.clone());
        self.ops.push(SurfaceOp::SetProperty {
            node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn remove_property(&mut self, node: SurfaceId, name: &str) -> Result<(), SurfaceError> {
        self.node_mut(node)?.properties.remove(name);
        self.ops.push(SurfaceOp::RemoveProperty {
            node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: SurfaceId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), SurfaceError> {
        self.node_mut(node)?
            .listeners
            .insert(event.to_owned(), handler);
        self.ops.push(SurfaceOp::AddListener {
            node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn remove_listener(&mut self, node: SurfaceId, event: &str) -> Result<(), SurfaceError> {
        self.node_mut(node)?.listeners.remove(event);
        self.ops.push(SurfaceOp::RemoveListener {
            node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn append_child(&mut self, parent: SurfaceId, child: SurfaceId) -> Result<(), SurfaceError> {
        if self.node(child).is_none() {
            return Err(SurfaceError::Missing { id: child });
        }
        self.node_mut(parent)?.children.push(child);
        self.ops.push(SurfaceOp::AppendChild { parent, child });
        Ok(())
    }

    fn remove_child(&mut self, parent: SurfaceId, child: SurfaceId) -> Result<(), SurfaceError> {
        let children = &mut self.node_mut(parent)?.children;
        match children.iter().position(|id| *id == child) {
            Some(index) => {
                children.remove(index);
            }
            None => {
                return Err(SurfaceError::InvalidTarget {
                    id: child,
                    operation: "remove_child",
                })
            }
        }
        self.ops.push(SurfaceOp::RemoveChild { parent, child });
        Ok(())
    }
}
