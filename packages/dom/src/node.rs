/// Index of a node inside a [`crate::Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The document node of every arena
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single node in the arena
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// The document itself (always `NodeId::ROOT`)
    Document,

    /// `<!DOCTYPE name>`
    Doctype { name: String },

    /// HTML element
    Element(ElementData),

    /// Text node
    Text(String),

    /// Comment node
    Comment(String),
}

/// An attribute, kept in source order so serialization is stable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    /// Lowercase local name
    pub tag: String,
    pub attributes: Vec<Attribute>,
}

impl ElementData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Set an attribute, keeping its position if it already exists
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attr_position(name)?;
        Some(self.attributes.remove(pos).value)
    }

    pub fn attr_position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    /// Set an attribute; a new one goes at `index` (clamped) instead of last
    pub fn insert_attr(&mut self, index: usize, name: &str, value: impl Into<String>) {
        if self.has_attr(name) {
            self.set_attr(name, value);
            return;
        }
        let index = index.min(self.attributes.len());
        self.attributes.insert(
            index,
            Attribute {
                name: name.to_string(),
                value: value.into(),
            },
        );
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Class names in attribute order
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}
