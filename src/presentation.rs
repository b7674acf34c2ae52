//! Presentation targets
//!
//! Binders only see the `Target` capability. A target refuses (returns
//! `false`) any setter its kind cannot honor, so a `string` binding pointed at
//! an image target is a no-op instead of a failure.

use std::collections::BTreeMap;

use crate::resources::ResourceId;

/// An addressable presentation node
pub trait Target {
    fn set_text(&mut self, _text: &str) -> bool {
        false
    }

    fn set_image_bytes(&mut self, _bytes: &[u8]) -> bool {
        false
    }

    fn set_image_uri(&mut self, _uri: &str) -> bool {
        false
    }

    fn set_drawable(&mut self, _drawable: ResourceId) -> bool {
        false
    }

    /// Opaque metadata; every target accepts a tag
    fn set_tag(&mut self, tag: &str) -> bool;
}

/// A presentation tree that targets can be looked up in
pub trait TargetContainer {
    fn find_target(&mut self, id: ResourceId) -> Option<&mut dyn Target>;
}

/// What an image target currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageContent {
    Bytes(Vec<u8>),
    Uri(String),
    Drawable(ResourceId),
}

/// Node kinds of the in-memory view tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    Text { text: String },
    Image { content: Option<ImageContent> },
    Plain,
}

/// A node of the in-memory view tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewNode {
    pub kind: ViewKind,
    pub tag: Option<String>,
}

impl ViewNode {
    pub fn text() -> Self {
        Self {
            kind: ViewKind::Text {
                text: String::new(),
            },
            tag: None,
        }
    }

    pub fn image() -> Self {
        Self {
            kind: ViewKind::Image { content: None },
            tag: None,
        }
    }

    pub fn plain() -> Self {
        Self {
            kind: ViewKind::Plain,
            tag: None,
        }
    }

    pub fn text_value(&self) -> Option<&str> {
        match &self.kind {
            ViewKind::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn image_content(&self) -> Option<&ImageContent> {
        match &self.kind {
            ViewKind::Image { content } => content.as_ref(),
            _ => None,
        }
    }
}

impl Target for ViewNode {
    fn set_text(&mut self, value: &str) -> bool {
        match &mut self.kind {
            ViewKind::Text { text } => {
                *text = value.to_string();
                true
            }
            _ => false,
        }
    }

    fn set_image_bytes(&mut self, bytes: &[u8]) -> bool {
        self.set_image(ImageContent::Bytes(bytes.to_vec()))
    }

    fn set_image_uri(&mut self, uri: &str) -> bool {
        self.set_image(ImageContent::Uri(uri.to_string()))
    }

    fn set_drawable(&mut self, drawable: ResourceId) -> bool {
        self.set_image(ImageContent::Drawable(drawable))
    }

    fn set_tag(&mut self, tag: &str) -> bool {
        self.tag = Some(tag.to_string());
        true
    }
}

impl ViewNode {
    fn set_image(&mut self, image: ImageContent) -> bool {
        match &mut self.kind {
            ViewKind::Image { content } => {
                *content = Some(image);
                true
            }
            _ => false,
        }
    }
}

/// In-memory item layout: view id → node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewTree {
    nodes: BTreeMap<ResourceId, ViewNode>,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: ResourceId, node: ViewNode) -> Self {
        self.nodes.insert(id, node);
        self
    }

    pub fn insert(&mut self, id: ResourceId, node: ViewNode) {
        self.nodes.insert(id, node);
    }

    pub fn get(&self, id: ResourceId) -> Option<&ViewNode> {
        self.nodes.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &ViewNode)> {
        self.nodes.iter()
    }
}

impl TargetContainer for ViewTree {
    fn find_target(&mut self, id: ResourceId) -> Option<&mut dyn Target> {
        self.nodes.get_mut(&id).map(|node| node as &mut dyn Target)
    }
}
