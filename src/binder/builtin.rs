//! Built-in binders for the five standard data types

use tracing::trace;

use super::Binder;
use crate::presentation::Target;
use crate::row::Row;
use crate::transform::Transformation;

/// `string`: transformed value as text; null binds as empty text
#[derive(Debug, Default)]
pub struct StringBinder;

impl Binder for StringBinder {
    fn kind(&self) -> &str {
        "string"
    }

    fn bind(
        &self,
        target: &mut dyn Target,
        row: &Row,
        column: usize,
        transformation: &Transformation,
    ) -> bool {
        let text = transformation.transform(row, column).unwrap_or_default();
        target.set_text(&text)
    }
}

/// `image`: raw column bytes as an embedded image blob
///
/// The transformation does not apply; blobs have no text form.
#[derive(Debug, Default)]
pub struct ImageBinder;

impl Binder for ImageBinder {
    fn kind(&self) -> &str {
        "image"
    }

    fn bind(
        &self,
        target: &mut dyn Target,
        row: &Row,
        column: usize,
        _transformation: &Transformation,
    ) -> bool {
        match row.get_blob(column) {
            Some(bytes) => target.set_image_bytes(bytes),
            None => {
                trace!(column, "image column holds no blob");
                false
            }
        }
    }
}

/// `image-uri`: transformed value as a reference to an external image
#[derive(Debug, Default)]
pub struct ImageUriBinder;

impl Binder for ImageUriBinder {
    fn kind(&self) -> &str {
        "image-uri"
    }

    fn bind(
        &self,
        target: &mut dyn Target,
        row: &Row,
        column: usize,
        transformation: &Transformation,
    ) -> bool {
        match transformation.transform(row, column) {
            Some(uri) if !uri.is_empty() => target.set_image_uri(&uri),
            _ => false,
        }
    }
}

/// `drawable`: transformed value as a drawable resource id
#[derive(Debug, Default)]
pub struct DrawableBinder;

impl Binder for DrawableBinder {
    fn kind(&self) -> &str {
        "drawable"
    }

    fn bind(
        &self,
        target: &mut dyn Target,
        row: &Row,
        column: usize,
        transformation: &Transformation,
    ) -> bool {
        match transformation.transform_to_resource(row, column) {
            Some(id) if id.0 != 0 => target.set_drawable(id),
            _ => false,
        }
    }
}

/// `tag`: transformed value attached as opaque, unrendered metadata
#[derive(Debug, Default)]
pub struct TagBinder;

impl Binder for TagBinder {
    fn kind(&self) -> &str {
        "tag"
    }

    fn bind(
        &self,
        target: &mut dyn Target,
        row: &Row,
        column: usize,
        transformation: &Transformation,
    ) -> bool {
        match transformation.transform(row, column) {
            Some(tag) => target.set_tag(&tag),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::{ImageContent, ViewNode};
    use crate::resources::ResourceId;
    use crate::row::{Columns, Value};
    use std::sync::Arc;

    fn row(value: Value) -> Row {
        Row::new(
            Arc::new(Columns::new(vec!["_id".into(), "v".into()])),
            vec![Value::Integer(1), value],
        )
    }

    #[test]
    fn string_binder_sets_text() {
        let mut view = ViewNode::text();
        assert!(StringBinder.bind(&mut view, &row(Value::Text("Ann".into())), 1, &Transformation::Identity));
        assert_eq!(view.text_value(), Some("Ann"));
    }

    #[test]
    fn string_binder_clears_text_on_null() {
        let mut view = ViewNode::text();
        view.set_text("stale");
        assert!(StringBinder.bind(&mut view, &row(Value::Null), 1, &Transformation::Identity));
        assert_eq!(view.text_value(), Some(""));
    }

    #[test]
    fn string_binder_refuses_image_target() {
        let mut view = ViewNode::image();
        assert!(!StringBinder.bind(&mut view, &row(Value::Text("Ann".into())), 1, &Transformation::Identity));
    }

    #[test]
    fn image_binder_uses_blob() {
        let mut view = ViewNode::image();
        assert!(ImageBinder.bind(&mut view, &row(Value::Blob(vec![1, 2])), 1, &Transformation::Identity));
        assert_eq!(view.image_content(), Some(&ImageContent::Bytes(vec![1, 2])));
        assert!(!ImageBinder.bind(&mut view, &row(Value::Text("x".into())), 1, &Transformation::Identity));
    }

    #[test]
    fn image_uri_binder_skips_empty() {
        let mut view = ViewNode::image();
        assert!(!ImageUriBinder.bind(&mut view, &row(Value::Null), 1, &Transformation::Identity));
        assert!(ImageUriBinder.bind(
            &mut view,
            &row(Value::Text("content://photo/1".into())),
            1,
            &Transformation::Identity
        ));
        assert_eq!(view.image_content(), Some(&ImageContent::Uri("content://photo/1".into())));
    }

    #[test]
    fn drawable_binder_reads_resource_ids() {
        let mut view = ViewNode::image();
        assert!(DrawableBinder.bind(&mut view, &row(Value::Integer(0x7f00_0002)), 1, &Transformation::Identity));
        assert_eq!(view.image_content(), Some(&ImageContent::Drawable(ResourceId(0x7f00_0002))));
        assert!(!DrawableBinder.bind(&mut view, &row(Value::Integer(0)), 1, &Transformation::Identity));
    }

    #[test]
    fn tag_binder_sets_metadata() {
        let mut view = ViewNode::plain();
        assert!(TagBinder.bind(&mut view, &row(Value::Integer(42)), 1, &Transformation::Identity));
        assert_eq!(view.tag.as_deref(), Some("42"));
    }
}
