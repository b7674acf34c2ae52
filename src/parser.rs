//! Binding grammar parser
//!
//! Recursive descent over a [`DocumentCursor`]:
//!
//! ```text
//! <cursor-adapter target|layout uri? selection? sortOrder?>
//!     <select column/>*
//!     <bind from to as>
//!         <map fromValue toValue/>*  |  <transform withExpression|withClass/>*
//!     </bind>*
//! </cursor-adapter>
//! ```
//!
//! Compilation is all-or-nothing: the first error aborts and no partial plan
//! is returned. Expression placeholders are checked once the whole document
//! has been read, so a `<select>` may follow the `<transform>` that uses it.

use tracing::{debug, info, warn};

use crate::binder::{BinderCache, BinderKind};
use crate::context::HostContext;
use crate::document::{DocEvent, DocumentCursor};
use crate::error::{BinderyError, Result};
use crate::plan::{BindingPlan, ColumnSet, FieldBinding, QuerySpec};
use crate::resources::{resolve_attribute, unescape_literal};
use crate::transform::{self, TransformChild};

/// Root element of a cursor adapter definition
pub const ADAPTER_CURSOR: &str = "cursor-adapter";

const TAG_SELECT: &str = "select";
const TAG_BIND: &str = "bind";
const TAG_MAP: &str = "map";
const TAG_TRANSFORM: &str = "transform";

/// Compile a definition document into a [`BindingPlan`]
///
/// With `expected_root`, any other root element fails with `SchemaMismatch`.
pub fn compile(
    doc: &mut dyn DocumentCursor,
    expected_root: Option<&str>,
    ctx: &HostContext,
) -> Result<BindingPlan> {
    let source_name = doc.source_name().to_string();
    let depth = doc.depth();
    let mut plan = None;

    loop {
        match doc.next()? {
            DocEvent::EndDocument => break,
            DocEvent::EndTag if doc.depth() <= depth => break,
            DocEvent::StartTag => {}
            _ => continue,
        }

        let name = doc.name().to_string();
        if let Some(expected) = expected_root {
            if expected != name {
                return Err(BinderyError::SchemaMismatch {
                    source_name,
                    expected: expected.to_string(),
                    found: name,
                });
            }
        }

        if name == ADAPTER_CURSOR && plan.is_none() {
            plan = Some(CursorAdapterParser::new(&mut *doc, ctx).parse()?);
        } else {
            return Err(BinderyError::UnknownElement {
                source_name,
                element: name,
            });
        }
    }

    plan.ok_or(BinderyError::EmptyDefinition { source_name })
}

/// Handles the attributes and children of one `<cursor-adapter>`
struct CursorAdapterParser<'d, 'c> {
    doc: &'d mut dyn DocumentCursor,
    ctx: &'c HostContext,
    source_name: String,
    columns: ColumnSet,
    bindings: Vec<FieldBinding>,
    binders: BinderCache,
}

impl<'d, 'c> CursorAdapterParser<'d, 'c> {
    fn new(doc: &'d mut dyn DocumentCursor, ctx: &'c HostContext) -> Self {
        let source_name = doc.source_name().to_string();
        Self {
            doc,
            ctx,
            source_name,
            columns: ColumnSet::new(),
            bindings: Vec::new(),
            binders: BinderCache::new(),
        }
    }

    fn parse(mut self) -> Result<BindingPlan> {
        let target = self
            .attr("target")
            .or_else(|| self.attr("layout"))
            .and_then(|value| resolve_attribute(self.ctx.resources(), &value))
            .ok_or_else(|| self.missing(ADAPTER_CURSOR, "target"))?;

        let query = QuerySpec {
            source_uri: self.attr("uri"),
            selection: self.attr("selection"),
            sort_order: self.attr("sortOrder"),
        };

        let depth = self.doc.depth();
        while let Some(name) = self.next_child(depth)? {
            match name.as_str() {
                TAG_SELECT => self.parse_select()?,
                TAG_BIND => self.parse_bind()?,
                _ => return Err(self.unknown(name)),
            }
        }

        self.check_placeholders()?;

        let plan = BindingPlan::new(
            self.source_name,
            target,
            query,
            self.columns,
            self.bindings,
        );
        for shared in plan.shared_targets() {
            warn!(
                source = plan.source_name(),
                target = %shared,
                "several bindings write the same target; the last one wins"
            );
        }
        info!(
            source = plan.source_name(),
            columns = plan.selected_columns().len(),
            bindings = plan.bindings().len(),
            "compiled binding plan"
        );
        Ok(plan)
    }

    fn parse_select(&mut self) -> Result<()> {
        let column = self
            .attr("column")
            .map(|c| unescape_literal(&c))
            .ok_or_else(|| self.missing(TAG_SELECT, "column"))?;
        self.leaf(TAG_SELECT)?;

        if !self.columns.insert(&column) {
            debug!(column, "column already selected");
        }
        Ok(())
    }

    fn parse_bind(&mut self) -> Result<()> {
        let from = self
            .attr("from")
            .map(|f| unescape_literal(&f))
            .ok_or_else(|| self.missing(TAG_BIND, "from"))?;
        let to = self
            .attr("to")
            .and_then(|value| resolve_attribute(self.ctx.resources(), &value))
            .ok_or_else(|| self.missing(TAG_BIND, "to"))?;
        let kind = self
            .attr("as")
            .map(|token| BinderKind::parse(&token))
            .ok_or_else(|| self.missing(TAG_BIND, "as"))?;

        let children = self.parse_transform_children()?;

        self.columns.insert(&from);
        let transformation =
            transform::resolve(&children, &kind, &from, self.ctx, &self.source_name)?;
        let binder = self.binders.resolve(&kind, self.ctx, &self.source_name)?;

        debug!(from, to = %to, kind = %kind, "parsed binding");
        self.bindings.push(FieldBinding {
            from,
            to,
            kind,
            transformation,
            binder,
        });
        Ok(())
    }

    fn parse_transform_children(&mut self) -> Result<Vec<TransformChild>> {
        let mut children = Vec::new();
        let depth = self.doc.depth();

        while let Some(name) = self.next_child(depth)? {
            match name.as_str() {
                TAG_MAP => {
                    let from_value = self
                        .attr("fromValue")
                        .ok_or_else(|| self.missing(TAG_MAP, "fromValue"))?;
                    let to_value = self
                        .attr("toValue")
                        .ok_or_else(|| self.missing(TAG_MAP, "toValue"))?;
                    self.leaf(TAG_MAP)?;
                    children.push(TransformChild::Map {
                        from_value,
                        to_value,
                    });
                }
                TAG_TRANSFORM => {
                    let with_expression = self.attr("withExpression");
                    let with_class = self.attr("withClass");
                    if with_expression.is_none() && with_class.is_none() {
                        return Err(self.missing(TAG_TRANSFORM, "withExpression"));
                    }
                    self.leaf(TAG_TRANSFORM)?;
                    children.push(TransformChild::Transform {
                        with_expression,
                        with_class,
                    });
                }
                _ => return Err(self.unknown(name)),
            }
        }

        Ok(children)
    }

    fn check_placeholders(&self) -> Result<()> {
        for binding in &self.bindings {
            for column in binding.transformation.referenced_columns() {
                if !self.columns.contains(&column) {
                    let expression = match &binding.transformation {
                        transform::Transformation::Expression(e) => e.clone(),
                        _ => String::new(),
                    };
                    return Err(BinderyError::UnresolvedPlaceholder {
                        source_name: self.source_name.clone(),
                        expression,
                        column,
                    });
                }
            }
        }
        Ok(())
    }

    /// Next child start tag below `depth`; `None` once the parent closes
    fn next_child(&mut self, depth: usize) -> Result<Option<String>> {
        loop {
            match self.doc.next()? {
                DocEvent::EndDocument => return Ok(None),
                DocEvent::EndTag if self.doc.depth() <= depth => return Ok(None),
                DocEvent::StartTag => return Ok(Some(self.doc.name().to_string())),
                _ => continue,
            }
        }
    }

    /// Consume an element that must not have children
    fn leaf(&mut self, element: &str) -> Result<()> {
        let depth = self.doc.depth();
        match self.next_child(depth)? {
            Some(child) => {
                debug!(parent = element, child, "unexpected nesting");
                Err(self.unknown(child))
            }
            None => Ok(()),
        }
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.doc.attribute(name).map(str::to_string)
    }

    fn missing(&self, element: &str, attribute: &str) -> BinderyError {
        BinderyError::MissingAttribute {
            source_name: self.source_name.clone(),
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }

    fn unknown(&self, element: String) -> BinderyError {
        BinderyError::UnknownElement {
            source_name: self.source_name.clone(),
            element,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::XmlDocument;
    use crate::resources::ResourceTable;
    use crate::transform::Transformation;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ctx() -> HostContext {
        let table = ResourceTable::new();
        table.define("layout", "contact_item");
        table.define("id", "name");
        table.define("id", "star");
        table.define("drawable", "star_big_off");
        table.define("drawable", "star_big_on");
        HostContext::new(Arc::new(table))
    }

    fn compile_str(xml: &str) -> Result<BindingPlan> {
        let mut doc = XmlDocument::new("contacts", xml);
        compile(&mut doc, None, &ctx())
    }

    #[test]
    fn root_attributes_become_query() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item" uri="content://contacts"
                 selection="has_phone_number=1" sortOrder="display_name ASC"/>"#,
        )
        .unwrap();
        let query = plan.query().unwrap();
        assert_eq!(query.source_uri.as_deref(), Some("content://contacts"));
        assert_eq!(query.selection.as_deref(), Some("has_phone_number=1"));
        assert_eq!(query.sort_order.as_deref(), Some("display_name ASC"));
        assert_eq!(plan.selected_columns(), &["_id".to_string()]);
    }

    #[test]
    fn no_uri_means_no_automatic_query() {
        let plan = compile_str(r#"<cursor-adapter layout="@layout/contact_item"/>"#).unwrap();
        assert!(plan.query().is_none());
    }

    #[test]
    fn missing_target_is_reported() {
        let err = compile_str(r#"<cursor-adapter uri="content://contacts"/>"#).unwrap_err();
        assert!(matches!(err, BinderyError::MissingAttribute { ref attribute, .. } if attribute == "target"));
    }

    #[test]
    fn unresolvable_target_is_missing() {
        let err = compile_str(r#"<cursor-adapter target="@layout/nope"/>"#).unwrap_err();
        assert!(matches!(err, BinderyError::MissingAttribute { .. }));
    }

    #[test]
    fn id_is_implicit_and_deduplicated() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <select column="_id"/>
                 <select column="lookup"/>
                 <select column="lookup"/>
               </cursor-adapter>"#,
        )
        .unwrap();
        assert_eq!(
            plan.selected_columns(),
            &["_id".to_string(), "lookup".to_string()]
        );
    }

    #[test]
    fn bind_auto_selects_from_column() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="display_name" to="@id/name" as="string"/>
                 <select column="display_name"/>
               </cursor-adapter>"#,
        )
        .unwrap();
        assert_eq!(
            plan.selected_columns(),
            &["_id".to_string(), "display_name".to_string()]
        );
        assert_eq!(plan.bindings()[0].from, "display_name");
    }

    #[test]
    fn escaped_at_in_from_is_literal() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="\@handle" to="@id/name" as="string"/>
               </cursor-adapter>"#,
        )
        .unwrap();
        assert_eq!(plan.bindings()[0].from, "@handle");
        assert!(plan.selected_columns().contains(&"@handle".to_string()));
    }

    #[test]
    fn bind_requires_from_to_and_as() {
        for (xml, attribute) in [
            (r#"<bind to="@id/name" as="string"/>"#, "from"),
            (r#"<bind from="a" as="string"/>"#, "to"),
            (r#"<bind from="a" to="@id/unknown" as="string"/>"#, "to"),
            (r#"<bind from="a" to="@id/name"/>"#, "as"),
        ] {
            let doc = format!(r#"<cursor-adapter target="@layout/contact_item">{xml}</cursor-adapter>"#);
            let err = compile_str(&doc).unwrap_err();
            assert!(
                matches!(err, BinderyError::MissingAttribute { attribute: ref a, .. } if a == attribute),
                "expected missing '{attribute}', got {err}"
            );
        }
    }

    #[test]
    fn bindings_keep_document_order() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="b" to="@id/name" as="string"/>
                 <bind from="a" to="@id/name" as="tag"/>
               </cursor-adapter>"#,
        )
        .unwrap();
        let froms: Vec<_> = plan.bindings().iter().map(|b| b.from.as_str()).collect();
        assert_eq!(froms, vec!["b", "a"]);
        assert_eq!(plan.shared_targets().len(), 1);
    }

    #[test]
    fn map_children_build_value_map() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="starred" to="@id/star" as="drawable">
                   <map fromValue="0" toValue="@drawable/star_big_off"/>
                   <map fromValue="1" toValue="@drawable/star_big_on"/>
                 </bind>
               </cursor-adapter>"#,
        )
        .unwrap();
        let Transformation::ValueMap(map) = &plan.bindings()[0].transformation else {
            panic!("expected value map");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map.entries()[0].0, "0");
    }

    #[test]
    fn map_requires_both_values() {
        let err = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="starred" to="@id/star" as="string"><map fromValue="0"/></bind>
               </cursor-adapter>"#,
        )
        .unwrap_err();
        assert!(matches!(err, BinderyError::MissingAttribute { ref attribute, .. } if attribute == "toValue"));
    }

    #[test]
    fn mixed_map_and_transform_conflict() {
        let err = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="starred" to="@id/star" as="string">
                   <map fromValue="0" toValue="no"/>
                   <transform withExpression="{starred}"/>
                 </bind>
               </cursor-adapter>"#,
        )
        .unwrap_err();
        assert!(matches!(err, BinderyError::ConflictingTransformation { .. }));
    }

    #[test]
    fn repeated_transform_keeps_last() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="display_name" to="@id/name" as="string">
                   <transform withExpression="first {display_name}"/>
                   <transform withExpression="second {display_name}"/>
                 </bind>
               </cursor-adapter>"#,
        )
        .unwrap();
        assert!(matches!(
            &plan.bindings()[0].transformation,
            Transformation::Expression(e) if e == "second {display_name}"
        ));
    }

    #[test]
    fn transform_needs_expression_or_class() {
        let err = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="a" to="@id/name" as="string"><transform/></bind>
               </cursor-adapter>"#,
        )
        .unwrap_err();
        assert!(matches!(err, BinderyError::MissingAttribute { ref element, .. } if element == "transform"));
    }

    #[test]
    fn placeholder_must_be_selected() {
        let err = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="first_name" to="@id/name" as="string">
                   <transform withExpression="{first_name} {last_name}"/>
                 </bind>
               </cursor-adapter>"#,
        )
        .unwrap_err();
        assert!(matches!(err, BinderyError::UnresolvedPlaceholder { ref column, .. } if column == "last_name"));
    }

    #[test]
    fn later_select_satisfies_placeholder() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="first_name" to="@id/name" as="string">
                   <transform withExpression="{first_name} {last_name}"/>
                 </bind>
                 <select column="last_name"/>
               </cursor-adapter>"#,
        )
        .unwrap();
        assert_eq!(plan.selected_columns().len(), 3);
    }

    #[test]
    fn unknown_elements_are_rejected() {
        for xml in [
            r#"<cursor-adapter target="@layout/contact_item"><query/></cursor-adapter>"#,
            r#"<cursor-adapter target="@layout/contact_item"><select column="a"><map/></select></cursor-adapter>"#,
            r#"<cursor-adapter target="@layout/contact_item"><bind from="a" to="@id/name" as="string"><select column="b"/></bind></cursor-adapter>"#,
            r#"<list-adapter/>"#,
        ] {
            let err = compile_str(xml).unwrap_err();
            assert!(matches!(err, BinderyError::UnknownElement { .. }), "{xml}: {err}");
            assert!(err.to_string().contains("contacts"));
        }
    }

    #[test]
    fn root_mismatch_fails_without_plan() {
        let mut doc = XmlDocument::new("contacts", r#"<list-adapter/>"#);
        let err = compile(&mut doc, Some(ADAPTER_CURSOR), &ctx()).unwrap_err();
        assert!(matches!(err, BinderyError::SchemaMismatch { ref found, .. } if found == "list-adapter"));
    }

    #[test]
    fn empty_document_has_no_definition() {
        let err = compile_str("<!-- nothing -->").unwrap_err();
        assert!(matches!(err, BinderyError::EmptyDefinition { .. }));
    }

    #[test]
    fn text_content_is_ignored() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">stray text<select column="a"/></cursor-adapter>"#,
        )
        .unwrap();
        assert_eq!(plan.selected_columns().len(), 2);
    }

    #[test]
    fn same_kind_shares_binder_instance() {
        let plan = compile_str(
            r#"<cursor-adapter target="@layout/contact_item">
                 <bind from="a" to="@id/name" as="string"/>
                 <bind from="b" to="@id/star" as="string"/>
               </cursor-adapter>"#,
        )
        .unwrap();
        let bindings = plan.bindings();
        assert!(Arc::ptr_eq(&bindings[0].binder, &bindings[1].binder));
    }
}
