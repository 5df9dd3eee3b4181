//! Content tree walker
//!
//! Depth-first, pre-order walk producing one [`SchemaNode`] per addressable
//! value. The walk uses an explicit stack, so nesting depth is bounded only by
//! memory. Composite values are tracked by [`ValueId`]; reaching one a second
//! time yields a scalar reference node instead of descending again.

use crate::config::KnowledgeGraphConfig;
use crate::node::{node_id, NodeMetadata, SchemaNode, ValueKind};
use refine_artifact::{ArtifactStage, ContentNode, ContentTree, SchemaPath, ValueId};
use std::collections::HashMap;

/// Keys scanned, in order, for a human-meaningful label on objects
const IDENTIFIER_KEYS: [&str; 3] = ["id", "name", "title"];

/// Node produced by the walk, with the text used for candidate pairing
#[derive(Debug, Clone)]
pub(crate) struct WalkedNode {
    pub(crate) node: SchemaNode,
    /// Full scalar text, set only for textual leaves
    pub(crate) text: Option<String>,
}

struct Frame {
    value: ValueId,
    path: SchemaPath,
    array_index: Option<usize>,
}

/// Walk one artifact's content
pub(crate) fn walk(
    stage: ArtifactStage,
    tree: &ContentTree,
    config: &KnowledgeGraphConfig,
) -> Vec<WalkedNode> {
    let mut out = Vec::new();
    let mut first_seen: HashMap<ValueId, SchemaPath> = HashMap::new();
    first_seen.insert(tree.root(), SchemaPath::root());

    let mut stack = Vec::new();
    push_children(tree, tree.root(), &SchemaPath::root(), &mut stack);

    while let Some(frame) = stack.pop() {
        let Some(value) = tree.get(frame.value) else {
            continue;
        };

        if value.is_composite() {
            if let Some(original) = first_seen.get(&frame.value) {
                out.push(reference_node(stage, &frame, original, config));
                continue;
            }
            first_seen.insert(frame.value, frame.path.clone());
        }

        out.push(value_node(stage, tree, &frame, value, config));
        push_children(tree, frame.value, &frame.path, &mut stack);
    }

    out
}

fn push_children(tree: &ContentTree, id: ValueId, path: &SchemaPath, stack: &mut Vec<Frame>) {
    // Reversed so the first child is popped first
    match tree.get(id) {
        Some(ContentNode::Object(fields)) => {
            for (key, child) in fields.iter().rev() {
                stack.push(Frame {
                    value: *child,
                    path: path.child_field(key.clone()),
                    array_index: None,
                });
            }
        }
        Some(ContentNode::Array(items)) => {
            for (index, child) in items.iter().enumerate().rev() {
                stack.push(Frame {
                    value: *child,
                    path: path.child_index(index),
                    array_index: Some(index),
                });
            }
        }
        Some(ContentNode::Scalar(_)) | None => {}
    }
}

fn value_node(
    stage: ArtifactStage,
    tree: &ContentTree,
    frame: &Frame,
    value: &ContentNode,
    config: &KnowledgeGraphConfig,
) -> WalkedNode {
    let identifier = identifier(tree, value);
    let (kind, summary, text) = match value {
        ContentNode::Scalar(scalar) => {
            let rendered = scalar.to_text().into_owned();
            let text = scalar.is_textual().then(|| rendered.clone());
            (ValueKind::Scalar, rendered, text)
        }
        ContentNode::Object(fields) => {
            let shape = format!("{{{} keys}}", fields.len());
            (ValueKind::Object, labelled(identifier.as_deref(), shape), None)
        }
        ContentNode::Array(items) => {
            let shape = format!("[{} items]", items.len());
            (ValueKind::Object, labelled(identifier.as_deref(), shape), None)
        }
    };
    let kind = if frame.array_index.is_some() {
        ValueKind::ArrayItem
    } else {
        kind
    };

    WalkedNode {
        node: SchemaNode {
            id: node_id(stage, &frame.path),
            artifact_type: stage,
            schema_path: frame.path.clone(),
            value_kind: kind,
            metadata: NodeMetadata {
                array_index: frame.array_index,
                identifier,
            },
            raw_value_summary: truncate(&summary, config.summary_max_len),
        },
        text,
    }
}

fn reference_node(
    stage: ArtifactStage,
    frame: &Frame,
    original: &SchemaPath,
    config: &KnowledgeGraphConfig,
) -> WalkedNode {
    let target = if original.is_empty() {
        "<root>".to_string()
    } else {
        original.to_string()
    };
    let kind = if frame.array_index.is_some() {
        ValueKind::ArrayItem
    } else {
        ValueKind::Scalar
    };

    WalkedNode {
        node: SchemaNode {
            id: node_id(stage, &frame.path),
            artifact_type: stage,
            schema_path: frame.path.clone(),
            value_kind: kind,
            metadata: NodeMetadata {
                array_index: frame.array_index,
                identifier: None,
            },
            raw_value_summary: truncate(&format!("(ref {target})"), config.summary_max_len),
        },
        text: None,
    }
}

/// First non-blank string or number among the identifier keys of an object
///
/// Booleans, nulls and blank strings are skipped, so `{"id": true, "name": "x"}`
/// is identified as `x`.
fn identifier(tree: &ContentTree, value: &ContentNode) -> Option<String> {
    let ContentNode::Object(fields) = value else {
        return None;
    };
    IDENTIFIER_KEYS.iter().find_map(|key| {
        match tree.get(*fields.get(*key)?)? {
            ContentNode::Scalar(scalar) if scalar.is_textual() => Some(scalar.to_text().into_owned()),
            _ => None,
        }
    })
}

fn labelled(identifier: Option<&str>, shape: String) -> String {
    match identifier {
        Some(identifier) => format!("{identifier} {shape}"),
        None => shape,
    }
}

/// Cut `text` to at most `max` characters
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use refine_artifact::ContentNode;
    use serde_json::json;

    fn paths(nodes: &[WalkedNode]) -> Vec<String> {
        nodes.iter().map(|n| n.node.schema_path.to_string()).collect()
    }

    #[test]
    fn walk_is_preorder() {
        let tree = ContentTree::from_json(&json!({
            "user_stories": [{"id": "US-1", "title": "Login"}, {"id": "US-2"}],
            "goal": "ship",
        }));
        let nodes = walk(ArtifactStage::Requirements, &tree, &KnowledgeGraphConfig::default());

        assert_eq!(
            paths(&nodes),
            vec![
                "user_stories",
                "user_stories[0]",
                "user_stories[0].id",
                "user_stories[0].title",
                "user_stories[1]",
                "user_stories[1].id",
                "goal",
            ]
        );
    }

    #[test]
    fn walk_kinds_and_metadata() {
        let tree = ContentTree::from_json(&json!({"apis": [{"name": "login", "path": "/api/login"}, "raw"]}));
        let nodes = walk(ArtifactStage::Architecture, &tree, &KnowledgeGraphConfig::default());

        let apis = &nodes[0].node;
        assert_eq!(apis.value_kind, ValueKind::Object);
        assert_eq!(apis.raw_value_summary, "[2 items]");

        let first = &nodes[1].node;
        assert_eq!(first.id, "arch_design:apis[0]");
        assert_eq!(first.value_kind, ValueKind::ArrayItem);
        assert_eq!(first.metadata.array_index, Some(0));
        assert_eq!(first.metadata.identifier.as_deref(), Some("login"));
        assert_eq!(first.raw_value_summary, "login {2 keys}");

        let path = &nodes[3];
        assert_eq!(path.node.value_kind, ValueKind::Scalar);
        assert_eq!(path.text.as_deref(), Some("/api/login"));

        let raw = &nodes[4].node;
        assert_eq!(raw.value_kind, ValueKind::ArrayItem);
        assert_eq!(raw.metadata.array_index, Some(1));
    }

    #[test]
    fn identifier_preference_order() {
        let tree = ContentTree::from_json(&json!({"item": {"title": "T", "name": "N", "id": ""}}));
        let nodes = walk(ArtifactStage::UiDesign, &tree, &KnowledgeGraphConfig::default());
        // Blank id is skipped, name wins over title
        assert_eq!(nodes[0].node.metadata.identifier.as_deref(), Some("N"));
    }

    #[test]
    fn identifier_skips_flags_and_nulls() {
        let tree = ContentTree::from_json(&json!([
            {"id": true, "name": "  ", "title": 7},
            {"id": null, "name": false},
        ]));
        let nodes = walk(ArtifactStage::Verification, &tree, &KnowledgeGraphConfig::default());
        let items: Vec<_> = nodes
            .iter()
            .filter(|n| n.node.value_kind == ValueKind::ArrayItem)
            .map(|n| n.node.metadata.identifier.clone())
            .collect();
        assert_eq!(items, vec![Some("7".to_string()), None]);
    }

    #[test]
    fn non_textual_scalars_have_no_text() {
        let tree = ContentTree::from_json(&json!({"enabled": true, "port": 8080, "note": null}));
        let nodes = walk(ArtifactStage::Infrastructure, &tree, &KnowledgeGraphConfig::default());
        let texts: Vec<_> = nodes.iter().map(|n| n.text.clone()).collect();
        assert_eq!(texts, vec![None, Some("8080".to_string()), None]);
        assert_eq!(nodes[0].node.raw_value_summary, "true");
    }

    #[test]
    fn cyclic_content_terminates() {
        let mut tree = ContentTree::from_json(&json!({"name": "root", "children": []}));
        let root = tree.root();
        let children = tree.field(root, "children").unwrap();
        tree.push_item(children, root).unwrap();
        tree.push_item(children, children).unwrap();

        let nodes = walk(ArtifactStage::Architecture, &tree, &KnowledgeGraphConfig::default());

        assert_eq!(paths(&nodes), vec!["name", "children", "children[0]", "children[1]"]);
        assert_eq!(nodes[2].node.raw_value_summary, "(ref <root>)");
        assert_eq!(nodes[3].node.raw_value_summary, "(ref children)");
        assert_eq!(nodes[3].node.value_kind, ValueKind::ArrayItem);
    }

    #[test]
    fn shared_value_walked_once() {
        let mut tree = ContentTree::from_json(&json!({"a": {"x": 1}}));
        let root = tree.root();
        let shared = tree.field(root, "a").unwrap();
        tree.set_field(root, "b", shared).unwrap();

        let nodes = walk(ArtifactStage::Security, &tree, &KnowledgeGraphConfig::default());
        assert_eq!(paths(&nodes), vec!["a", "a.x", "b"]);
        assert_eq!(nodes[2].node.value_kind, ValueKind::Scalar);
        assert_eq!(nodes[2].node.raw_value_summary, "(ref a)");
    }

    #[test]
    fn scalar_root_yields_no_nodes() {
        let tree = ContentTree::with_root(ContentNode::Scalar(refine_artifact::Scalar::Null));
        assert!(walk(ArtifactStage::Requirements, &tree, &KnowledgeGraphConfig::default()).is_empty());
    }

    #[test]
    fn summary_truncation() {
        assert_eq!(truncate("héllo wörld", 4), "héll");
        assert_eq!(truncate("short", 10), "short");

        let config = KnowledgeGraphConfig::default().with_summary_max_len(3);
        let tree = ContentTree::from_json(&json!({"text": "abcdef"}));
        let nodes = walk(ArtifactStage::Requirements, &tree, &config);
        assert_eq!(nodes[0].node.raw_value_summary, "abc");
        assert_eq!(nodes[0].text.as_deref(), Some("abcdef"));
    }
}
