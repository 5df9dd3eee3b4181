//! Candidate pairing
//!
//! Pairs textual upstream leaves with textual leaves of artifacts they may
//! feed, ranks pairs by shared tokens and cuts them into oracle-sized batches.

use crate::config::KnowledgeGraphConfig;
use crate::walker::{truncate, WalkedNode};
use std::collections::HashSet;

/// Downstream node offered to the oracle
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) node_id: String,
    pub(crate) text: String,
}

/// One oracle call: one upstream node against a slice of its candidates
#[derive(Debug, Clone)]
pub(crate) struct CandidateBatch {
    pub(crate) source_id: String,
    pub(crate) source_description: String,
    pub(crate) candidates: Vec<Candidate>,
}

/// Lowercased alphanumeric tokens
pub(crate) fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn searchable(node: &WalkedNode, config: &KnowledgeGraphConfig) -> bool {
    node.text.is_some() && !config.is_ignored(&node.node.schema_path)
}

/// Build every oracle batch for one set of walked nodes
pub(crate) fn plan_batches(nodes: &[WalkedNode], config: &KnowledgeGraphConfig) -> Vec<CandidateBatch> {
    let searchable: Vec<(&WalkedNode, HashSet<String>)> = nodes
        .iter()
        .filter(|node| searchable(node, config))
        .map(|node| (node, tokenize(&node.node.raw_value_summary)))
        .collect();

    let mut batches = Vec::new();
    for (upstream, _) in &searchable {
        let Some(text) = upstream.text.as_deref() else {
            continue;
        };
        let source_tokens = tokenize(text);

        let mut scored: Vec<(usize, &WalkedNode)> = searchable
            .iter()
            .filter(|(downstream, _)| {
                upstream
                    .node
                    .artifact_type
                    .can_feed(downstream.node.artifact_type)
            })
            .map(|(downstream, tokens)| (source_tokens.intersection(tokens).count(), *downstream))
            .filter(|(score, _)| *score >= config.min_token_overlap)
            .collect();
        if scored.is_empty() {
            continue;
        }

        // Stable: equal scores keep walk order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(config.max_candidates_per_node);

        let description = describe(upstream, text, config);
        let candidates: Vec<Candidate> = scored
            .into_iter()
            .map(|(_, downstream)| Candidate {
                node_id: downstream.node.id.clone(),
                text: downstream.node.raw_value_summary.clone(),
            })
            .collect();

        for chunk in candidates.chunks(config.batch_size.max(1)) {
            batches.push(CandidateBatch {
                source_id: upstream.node.id.clone(),
                source_description: description.clone(),
                candidates: chunk.to_vec(),
            });
        }
    }
    batches
}

fn describe(upstream: &WalkedNode, text: &str, config: &KnowledgeGraphConfig) -> String {
    format!(
        "Field \"{}\" of the {} artifact with value \"{}\"",
        upstream.node.schema_path,
        upstream.node.artifact_type.label(),
        truncate(text, config.summary_max_len)
    )
}
