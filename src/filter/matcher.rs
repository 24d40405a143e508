use super::parser::{ClauseValues, FilterClause, FilterExpression, TagGroup, TagGroupKind};
use crate::node::NodeRecord;
use std::collections::HashSet;

impl FilterClause {
    /// Evaluate this clause against a node. A missing attribute never matches
    /// the positive form, so a negated clause accepts it.
    pub fn matches(&self, node: &NodeRecord) -> bool {
        let hit = node
            .get(&self.attribute)
            .is_some_and(|actual| self.values.matches(actual));
        hit != self.negate
    }
}

impl ClauseValues {
    fn matches(&self, actual: &str) -> bool {
        match self {
            ClauseValues::Literal(values) => values.iter().any(|v| eq_ignore_case(actual, v)),
            ClauseValues::Pattern {
                regex: Some(regex), ..
            } => regex.is_match(actual),
            ClauseValues::Pattern {
                source,
                regex: None,
            } => eq_ignore_case(actual, source),
            ClauseValues::Tags(groups) => {
                let node_tags = tag_set(actual);
                groups.iter().any(|group| group.matches(&node_tags))
            }
        }
    }
}

impl TagGroup {
    fn matches(&self, node_tags: &HashSet<String>) -> bool {
        let mut wanted = self.tags.iter().map(|t| node_tags.contains(&t.to_lowercase()));
        match self.kind {
            TagGroupKind::And => wanted.all(|present| present),
            TagGroupKind::Or => wanted.any(|present| present),
        }
    }
}

impl FilterExpression {
    /// True when every clause matches; an empty expression matches everything
    pub fn matches(&self, node: &NodeRecord) -> bool {
        evaluate(node, &self.clauses)
    }

    /// Keep the matching nodes, in their original order
    pub fn apply(&self, nodes: &[NodeRecord]) -> Vec<NodeRecord> {
        nodes
            .iter()
            .filter(|node| self.matches(node))
            .cloned()
            .collect()
    }
}

/// AND over all clauses
pub fn evaluate(node: &NodeRecord, clauses: &[FilterClause]) -> bool {
    clauses.iter().all(|clause| clause.matches(node))
}

/// Parse `filter` once and return the nodes it selects, order preserved
pub fn filter_nodes(nodes: &[NodeRecord], filter: &str) -> Vec<NodeRecord> {
    FilterExpression::parse(filter).apply(nodes)
}

fn tag_set(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;

    fn node(pairs: &[(&str, &str)]) -> NodeRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_empty_clause_list_matches() {
        assert!(evaluate(&node(&[]), &[]));
        assert!(evaluate(&node(&[("nodename", "web1")]), &parse_filter("  ")));
    }

    #[test]
    fn test_literal_match_is_case_insensitive() {
        let n = node(&[("status", "RUNNING")]);
        assert!(evaluate(&n, &parse_filter("status: running")));
        assert!(evaluate(&n, &parse_filter("status: Running")));
    }

    #[test]
    fn test_unicode_values_compare_case_insensitively() {
        let n = node(&[("description", "Übung")]);
        assert!(evaluate(&n, &parse_filter("description: übung")));
    }

    #[test]
    fn test_attribute_names_are_case_sensitive() {
        let n = node(&[("osFamily", "unix")]);
        assert!(!evaluate(&n, &parse_filter("osfamily: unix")));
        assert!(evaluate(&n, &parse_filter("osFamily: unix")));
    }

    #[test]
    fn test_missing_attribute() {
        let n = node(&[("nodename", "web1")]);
        assert!(!evaluate(&n, &parse_filter("nonexistent: value")));
        assert!(evaluate(&n, &parse_filter("!nonexistent: value")));
        assert!(!evaluate(&n, &parse_filter("tags: web")));
        assert!(evaluate(&n, &parse_filter("!tags: web")));
    }

    #[test]
    fn test_negation_inverts_literal_clause() {
        let n = node(&[("osFamily", "unix")]);
        for filter in ["osFamily: unix", "osFamily: windows", "osFamily: windows,unix"] {
            let positive = parse_filter(filter);
            let negated = parse_filter(&format!("!{filter}"));
            assert_eq!(evaluate(&n, &positive), !evaluate(&n, &negated), "{filter}");
        }
    }

    #[test]
    fn test_negation_inverts_regex_clause() {
        let dev = node(&[("hostname", "dev1.example.com")]);
        let web = node(&[("hostname", "web1.example.com")]);
        let clauses = parse_filter("!hostname: dev.*");
        assert!(clauses[0].is_regex());
        assert!(!evaluate(&dev, &clauses));
        assert!(evaluate(&web, &clauses));
    }

    #[test]
    fn test_negation_inverts_invalid_regex_clause() {
        let odd = node(&[("hostname", "[invalid(regex")]);
        let plain = node(&[("hostname", "web1")]);
        let positive = parse_filter("hostname: [invalid(regex");
        let negated = parse_filter("!hostname: [invalid(regex");
        for n in [&odd, &plain] {
            assert_eq!(evaluate(n, &positive), !evaluate(n, &negated));
        }
        assert!(!evaluate(&odd, &negated));
        assert!(evaluate(&plain, &negated));
    }

    #[test]
    fn test_negated_tag_clause_inverts_whole_clause() {
        let n = node(&[("tags", "web,staging")]);
        // One group matches, so the negated clause rejects the node
        assert!(!evaluate(&n, &parse_filter("!tags: web+production,staging")));
        assert!(evaluate(&n, &parse_filter("!tags: web+production")));
    }

    #[test]
    fn test_tag_matching_trims_and_ignores_case() {
        let n = node(&[("tags", " Web , PRODUCTION ")]);
        assert!(evaluate(&n, &parse_filter("tags: web+production")));
        assert!(!evaluate(&n, &parse_filter("tags: web+staging")));
    }

    #[test]
    fn test_tag_is_whole_word() {
        let n = node(&[("tags", "database")]);
        assert!(!evaluate(&n, &parse_filter("tags: data")));
    }

    #[test]
    fn test_regex_is_unanchored_search() {
        let n = node(&[("hostname", "my-dev1.example.com")]);
        assert!(evaluate(&n, &parse_filter("hostname: dev.*")));
        assert!(!evaluate(&n, &parse_filter("hostname: ^dev")));
        assert!(evaluate(&n, &parse_filter("hostname: DEV[0-9]")));
    }

    #[test]
    fn test_invalid_regex_compares_literally() {
        let odd = node(&[("hostname", "[INVALID(regex")]);
        let plain = node(&[("hostname", "web1")]);
        let clauses = parse_filter("hostname: [invalid(regex");
        assert!(evaluate(&odd, &clauses));
        assert!(!evaluate(&plain, &clauses));
    }

    #[test]
    fn test_dot_only_value_is_exact() {
        let n = node(&[("ip_address", "192.168.1.100")]);
        assert!(!evaluate(&n, &parse_filter("ip_address: 192.168.1.10")));
        assert!(evaluate(&n, &parse_filter("ip_address: 192.168.1.100")));
    }

    #[test]
    fn test_filter_nodes_preserves_order_and_input() {
        let nodes = vec![
            node(&[("nodename", "c"), ("kind", "x")]),
            node(&[("nodename", "a"), ("kind", "y")]),
            node(&[("nodename", "b"), ("kind", "x")]),
        ];
        let before = nodes.clone();
        let kept = filter_nodes(&nodes, "kind: x");
        assert_eq!(nodes, before);
        let names: Vec<&str> = kept.iter().filter_map(|n| n.get("nodename")).collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn test_filter_nodes_on_empty_input() {
        assert!(filter_nodes(&[], "proxmox_status: running").is_empty());
    }
}
