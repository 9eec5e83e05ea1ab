//! External resource naming
//!
//! Every condition at index `i` of rule `id` maps to exactly one external
//! resource (scheduler interval + action, or stream-engine rule) named
//! `<id>_<i>`. The name is the join key for reconciliation and deletion;
//! rule ids are UUIDs, so names never collide across rules.

use uuid::Uuid;

/// Name of the external resource backing one condition
pub fn resource_name(rule_id: &str, index: usize) -> String {
    format!("{}_{}", rule_id, index)
}

/// Parse an external resource name back into (rule id, condition index)
///
/// Returns `None` for names not produced by this service, so foreign
/// scheduler entries and stream-engine rules are left alone during orphan
/// sweeps. UUIDs contain no underscore, so splitting on the last one is
/// unambiguous.
pub fn parse_resource_name(name: &str) -> Option<(&str, usize)> {
    let (id, index) = name.rsplit_once('_')?;
    Uuid::parse_str(id).ok()?;
    let index = index.parse().ok()?;
    Some((id, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "3f2c26b4-8c5d-43dc-9e3d-0ad55f0b3ffb";

    #[test]
    fn test_round_trip() {
        let name = resource_name(ID, 3);
        assert_eq!(name, format!("{}_3", ID));
        assert_eq!(parse_resource_name(&name), Some((ID, 3)));
    }

    #[test]
    fn test_rejects_foreign_names() {
        assert_eq!(parse_resource_name("daily_report"), None);
        assert_eq!(parse_resource_name("no-underscore"), None);
        assert_eq!(parse_resource_name(&format!("{}_x", ID)), None);
    }
}
