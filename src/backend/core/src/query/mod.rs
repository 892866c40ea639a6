//! Capability-Based Query Validator (C7, §3, §4.7).
//!
//! Validates a query specification — selection, filter AST, ordering,
//! pagination — against a repository's declared [`Capabilities`] and
//! optional field allow-lists, then hands back either the input unchanged
//! or a single copy with `limit` clamped to the capability's `max_limit`.
//!
//! The filter AST travels as a raw JSON prefix-tuple (`[op, field, value]`,
//! matching §3's wire shape) rather than a pre-typed enum: the validator's
//! entire job is to reject malformed or unsupported shapes *before* a
//! typed representation would even parse, so the input has to be allowed
//! to be wrong. [`FilterNode`] is the typed, validated-AST counterpart a
//! caller gets back by converting a validated [`serde_json::Value`] — §4.7
//! is purely a gate in front of whatever repository-specific type
//! ultimately consumes the filter.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

// ───────────────────────────────────────────────────────────────────────────
// Query specification (§3)
// ───────────────────────────────────────────────────────────────────────────

/// `{select?, where?, order_by?, limit?, offset = 0}` (§3). `where` is kept
/// as a raw JSON value rather than a typed [`FilterNode`] because validation
/// must be able to reject a filter tree that doesn't even have the right
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "where")]
    pub where_: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    #[serde(default)]
    pub offset: i64,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            select: None,
            where_: None,
            order_by: None,
            limit: None,
            offset: 0,
        }
    }
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, node: serde_json::Value) -> Self {
        self.where_ = Some(node);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// The typed, validated counterpart of a filter AST node (§3's "prefix
/// form"). Produced from an already-validated raw JSON tree via
/// [`FilterNode::from_validated`] — never built directly from untrusted
/// input.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Comparison {
        op: String,
        field: String,
        value: serde_json::Value,
    },
    Exists {
        field: String,
    },
    Not {
        node: Box<FilterNode>,
    },
    And {
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
    Or {
        left: Box<FilterNode>,
        right: Box<FilterNode>,
    },
}

impl FilterNode {
    /// Convert an already-[`validate`]d raw filter tree into the typed form.
    /// Panics only on a shape [`validate`] would itself have rejected —
    /// callers are expected to validate first.
    pub fn from_validated(value: &serde_json::Value) -> Self {
        let arr = value.as_array().expect("validated filter node must be an array");
        let op = arr[0].as_str().expect("validated op must be a string").to_string();
        match classify_op(&op) {
            OpKind::Comparison => FilterNode::Comparison {
                op,
                field: arr[1].as_str().unwrap_or_default().to_string(),
                value: arr[2].clone(),
            },
            OpKind::Exists => FilterNode::Exists {
                field: arr[1].as_str().unwrap_or_default().to_string(),
            },
            OpKind::Not => FilterNode::Not {
                node: Box::new(FilterNode::from_validated(&arr[1])),
            },
            OpKind::And => FilterNode::And {
                left: Box::new(FilterNode::from_validated(&arr[1])),
                right: Box::new(FilterNode::from_validated(&arr[2])),
            },
            OpKind::Or => FilterNode::Or {
                left: Box::new(FilterNode::from_validated(&arr[1])),
                right: Box::new(FilterNode::from_validated(&arr[2])),
            },
        }
    }

    /// Build the raw wire form of a comparison node: `(op, field, value)`.
    pub fn comparison(op: impl Into<String>, field: impl Into<String>, value: serde_json::Value) -> serde_json::Value {
        serde_json::json!([op.into(), field.into(), value])
    }

    /// Build the raw wire form of `(in, field, [values...])`, accepting any
    /// iterable and always emitting an ordered JSON array regardless of the
    /// source collection's own ordering guarantees (§8's round-trip
    /// invariant for `in_`).
    pub fn in_(field: impl Into<String>, values: impl IntoIterator<Item = serde_json::Value>) -> serde_json::Value {
        let ordered: Vec<serde_json::Value> = values.into_iter().collect();
        serde_json::json!(["in", field.into(), ordered])
    }

    /// Left-fold more than two `and`/`or` operands into nested binary nodes
    /// (§3: "more than two operands are left-folded by the builder").
    pub fn fold_logical(op: &str, operands: Vec<serde_json::Value>) -> Option<serde_json::Value> {
        let mut iter = operands.into_iter();
        let first = iter.next()?;
        Some(iter.fold(first, |acc, next| serde_json::json!([op, acc, next])))
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Capabilities (§3)
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrudCapability {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryCapability {
    #[serde(default)]
    pub supported: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionCapability {
    #[serde(default)]
    pub supported: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCapability {
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub pushdown: bool,
    #[serde(default)]
    pub ops: HashSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderByCapability {
    #[serde(default)]
    pub supported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    Offset,
    Cursor,
    Both,
}

impl Default for PaginationMode {
    fn default() -> Self {
        Self::Offset
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationCapability {
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub mode: PaginationMode,
    #[serde(default)]
    pub max_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCapability {
    #[serde(default)]
    pub dot_notation: bool,
    #[serde(default)]
    pub deep_merge: bool,
    #[serde(default)]
    pub atomic_ops: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeCapability {
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub kinds: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorSearchCapability {
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub dimensions: Option<u32>,
    #[serde(default)]
    pub distance_metrics: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphTraversalCapability {
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub max_depth: Option<u32>,
}

/// A repository's declared capabilities (§3) — what it can do, and how.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub crud: CrudCapability,
    #[serde(default)]
    pub query: QueryCapability,
    #[serde(default)]
    pub projection: ProjectionCapability,
    #[serde(default)]
    pub filter: FilterCapability,
    #[serde(default)]
    pub order_by: OrderByCapability,
    #[serde(default)]
    pub pagination: PaginationCapability,
    #[serde(default)]
    pub update: UpdateCapability,
    #[serde(default)]
    pub native: NativeCapability,
    #[serde(default)]
    pub vector_search: VectorSearchCapability,
    #[serde(default)]
    pub graph_traversal: GraphTraversalCapability,
    #[serde(default)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// The three optional allow-list sets §4.7 takes alongside the capability
/// record: filter fields, select fields, order-by fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowLists<'a> {
    pub fields: Option<&'a HashSet<String>>,
    pub select_fields: Option<&'a HashSet<String>>,
    pub order_fields: Option<&'a HashSet<String>>,
}

impl<'a> AllowLists<'a> {
    pub fn none() -> Self {
        Self::default()
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Operator classification
// ───────────────────────────────────────────────────────────────────────────

enum OpKind {
    Comparison,
    Exists,
    Not,
    And,
    Or,
}

fn classify_op(op: &str) -> OpKind {
    match op {
        "exists" => OpKind::Exists,
        "not" => OpKind::Not,
        "and" => OpKind::And,
        "or" => OpKind::Or,
        _ => OpKind::Comparison,
    }
}

// ───────────────────────────────────────────────────────────────────────────
// Validation algorithm (§4.7)
// ───────────────────────────────────────────────────────────────────────────

/// Validate `spec` against `caps` and the supplied allow-lists (§4.7).
/// Returns either `spec` unchanged, or a copy with `limit` clamped to
/// `caps.pagination.max_limit`.
pub fn validate(spec: &QuerySpec, caps: &Capabilities, allow: AllowLists<'_>) -> Result<QuerySpec> {
    // Step 1: `where` requires `query` capability.
    if spec.where_.is_some() && !caps.query.supported {
        return Err(CoreError::unsupported("where", "query"));
    }

    // Step 2: `select` requires `projection` capability, plus shape/allow-list.
    if let Some(select) = &spec.select {
        if !caps.projection.supported {
            return Err(CoreError::unsupported("select", "projection"));
        }
        for field in select {
            if let Some(allowed) = allow.select_fields {
                if !allowed.contains(field) {
                    return Err(CoreError::field_not_allowed("select", field));
                }
            }
        }
    }

    // Step 3: recursively validate the filter AST.
    if let Some(where_node) = &spec.where_ {
        if !caps.filter.supported {
            return Err(CoreError::unsupported("where", "filtering"));
        }
        validate_filter_node(where_node, "where", caps, allow.fields)?;
    }

    // Step 4: `order_by` requires the `order_by` capability, plus shape/allow-list.
    if let Some(order_by) = &spec.order_by {
        if !caps.order_by.supported {
            return Err(CoreError::unsupported("order_by", "order_by"));
        }
        for (i, entry) in order_by.iter().enumerate() {
            let path = format!("order_by[{i}]");
            let field = entry.strip_prefix('-').unwrap_or(entry);
            if field.is_empty() {
                return Err(CoreError::invalid_shape(path, "order_by entry has no field name"));
            }
            if let Some(allowed) = allow.order_fields {
                if !allowed.contains(field) {
                    return Err(CoreError::field_not_allowed(path, field));
                }
            }
        }
    }

    // Step 5/6: pagination. Only `limit` may need clamping; the rest of the
    // spec is returned as-is (cheap to clone wholesale, since the validator
    // is explicitly permitted to do that per §4.7).
    let pagination_requested = spec.limit.is_some() || spec.offset != 0;
    if pagination_requested && !caps.pagination.supported {
        return Err(CoreError::unsupported("limit/offset", "pagination"));
    }

    if spec.offset < 0 {
        return Err(CoreError::invalid_shape("offset", "offset must be a non-negative integer"));
    }

    let mut result = spec.clone();
    if let Some(limit) = spec.limit {
        if limit < 0 {
            return Err(CoreError::invalid_shape("limit", "limit must be a non-negative integer"));
        }
        if let Some(max_limit) = caps.pagination.max_limit {
            let clamped = (limit as u64).min(max_limit) as i64;
            if clamped != limit {
                result.limit = Some(clamped);
            }
        }
    }

    Ok(result)
}

fn validate_filter_node(
    node: &serde_json::Value,
    path: &str,
    caps: &Capabilities,
    allow_fields: Option<&HashSet<String>>,
) -> Result<()> {
    let arr = node
        .as_array()
        .ok_or_else(|| CoreError::invalid_shape(path, "filter node must be an array"))?;
    if arr.is_empty() {
        return Err(CoreError::invalid_shape(path, "filter node must not be empty"));
    }
    let op = arr[0]
        .as_str()
        .ok_or_else(|| CoreError::invalid_shape(path, "filter node operator must be a string"))?;

    // An operator absent from `caps.filter.ops` is operator-absence, whether
    // or not it's one this crate recognizes — `Unsupported`, not a shape
    // defect (§4.7).
    if !caps.filter.ops.contains(op) {
        return Err(CoreError::unsupported(path, op));
    }

    match classify_op(op) {
        OpKind::Comparison => {
            if arr.len() != 3 {
                return Err(CoreError::invalid_shape(path, format!("'{op}' expects arity 3")));
            }
            let field = arr[1]
                .as_str()
                .ok_or_else(|| CoreError::invalid_shape(format!("{path}.field"), "comparison field must be a string"))?;
            if let Some(allowed) = allow_fields {
                if !allowed.contains(field) {
                    return Err(CoreError::field_not_allowed(path, field));
                }
            }
            if op == "in" && !arr[2].is_array() {
                return Err(CoreError::invalid_shape(format!("{path}.value"), "'in' requires an ordered list value"));
            }
            Ok(())
        }
        OpKind::Exists => {
            if arr.len() != 2 {
                return Err(CoreError::invalid_shape(path, "'exists' expects arity 2"));
            }
            let field = arr[1]
                .as_str()
                .ok_or_else(|| CoreError::invalid_shape(format!("{path}.field"), "exists field must be a string"))?;
            if let Some(allowed) = allow_fields {
                if !allowed.contains(field) {
                    return Err(CoreError::field_not_allowed(path, field));
                }
            }
            Ok(())
        }
        OpKind::Not => {
            if arr.len() != 2 {
                return Err(CoreError::invalid_shape(path, "'not' expects arity 2"));
            }
            validate_filter_node(&arr[1], &format!("{path}.not"), caps, allow_fields)
        }
        OpKind::And => {
            if arr.len() != 3 {
                return Err(CoreError::invalid_shape(path, "'and' expects arity 3"));
            }
            validate_filter_node(&arr[1], &format!("{path}.and.left"), caps, allow_fields)?;
            validate_filter_node(&arr[2], &format!("{path}.and.right"), caps, allow_fields)
        }
        OpKind::Or => {
            if arr.len() != 3 {
                return Err(CoreError::invalid_shape(path, "'or' expects arity 3"));
            }
            validate_filter_node(&arr[1], &format!("{path}.or.left"), caps, allow_fields)?;
            validate_filter_node(&arr[2], &format!("{path}.or.right"), caps, allow_fields)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn caps_with_ops(ops: &[&str]) -> Capabilities {
        Capabilities {
            query: QueryCapability { supported: true },
            filter: FilterCapability {
                supported: true,
                pushdown: false,
                ops: ops.iter().map(|s| s.to_string()).collect(),
            },
            order_by: OrderByCapability { supported: true },
            projection: ProjectionCapability { supported: true },
            pagination: PaginationCapability {
                supported: true,
                mode: PaginationMode::Offset,
                max_limit: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn unsupported_operator_mentions_the_operator() {
        let caps = caps_with_ops(&["eq", "and"]);
        let spec = QuerySpec::new().with_where(FilterNode::comparison("gt", "age", serde_json::json!(18)));
        let err = validate(&spec, &caps, AllowLists::none()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unsupported);
        assert!(err.to_string().contains("gt"));
    }

    /// Even a wholly made-up operator is operator-absence, not a shape
    /// defect — `Unsupported`, not `InvalidShape` (§4.7).
    #[test]
    fn unknown_operator_under_full_capabilities_is_unsupported_not_invalid_shape() {
        let caps = caps_with_ops(&[
            "eq", "ne", "gt", "gte", "lt", "lte", "in", "contains", "startswith", "endswith", "regex", "fulltext",
            "near", "within", "exists", "not", "and", "or",
        ]);
        let spec = QuerySpec::new().with_where(FilterNode::comparison("foobar", "age", serde_json::json!(18)));
        let err = validate(&spec, &caps, AllowLists::none()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unsupported);
        assert!(err.to_string().contains("foobar"));
    }

    #[test]
    fn max_limit_clamps_down_but_leaves_smaller_limits_untouched() {
        let mut caps = caps_with_ops(&["eq"]);
        caps.pagination.max_limit = Some(1000);

        let over = QuerySpec::new().with_limit(5000);
        let clamped = validate(&over, &caps, AllowLists::none()).unwrap();
        assert_eq!(clamped.limit, Some(1000));

        let under = QuerySpec::new().with_limit(500);
        let unchanged = validate(&under, &caps, AllowLists::none()).unwrap();
        assert_eq!(unchanged, under);
    }

    #[test]
    fn where_without_query_capability_is_rejected() {
        let caps = Capabilities::default();
        let spec = QuerySpec::new().with_where(FilterNode::comparison("eq", "id", serde_json::json!(1)));
        let err = validate(&spec, &caps, AllowLists::none()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unsupported);
    }

    #[test]
    fn nested_path_accumulates_crumbs() {
        let caps = caps_with_ops(&["eq", "and", "or", "not", "gt"]);
        let inner_or = serde_json::json!(["or", ["eq", "a", 1], ["gt", "b", 2]]);
        let not_node = serde_json::json!(["not", inner_or]);
        let spec = QuerySpec::new().with_where(serde_json::json!(["and", ["eq", "c", 3], not_node]));
        // swap "gt" out of the capability set so the deepest node fails
        let mut caps = caps;
        caps.filter.ops.remove("gt");
        let err = validate(&spec, &caps, AllowLists::none()).unwrap_err();
        assert_eq!(err.context().fields.get("path").and_then(|v| v.as_str()), Some("where.and.right.not.or.right"));
    }

    #[test]
    fn in_builder_always_emits_an_ordered_array() {
        let node = FilterNode::in_("status", vec![serde_json::json!("a"), serde_json::json!("b")]);
        assert_eq!(node, serde_json::json!(["in", "status", ["a", "b"]]));
    }

    #[test]
    fn fold_logical_left_folds_more_than_two_operands() {
        let operands = vec![serde_json::json!(1), serde_json::json!(2), serde_json::json!(3)];
        let folded = FilterNode::fold_logical("and", operands).unwrap();
        assert_eq!(folded, serde_json::json!(["and", ["and", 1, 2], 3]));
    }

    #[test]
    fn offset_nonzero_without_pagination_capability_fails() {
        let mut caps = Capabilities::default();
        caps.query.supported = true;
        let spec = QuerySpec::new().with_offset(10);
        let err = validate(&spec, &caps, AllowLists::none()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unsupported);
    }

    #[test]
    fn select_allow_list_rejects_disallowed_fields() {
        let caps = caps_with_ops(&["eq"]);
        let allowed: HashSet<String> = ["name".to_string()].into_iter().collect();
        let spec = QuerySpec {
            select: Some(vec!["ssn".to_string()]),
            ..Default::default()
        };
        let err = validate(
            &spec,
            &caps,
            AllowLists {
                select_fields: Some(&allowed),
                ..AllowLists::none()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::FieldNotAllowed);
    }
}
