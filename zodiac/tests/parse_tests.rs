//! End-to-end validation scenarios through the synchronous drivers.

use serde_json::json;
use zodiac::{
    any, array, bigint, coerce, date, discriminated_union, enumeration, intersection, lazy,
    literal, map, never, null, number, object, record, set, string, tuple, undefined, union,
    IssueCode, PathSegment, Schema, Value,
};

// =============================================================================
// Primitives and literals
// =============================================================================

#[test]
fn test_primitive_type_tests() {
    assert!(string().parse("hi").is_ok());
    assert!(string().parse(3).is_err());
    assert!(number().parse(3).is_ok());
    assert!(number().parse("3").is_err());
    assert!(bigint().parse(Value::BigInt(9)).is_ok());
    assert!(bigint().parse(9).is_err());
    assert!(null().parse(Value::Null).is_ok());
    assert!(null().parse(Value::Undefined).is_err());
    assert!(undefined().parse(Value::Undefined).is_ok());
    assert!(any().parse(Value::Null).is_ok());
    assert!(never().parse("anything").is_err());
}

#[test]
fn test_literal_and_enum() {
    assert!(literal("on").parse("on").is_ok());
    let err = literal("on").parse("off").unwrap_err();
    assert!(matches!(err.issues()[0].code, IssueCode::InvalidLiteral { .. }));

    let color = enumeration(["red", "green", "blue"]);
    assert!(color.parse("green").is_ok());
    let err = color.parse("mauve").unwrap_err();
    match &err.issues()[0].code {
        IssueCode::InvalidEnumValue { options } => {
            assert_eq!(options, &["red", "green", "blue"]);
        }
        other => panic!("expected invalid_enum_value, got {other:?}"),
    }
}

#[test]
fn test_date_primitive() {
    let now = chrono::Utc::now();
    assert_eq!(date().parse(now).unwrap(), Value::Date(now));
    assert!(date().parse("2024-01-02T03:04:05Z").is_err());
}

// =============================================================================
// String checks and rewrites
// =============================================================================

#[test]
fn test_string_formats() {
    assert!(string().email().parse("a@b.com").is_ok());
    assert!(string().email().parse("nope").is_err());
    assert!(string().url().parse("https://example.com").is_ok());
    assert!(string().url().parse("example.com").is_err());
    assert!(string().uuid().parse("123e4567-e89b-12d3-a456-426614174000").is_ok());
    assert!(string().ip().parse("::1").is_ok());
    assert!(string().ip().parse("999.0.0.1").is_err());
}

#[test]
fn test_trim_rewrites_before_later_checks() {
    let schema = string().trim().min_length(3);
    assert_eq!(schema.parse("  abc ").unwrap(), Value::from("abc"));
    assert!(schema.parse("  ab  ").is_err());
}

#[test]
fn test_custom_check_message() {
    let schema = string().min_length(8).with_message("password too short");
    let err = schema.parse("abc").unwrap_err();
    assert_eq!(err.issues()[0].message, "password too short");
}

#[test]
fn test_multiple_check_failures_reported_together() {
    let schema = string().min_length(5).email();
    let err = schema.parse("x").unwrap_err();
    assert_eq!(err.issues().len(), 2);
    assert!(matches!(err.issues()[0].code, IssueCode::TooSmall { .. }));
    assert!(matches!(err.issues()[1].code, IssueCode::InvalidString { .. }));
}

// =============================================================================
// Numeric checks
// =============================================================================

#[test]
fn test_numeric_bounds() {
    assert!(number().min(5.0).parse(5).is_ok());
    assert!(number().gt(5.0).parse(5).is_err());
    assert!(number().int().parse(2.5).is_err());
    assert!(number().multiple_of(3.0).parse(9).is_ok());
    assert!(number().multiple_of(3.0).parse(10).is_err());
    assert!(number().finite().parse(f64::INFINITY).is_err());
    assert!(number().nonnegative().parse(0).is_ok());
    assert!(number().negative().parse(0).is_err());
}

#[test]
fn test_bigint_bounds() {
    assert!(bigint().min(10.0).parse(Value::BigInt(15)).is_ok());
    assert!(bigint().min(10.0).parse(Value::BigInt(5)).is_err());
    assert!(bigint().multiple_of(4.0).parse(Value::BigInt(12)).is_ok());
}

#[test]
#[should_panic(expected = "multiple_of")]
fn test_multiple_of_rejects_zero_step() {
    let _ = number().multiple_of(0.0);
}

// =============================================================================
// Objects and unknown-key policies
// =============================================================================

#[test]
fn test_strip_policy_drops_unknown_keys() {
    let schema = object([("a", string())]);
    let out = schema.parse(json!({ "a": "x", "extra": 1 })).unwrap();
    assert_eq!(out, Value::from(json!({ "a": "x" })));
}

#[test]
fn test_strict_policy_reports_unknown_keys() {
    let schema = object([("a", string())]).strict();
    let err = schema.parse(json!({ "a": "x", "extra": 1, "more": 2 })).unwrap_err();
    assert_eq!(err.issues().len(), 1);
    match &err.issues()[0].code {
        IssueCode::UnrecognizedKeys { keys } => assert_eq!(keys, &["extra", "more"]),
        other => panic!("expected unrecognized_keys, got {other:?}"),
    }
}

#[test]
fn test_loose_policy_passes_unknown_keys_through() {
    let schema = object([("a", string())]).loose();
    let out = schema.parse(json!({ "a": "x", "extra": 1 })).unwrap();
    assert_eq!(out, Value::from(json!({ "a": "x", "extra": 1 })));
}

#[test]
fn test_catchall_validates_unknown_keys() {
    let schema = object([("a", string())]).catchall(number());
    let out = schema.parse(json!({ "a": "x", "n": 5 })).unwrap();
    assert_eq!(out, Value::from(json!({ "a": "x", "n": 5 })));

    let err = schema.parse(json!({ "a": "x", "n": "bad" })).unwrap_err();
    assert_eq!(err.issues()[0].path_string(), "n");
}

#[test]
fn test_optional_field_omitted_when_absent() {
    let schema = object([("nickname", string().optional())]);
    let out = schema.parse(json!({})).unwrap();
    assert_eq!(out, Value::from(json!({})));
}

#[test]
fn test_defaulted_field_appears_in_output() {
    let schema = object([("xp", number().default_value(0))]);
    let out = schema.parse(json!({})).unwrap();
    assert_eq!(out, Value::from(json!({ "xp": 0.0 })));
}

// =============================================================================
// Arrays, tuples, records, maps, sets
// =============================================================================

#[test]
fn test_array_size_then_elements() {
    let schema = array(number()).min_items(2);
    assert!(schema.parse(json!([1, 2, 3])).is_ok());

    let err = schema.parse(json!(["x"])).unwrap_err();
    assert!(matches!(err.issues()[0].code, IssueCode::TooSmall { .. }));
    assert_eq!(err.issues()[1].path_string(), "[0]");
}

#[test]
fn test_tuple_arity_and_rest() {
    let pair = tuple([string(), number()]);
    assert!(pair.parse(json!(["a", 1])).is_ok());
    assert!(pair.parse(json!(["a"])).is_err());
    assert!(pair.parse(json!(["a", 1, 2])).is_err());

    let with_rest = tuple([string()]).rest(number());
    let out = with_rest.parse(json!(["a", 1, 2, 3])).unwrap();
    assert_eq!(out, Value::from(json!(["a", 1.0, 2.0, 3.0])));
    let err = with_rest.parse(json!(["a", 1, "x"])).unwrap_err();
    assert_eq!(err.issues()[0].path_string(), "[2]");
}

#[test]
fn test_record_validates_keys_and_values() {
    let schema = record(string().min_length(2), number());
    assert!(schema.parse(json!({ "ok": 1, "yes": 2 })).is_ok());

    let err = schema.parse(json!({ "ok": 1, "x": 2 })).unwrap_err();
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].path_string(), "x");
}

#[test]
fn test_map_paths_use_string_keys_or_indices() {
    let schema = map(string(), number());
    let good = Value::map([
        (Value::from("a"), Value::from(1)),
        (Value::from("b"), Value::from(2)),
    ]);
    assert!(schema.parse(good).is_ok());

    let bad = Value::map([
        (Value::from("a"), Value::from(1)),
        (Value::from("b"), Value::from("nope")),
    ]);
    let err = schema.parse(bad).unwrap_err();
    assert_eq!(err.issues()[0].path_string(), "b");
}

#[test]
fn test_set_elements_and_sizes() {
    let schema = set(number()).min_items(2);
    assert!(schema.parse(Value::set([Value::from(1), Value::from(2)])).is_ok());
    assert!(schema.parse(Value::set([Value::from(1)])).is_err());

    let err = schema
        .parse(Value::set([Value::from(1), Value::from("x")]))
        .unwrap_err();
    assert_eq!(err.issues()[0].path_string(), "[1]");
}

// =============================================================================
// Path reporting
// =============================================================================

#[test]
fn test_nested_issue_path_round_trip() {
    let schema = object([("user", object([("tags", array(string()))]))]);
    let err = schema
        .parse(json!({ "user": { "tags": ["ok", 7] } }))
        .unwrap_err();
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].path_string(), "user.tags[1]");
    assert_eq!(
        err.issues()[0].path,
        vec![
            PathSegment::from("user"),
            PathSegment::from("tags"),
            PathSegment::from(1),
        ]
    );
}

#[test]
fn test_sibling_fields_validate_independently() {
    let schema = object([("username", string()), ("xp", number())]);
    let err = schema.parse(json!({ "username": 42, "xp": "100" })).unwrap_err();
    assert_eq!(err.issues().len(), 2);
    assert_eq!(err.issues()[0].path_string(), "username");
    assert_eq!(err.issues()[1].path_string(), "xp");
    for issue in err.issues() {
        assert!(matches!(issue.code, IssueCode::InvalidType { .. }));
    }
}

#[test]
fn test_valid_input_round_trips() {
    let schema = object([("username", string()), ("xp", number())]);
    let out = schema.parse(json!({ "username": "billie", "xp": 100 })).unwrap();
    assert_eq!(out, Value::from(json!({ "username": "billie", "xp": 100.0 })));
}

// =============================================================================
// Unions and intersections
// =============================================================================

#[test]
fn test_union_tries_branches_in_order() {
    let schema = union([string(), number()]);
    assert_eq!(schema.parse("x").unwrap(), Value::from("x"));
    assert_eq!(schema.parse(1).unwrap(), Value::from(1));

    let err = schema.parse(Value::Bool(true)).unwrap_err();
    assert_eq!(err.issues().len(), 1);
    match &err.issues()[0].code {
        IssueCode::InvalidUnion { branch_issues } => assert_eq!(branch_issues.len(), 2),
        other => panic!("expected invalid_union, got {other:?}"),
    }
}

fn shape_branches() -> [Schema; 2] {
    [
        object([("type", literal("circle")), ("radius", number())]),
        object([("type", literal("square")), ("side", number())]),
    ]
}

#[test]
fn test_discriminated_union_single_miss_issue() {
    let schema = discriminated_union("type", shape_branches());
    let err = schema.parse(json!({ "type": "triangle" })).unwrap_err();
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].path_string(), "type");
    match &err.issues()[0].code {
        IssueCode::InvalidUnionDiscriminator { options } => {
            assert_eq!(options, &["circle", "square"]);
        }
        other => panic!("expected invalid_union_discriminator, got {other:?}"),
    }

    // The plain union on the same branches aggregates every branch failure.
    let plain = union(shape_branches());
    let err = plain.parse(json!({ "type": "triangle" })).unwrap_err();
    match &err.issues()[0].code {
        IssueCode::InvalidUnion { branch_issues } => assert_eq!(branch_issues.len(), 2),
        other => panic!("expected invalid_union, got {other:?}"),
    }
}

#[test]
fn test_discriminated_union_dispatches_to_matched_branch() {
    let schema = discriminated_union("type", shape_branches());
    let out = schema.parse(json!({ "type": "circle", "radius": 2 })).unwrap();
    assert_eq!(out, Value::from(json!({ "type": "circle", "radius": 2.0 })));

    let err = schema.parse(json!({ "type": "circle", "radius": "big" })).unwrap_err();
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].path_string(), "radius");
}

#[test]
fn test_intersection_merges_objects() {
    let schema = intersection(
        object([("a", string())]),
        object([("b", number())]),
    );
    let out = schema.parse(json!({ "a": "x", "b": 1 })).unwrap();
    assert_eq!(out, Value::from(json!({ "a": "x", "b": 1.0 })));
}

#[test]
fn test_intersection_conflict_is_an_issue() {
    let schema = intersection(
        any().transform(|_, _| Value::from(1)),
        any().transform(|_, _| Value::from(2)),
    );
    let err = schema.parse("whatever").unwrap_err();
    assert!(matches!(err.issues()[0].code, IssueCode::InvalidIntersection));
}

// =============================================================================
// Modifiers
// =============================================================================

#[test]
fn test_default_short_circuits_checks() {
    let schema = string().min_length(100).default_value("fallback");
    assert_eq!(schema.parse(Value::Undefined).unwrap(), Value::from("fallback"));
    // Present input still runs the full pipeline.
    assert!(schema.parse("short").is_err());
}

#[test]
fn test_prefault_substitutes_input_and_validates() {
    let schema = number().min(10.0).prefault(3);
    assert!(schema.parse(Value::Undefined).is_err());

    let schema = number().min(10.0).prefault(12);
    assert_eq!(schema.parse(Value::Undefined).unwrap(), Value::from(12));
}

#[test]
fn test_catch_swallows_failures() {
    let schema = number().catch(0);
    assert_eq!(schema.parse("not a number").unwrap(), Value::from(0));
    assert_eq!(schema.parse(7).unwrap(), Value::from(7));
}

#[test]
fn test_catch_with_computes_fallback_from_error() {
    let schema = object([("a", number()), ("b", number())])
        .catch_with(|err| Value::from(err.issues().len() as i32));
    assert_eq!(schema.parse(json!({ "a": "x", "b": "y" })).unwrap(), Value::from(2));
}

#[test]
fn test_nullish_accepts_both_sentinels() {
    let schema = string().nullish();
    assert_eq!(schema.parse(Value::Null).unwrap(), Value::Null);
    assert_eq!(schema.parse(Value::Undefined).unwrap(), Value::Undefined);
    assert_eq!(schema.parse("x").unwrap(), Value::from("x"));
    assert!(schema.parse(3).is_err());
}

#[test]
fn test_readonly_is_idempotent() {
    let schema = array(number()).readonly().readonly();
    let out = schema.parse(json!([1, 2])).unwrap();
    assert_eq!(out, Value::from(json!([1.0, 2.0])));
    assert_eq!(schema.parse(json!([1, 2])).unwrap(), out);
}

#[test]
fn test_brand_is_identity_at_runtime() {
    let schema = string().brand();
    assert_eq!(schema.parse("x").unwrap(), Value::from("x"));
}

// =============================================================================
// Refinements and transforms
// =============================================================================

#[test]
fn test_refine_reports_custom_message() {
    let schema = string().refine("must be lowercase", |v| {
        v.as_str().is_some_and(|s| s.chars().all(|c| !c.is_uppercase()))
    });
    assert!(schema.parse("ok").is_ok());
    let err = schema.parse("Nope").unwrap_err();
    assert_eq!(err.issues()[0].message, "must be lowercase");
    assert!(matches!(err.issues()[0].code, IssueCode::Custom));
}

#[test]
fn test_refine_abort_skips_later_refinements() {
    let schema = string()
        .refine_abort("must not be empty", |v| v.as_str().is_some_and(|s| !s.is_empty()))
        .refine("never reached on empty input", |_| false);

    let err = schema.parse("").unwrap_err();
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].message, "must not be empty");

    let err = schema.parse("x").unwrap_err();
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].message, "never reached on empty input");
}

#[test]
fn test_refine_when_replaces_the_abort_gate() {
    let schema = string()
        .refine_abort("no spaces", |v| v.as_str().is_some_and(|s| !s.contains(' ')))
        .refine("skipped after abort", |_| false)
        .refine_when(
            |v| v.as_str().is_some(),
            "at least five characters",
            |v| v.as_str().is_some_and(|s| s.chars().count() >= 5),
        );

    let err = schema.parse("a b").unwrap_err();
    assert_eq!(err.issues().len(), 2);
    assert_eq!(err.issues()[0].message, "no spaces");
    assert_eq!(err.issues()[1].message, "at least five characters");
}

#[test]
fn test_refine_when_skips_unready_values() {
    let schema = any().refine_when(
        |v| v.as_str().is_some(),
        "strings stay short",
        |v| v.as_str().is_some_and(|s| s.chars().count() <= 3),
    );
    assert!(schema.parse(42).is_ok());
    assert!(schema.parse("abc").is_ok());
    assert!(schema.parse("abcd").is_err());
}

#[test]
fn test_super_refine_overrides_path() {
    let schema = object([("password", string()), ("confirm", string())]).super_refine(
        |value, ctx| {
            let fields = value.as_object().unwrap();
            if fields.get("password") != fields.get("confirm") {
                ctx.issue_at([PathSegment::from("confirm")], "passwords do not match");
            }
        },
    );

    assert!(schema.parse(json!({ "password": "a", "confirm": "a" })).is_ok());
    let err = schema.parse(json!({ "password": "a", "confirm": "b" })).unwrap_err();
    assert_eq!(err.issues()[0].path_string(), "confirm");
    assert_eq!(err.issues()[0].message, "passwords do not match");
}

#[test]
fn test_pipe_length_transform() {
    let length = any().transform(|v, _| {
        Value::from(v.as_str().map_or(0, |s| s.chars().count() as i32))
    });
    let schema = string().pipe(length);
    assert_eq!(schema.parse("hello").unwrap(), Value::from(5));

    // The second stage never runs when the first fails.
    let err = schema.parse(7).unwrap_err();
    assert_eq!(err.issues().len(), 1);
    assert!(matches!(err.issues()[0].code, IssueCode::InvalidType { .. }));
}

#[test]
fn test_transform_issue_fails_the_node() {
    let schema = any().transform(|v, ctx| {
        match v.as_number() {
            Some(n) => Value::from(n * 2.0),
            None => {
                ctx.issue("cannot double a non-number");
                Value::Undefined
            }
        }
    });
    assert_eq!(schema.parse(4).unwrap(), Value::from(8));
    let err = schema.parse("four").unwrap_err();
    assert_eq!(err.issues()[0].message, "cannot double a non-number");
}

// =============================================================================
// Checks on wrapper and untyped nodes
// =============================================================================

#[test]
fn test_checks_attached_to_wrapper_nodes_run() {
    let schema = number().optional().min(5.0);
    assert!(schema.parse(3).is_err());
    assert_eq!(schema.parse(7).unwrap(), Value::from(7));
    // The wrapper's undefined pass-through is not a number; the bound
    // keeps its shape-mismatch no-op policy.
    assert!(schema.parse(Value::Undefined).is_ok());
}

#[test]
fn test_checks_attached_to_any_node_run() {
    let schema = any().min_items(2);
    assert!(schema.parse(json!([1])).is_err());
    assert!(schema.parse(json!([1, 2])).is_ok());
    assert!(schema.parse("xx").is_ok());
}

#[test]
fn test_checks_attached_to_enum_node_run() {
    let schema = enumeration(["a", "alpha"]).min_length(3);
    assert!(schema.parse("alpha").is_ok());
    let err = schema.parse("a").unwrap_err();
    assert!(matches!(err.issues()[0].code, IssueCode::TooSmall { .. }));
}

#[test]
fn test_abort_check_on_wrapper_skips_later_refinement() {
    let schema = any().min_items(2).abort().refine("never reached", |_| false);
    let err = schema.parse(json!([1])).unwrap_err();
    assert_eq!(err.issues().len(), 1);
}

// =============================================================================
// Coercion
// =============================================================================

#[test]
fn test_coercing_number_accepts_strings_and_booleans() {
    assert_eq!(coerce::number().parse("42").unwrap(), Value::from(42));
    assert_eq!(coerce::number().parse(true).unwrap(), Value::from(1));
    // Non-coercing number stays strict.
    assert!(number().parse("42").is_err());
}

#[test]
fn test_coercing_string_and_boolean() {
    assert_eq!(coerce::string().parse(42).unwrap(), Value::from("42"));
    assert_eq!(coerce::boolean().parse("").unwrap(), Value::from(false));
    assert_eq!(coerce::boolean().parse("x").unwrap(), Value::from(true));
}

#[test]
fn test_coercing_date_accepts_rfc3339_and_millis() {
    let from_string = coerce::date().parse("2024-01-02T03:04:05Z").unwrap();
    assert!(matches!(from_string, Value::Date(_)));

    let from_millis = coerce::date().parse(0).unwrap();
    assert!(matches!(from_millis, Value::Date(_)));

    assert!(coerce::date().parse("yesterday-ish").is_err());
}

#[test]
fn test_unparseable_coercion_falls_through_to_type_error() {
    let err = coerce::number().parse("abc").unwrap_err();
    match &err.issues()[0].code {
        IssueCode::InvalidType { expected, .. } => assert_eq!(*expected, "number"),
        other => panic!("expected invalid_type, got {other:?}"),
    }
}

// =============================================================================
// Recursive schemas
// =============================================================================

fn category() -> Schema {
    object([
        ("name", string()),
        ("children", array(lazy(category)).default_value(Value::Array(Vec::new()))),
    ])
}

#[test]
fn test_lazy_recursion_terminates() {
    let schema = category();
    let out = schema
        .parse(json!({ "name": "root", "children": [{ "name": "kid" }] }))
        .unwrap();
    assert_eq!(
        out,
        Value::from(json!({ "name": "root", "children": [{ "name": "kid", "children": [] }] }))
    );
}

#[test]
fn test_lazy_recursion_reports_nested_paths() {
    let err = category()
        .parse(json!({ "name": "root", "children": [{ "name": 5 }] }))
        .unwrap_err();
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].path_string(), "children[0].name");
}

// =============================================================================
// Safe parse
// =============================================================================

#[test]
fn test_safe_parse_carries_success_and_failure() {
    let schema = string().min_length(2);

    let ok = schema.safe_parse("hi");
    assert!(ok.is_success());
    assert_eq!(ok.data(), Some(&Value::from("hi")));

    let bad = schema.safe_parse("x");
    assert!(bad.is_failure());
    let err = bad.error().unwrap();
    assert_eq!(err.issues().len(), 1);
}

#[test]
fn test_error_display_lists_every_issue() {
    let schema = object([("username", string()), ("xp", number())]);
    let err = schema.parse(json!({ "username": 1, "xp": "x" })).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("validation failed"));
    assert!(rendered.contains("1. username:"));
    assert!(rendered.contains("2. xp:"));
}
