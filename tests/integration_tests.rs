use mathspeak::{
    evaluate_verbose, parse_expression, speak, translate, translate_node, Context, Evaluator,
    MathError, Node, Op, Options, RuleSet,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn ctx() -> Context {
    Context::default()
}

fn ctx_with(options: serde_json::Value) -> Context {
    Context::new(Options::from_json(&options).unwrap())
}

fn parse(src: &str) -> Node {
    parse_expression(src, &mut ctx()).unwrap()
}

fn speak_with(options: serde_json::Value, src: &str) -> String {
    let spec = json!({ "method": "translate" });
    let mut spec = spec.as_object().unwrap().clone();
    for (k, v) in options.as_object().unwrap() {
        spec.insert(k.clone(), v.clone());
    }
    Evaluator::from_spec(&serde_json::Value::Object(spec))
        .unwrap()
        .evaluate(src)
        .unwrap()
}

mod parsing {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_well_formed_inputs_parse() {
        for src in [
            "1+2",
            "x^2 - 3x + 2",
            "\\frac{1}{2}",
            "3\\frac{1}{2}",
            "1.5 \\times 10^3",
            "0.\\overline{3}",
            "|x - 1|",
            "\\sqrt[3]{8}",
            "(1, 3]",
            "{1, 2, 3}",
            "\\begin{pmatrix} 1 & 2 \\\\ 3 & 4 \\end{pmatrix}",
            "\\lim_{x \\to 0} x",
            "\\sum_{i}^{n} i^2",
            "a_n + a_{n+1}",
            "90\\degree",
            "50\\%",
            "5!",
        ] {
            assert!(parse_expression(src, &mut ctx()).is_ok(), "failed: {}", src);
        }
    }

    #[test]
    fn test_error_positions_stay_inside_input() {
        for src in ["1)", "1..2", "\\frac{1}", "\\sqrt 2", "2 3"] {
            match parse_expression(src, &mut ctx()) {
                Err(MathError::Parse { position, .. }) => {
                    assert!(position <= src.len(), "position {} > len of {:?}", position, src)
                }
                other => panic!("expected parse error for {:?}, got {:?}", src, other),
            }
        }
    }

    #[test]
    fn test_adjacent_integers_need_an_operator() {
        let err = parse_expression("2 3", &mut ctx()).unwrap_err();
        assert_eq!(err.code(), 1010);
    }

    #[test]
    fn test_thousands_separators_validated() {
        let mut c = ctx_with(json!({"allowThousandsSeparator": true}));
        assert!(parse_expression("1,234,567", &mut c).is_ok());
        let err = parse_expression("12,34", &mut c).unwrap_err();
        assert_eq!(err.code(), 1005);
    }

    #[test]
    fn test_separator_conflict_is_config_error() {
        let err = Options::from_json(&json!({
            "allowThousandsSeparator": true,
            "setDecimalSeparator": ","
        }))
        .unwrap_err();
        assert!(matches!(err, MathError::Config { .. }));
        assert_eq!(err.code(), 1008);
    }

    #[test]
    fn test_strict_mode_rejects_unknown_leaves() {
        let mut c = ctx_with(json!({"strict": true}));
        let err = parse_expression("1 + \\whatever", &mut c).unwrap_err();
        assert_eq!(err.code(), 1006);
    }

    #[test]
    fn test_scientific_flag() {
        let n = parse("1.5 \\times 10^3");
        assert!(n.meta.is_scientific);
        let n = parse("1.5 \\times 10^{-3}");
        assert!(n.meta.is_scientific);
    }

    #[test]
    fn test_matrix_dims() {
        let n = parse("\\begin{bmatrix} 1 & 2 & 3 \\\\ 4 & 5 & 6 \\end{bmatrix}");
        assert_eq!(n.op, Op::Matrix);
        assert_eq!(n.meta.dims, Some((2, 3)));
    }

    #[test]
    fn test_chained_relations_desugar_pairwise() {
        let n = parse("1 < x < 5");
        assert_eq!(n.op, Op::Comma);
        assert_eq!(n.args.len(), 2);
        assert_eq!(n.args[0].op, Op::Lt);
        assert_eq!(n.args[1].op, Op::Lt);
        assert_eq!(n.args[0].args[1], n.args[1].args[0]);
    }
}

mod normalization {
    use super::*;
    use pretty_assertions::assert_eq;
    use mathspeak::normalize;

    #[test]
    fn test_idempotent() {
        for src in ["1+2+3", "2 \\cdot 3 \\cdot 4", "2x^2 + 3x", "x > 3"] {
            let c = ctx();
            let n = parse(src);
            let once = normalize(&n, &c);
            let twice = normalize(&once, &c);
            assert_eq!(once, twice, "not idempotent: {}", src);
        }
    }

    #[test]
    fn test_independent_parses_are_equal_keys() {
        for src in ["? + ?", "\\frac{?}{?}", "?:integer", "\\sqrt{? + 1}"] {
            let a = normalize(&parse(src), &ctx());
            let b = normalize(&parse(src), &ctx());
            assert_eq!(a, b, "keys differ: {}", src);
            let mut flagged = a.clone();
            flagged.meta.is_implicit = true;
            assert_eq!(flagged, b, "metadata leaked into equality: {}", src);
        }
    }
}

mod speech {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonical_renderings() {
        assert_eq!(speak("1+2").unwrap(), "1 plus 2");
        assert_eq!(speak("\\frac{1}{2}").unwrap(), "1 half");
        assert_eq!(speak("x^2").unwrap(), "x squared");
        assert_eq!(speak("3\\frac{1}{2}").unwrap(), "3 and 1 half");
    }

    #[test]
    fn test_rest_binding_folds_chains() {
        assert_eq!(speak("1+2+3+4").unwrap(), "1 plus 2 plus 3 plus 4");
        assert_eq!(
            speak("2 \\cdot 3 \\cdot 4").unwrap(),
            "2 times 3 times 4"
        );
    }

    #[test]
    fn test_polynomial_reading() {
        assert_eq!(speak("x^2 - 3x + 2").unwrap(), "x squared minus 3 x plus 2");
    }

    #[test]
    fn test_scientific_reading() {
        assert_eq!(
            speak("1.5 \\times 10^3").unwrap(),
            "1 point 5 times 10 cubed"
        );
    }

    #[test]
    fn test_percent_and_factorial() {
        assert_eq!(speak("50\\%").unwrap(), "50 percent");
        assert_eq!(speak("5!").unwrap(), "5 factorial");
    }

    #[test]
    fn test_absolute_value_and_roots() {
        assert_eq!(speak("|x|").unwrap(), "the absolute value of x");
        assert_eq!(speak("\\sqrt{x+1}").unwrap(), "the square root of x plus 1");
        assert_eq!(speak("\\sqrt[3]{8}").unwrap(), "the 3 root of 8");
    }

    #[test]
    fn test_set_and_comma_list() {
        assert_eq!(speak("{1, 2, 3}").unwrap(), "the set 1 comma 2 comma 3");
    }

    #[test]
    fn test_equation_reading() {
        assert_eq!(speak("2x + 1 = 5").unwrap(), "2 x plus 1 equals 5");
    }

    #[test]
    fn test_missing_rule_passes_node_through() {
        let table = json!({ "rules": { "?:integer": "%1" } });
        let mut c = ctx();
        let rules = RuleSet::compile(&table, &mut c).unwrap();
        let node = parse("x^2");
        let out = translate_node(&node, &rules, &mut c).unwrap();
        assert!(!out.is_text_leaf());
        assert_eq!(out.op, Op::Pow);
        assert_eq!(
            translate(&node, &rules, &mut c).unwrap(),
            "missing rule for Pow expression"
        );
    }

    #[test]
    fn test_custom_rules_shadow_nothing_but_themselves() {
        let out = speak_with(
            json!({ "rules": { "?:integer": "%1", "? + ?": "%1 and %2" } }),
            "1+2",
        );
        assert_eq!(out, "1 and 2");
    }

    #[test]
    fn test_custom_words() {
        let out = speak_with(
            json!({
                "words": { "x": "ecks" },
                "rules": { "?:integer": "%1", "? ?": "%1 %2" }
            }),
            "2x",
        );
        assert_eq!(out, "2 ecks");
    }

    #[test]
    fn test_nested_table_scoping() {
        let out = speak_with(
            json!({
                "rules": {
                    "?:integer": "%1",
                    "\\vec{?}": {
                        "vector %1": { "?:integer": "component %1" }
                    }
                }
            }),
            "\\vec{7}",
        );
        assert_eq!(out, "vector component 7");
    }

    #[test]
    fn test_context_tags() {
        let table = json!({
            "rules": {
                "?:integer": "%1",
                "? + ?": [
                    { "context": "noParens", "template": "%1 plus %2" },
                    "the quantity %1 plus %2"
                ]
            }
        });
        let out = speak_with(table.clone(), "1+2");
        assert_eq!(out, "1 plus 2");
        let out = speak_with(table, "(1+2)");
        assert_eq!(out, "the quantity 1 plus 2");
    }

    #[test]
    fn test_typed_wildcard_digit_count() {
        let out = speak_with(
            json!({
                "rules": {
                    "?:integer 3": "the three digit number %1",
                    "?:integer": "%1"
                }
            }),
            "123",
        );
        assert_eq!(out, "the three digit number 123");
    }

    #[test]
    fn test_user_types() {
        let out = speak_with(
            json!({
                "types": { "unit": ["0", "1"] },
                "rules": {
                    "?:unit": "the unit %1",
                    "?:integer": "%1",
                    "? + ?": "%1 plus %2"
                }
            }),
            "1 + 7",
        );
        assert_eq!(out, "the unit 1 plus 7");
    }

    #[test]
    fn test_ignore_order_option() {
        let out = speak_with(json!({ "ignoreOrder": true }), "x > 3");
        assert_eq!(out, "3 is less than x");
    }

    #[test]
    fn test_step_counter_aborts() {
        let mut c = ctx();
        c.set_step_limit(3);
        let err = parse_expression("1+2+3+4+5+6+7+8", &mut c).unwrap_err();
        assert_eq!(err.code(), 3005);
    }
}

mod evaluator {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_verbose_success() {
        let out = evaluate_verbose(&json!({"method": "translate"}), "1+2");
        assert!(out.is_success());
        assert_eq!(out.result.as_deref(), Some("1 plus 2"));
        assert_eq!(out.error_code, 0);
    }

    #[test]
    fn test_verbose_spec_failure() {
        let out = evaluate_verbose(&json!({"unknownOption": 1}), "1");
        assert!(!out.is_success());
        assert_eq!(out.error_code, 3006);
        assert_eq!(out.location.as_deref(), Some("spec"));
    }

    #[test]
    fn test_verbose_user_failure_carries_position() {
        let out = evaluate_verbose(&json!({}), "1)");
        assert!(!out.is_success());
        let location = out.location.unwrap_or_default();
        assert!(location.starts_with("user:"), "location was {}", location);
    }

    #[test]
    fn test_evaluator_reuse() {
        let evaluator = Evaluator::from_spec(&json!({"method": "translate"})).unwrap();
        assert_eq!(evaluator.evaluate("1+2").unwrap(), "1 plus 2");
        assert_eq!(evaluator.evaluate("x^2").unwrap(), "x squared");
        let outcome = evaluator.evaluate_verbose("\\frac{1}{2}");
        assert_eq!(outcome.result.as_deref(), Some("1 half"));
    }

    #[test]
    fn test_serialized_outcome_shape() {
        let out = evaluate_verbose(&json!({}), "1+2");
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["result"], "1 plus 2");
        assert_eq!(v["errorCode"], 0);
    }
}
