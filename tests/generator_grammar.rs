//! Property tests: every generated instance obeys the wire grammar and the
//! per-domain value rules, for any seed and any sane generator config.

use matrix_diff::config::GeneratorConfig;
use matrix_diff::core_types::{NumericDomain, Operation};
use matrix_diff::generator::{ShapePolicy, generate_instance};
use matrix_diff::wire::{parse_instance, split_complex};
use proptest::prelude::*;

fn arb_policy() -> impl Strategy<Value = ShapePolicy> {
    prop_oneof![Just(ShapePolicy::Independent), Just(ShapePolicy::Compatible)]
}

fn arb_config() -> impl Strategy<Value = GeneratorConfig> {
    (1usize..=12, -50i64..=50, 0i64..=60, arb_policy()).prop_map(|(max_dim, min, span, policy)| {
        GeneratorConfig {
            max_dim,
            min_value: min,
            max_value: min + span,
            shape_policy: policy,
        }
    })
}

fn frac_digits(token: &str) -> usize {
    token.split_once('.').map_or(0, |(_, frac)| frac.len())
}

fn in_range(value: f64, cfg: &GeneratorConfig) -> bool {
    value >= cfg.min_value as f64 && value <= cfg.max_value as f64
}

proptest! {
    #[test]
    fn generated_text_parses(seed in any::<u64>(), cfg in arb_config()) {
        let instance = generate_instance(&cfg, seed);
        let parsed = parse_instance(instance.text(), cfg.max_dim)
            .map_err(|e| TestCaseError::fail(format!("{e}\n{}", instance.text())))?;

        prop_assert_eq!(parsed.domain, instance.domain());
        prop_assert_eq!(parsed.operation, instance.operation());
        prop_assert_eq!(parsed.operands.len(), instance.operation().operand_count());
        for (matrix, shape) in parsed.operands.iter().zip(instance.shapes()) {
            prop_assert_eq!(matrix.shape, *shape);
            prop_assert!(shape.rows() <= cfg.max_dim && shape.cols() <= cfg.max_dim);
            prop_assert_eq!(matrix.cells.len(), shape.cell_count());
        }
    }

    #[test]
    fn cell_values_respect_domain_rules(seed in any::<u64>(), cfg in arb_config()) {
        let instance = generate_instance(&cfg, seed);
        let parsed = parse_instance(instance.text(), cfg.max_dim).unwrap();

        for cell in parsed.operands.iter().flat_map(|m| m.cells.iter()) {
            match parsed.domain {
                NumericDomain::Integer => {
                    prop_assert!(!cell.contains('.') && !cell.ends_with('i'));
                    let v: i64 = cell.parse().unwrap();
                    prop_assert!(v >= cfg.min_value && v <= cfg.max_value, "{} out of range", v);
                }
                NumericDomain::Real => {
                    prop_assert!(cell.contains('.'));
                    prop_assert!(frac_digits(cell) <= 4, "{} has too many decimals", cell);
                    let v: f64 = cell.parse().unwrap();
                    prop_assert!(in_range(v, &cfg), "{} out of range", v);
                }
                NumericDomain::Complex => {
                    let (re, im) = split_complex(cell).unwrap();
                    prop_assert!(frac_digits(re) <= 2 && frac_digits(im) <= 2);
                    prop_assert!(in_range(re.parse().unwrap(), &cfg));
                    prop_assert!(in_range(im.parse().unwrap(), &cfg));
                }
            }
        }
    }

    #[test]
    fn replay_is_byte_identical(seed in any::<u64>(), cfg in arb_config()) {
        let first = generate_instance(&cfg, seed);
        let second = generate_instance(&cfg, seed);
        prop_assert_eq!(first.text(), second.text());
    }

    #[test]
    fn compatible_shapes_are_well_formed(seed in any::<u64>(), max_dim in 1usize..=10) {
        let cfg = GeneratorConfig {
            max_dim,
            shape_policy: ShapePolicy::Compatible,
            ..GeneratorConfig::default()
        };
        let instance = generate_instance(&cfg, seed);
        let shapes = instance.shapes();
        match instance.operation() {
            Operation::Addition => prop_assert_eq!(shapes[0], shapes[1]),
            Operation::Multiplication => prop_assert_eq!(shapes[0].cols(), shapes[1].rows()),
            Operation::Transpose => prop_assert_eq!(shapes.len(), 1),
        }
    }
}
