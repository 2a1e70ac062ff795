#![allow(missing_docs)]

use coverage_model_core::{
    address::Address,
    span_stats::SpanStats,
    value::{ParamRange, ParamValue},
};
use proptest::prelude::*;

fn record(lo: i64, hi: i64) -> SpanStats {
    SpanStats::new(
        Address::brick_file("cov", "b0"),
        [("time".to_string(), ParamRange::ints(lo.min(hi), lo.max(hi)))],
    )
    .expect("valid stats")
}

proptest! {
    #[test]
    fn narrowing_extend_changes_nothing(
        lo in -1_000_i64..1_000,
        width in 0_i64..1_000,
        a in 0_i64..1_000,
        b in 0_i64..1_000,
    ) {
        let hi = lo + width;
        let inner_lo = lo + a.min(width);
        let inner_hi = inner_lo.max(lo + b.min(width));

        let mut stats = record(lo, hi);
        stats.extend_param("time", ParamRange::ints(inner_lo, inner_hi)).unwrap();

        prop_assert_eq!(stats.param("time"), Some(&ParamRange::ints(lo, hi)));
        prop_assert!(!stats.is_dirty());
    }

    #[test]
    fn narrowing_a_reversed_range_changes_nothing(
        lo in -1_000_i64..1_000,
        width in 1_i64..1_000,
        a in 0_i64..1_000,
    ) {
        let hi = lo + width;
        let inner = lo + a.min(width);
        let reversed = ParamRange::new(ParamValue::Int(hi), ParamValue::Int(lo)).unwrap();

        let mut stats = SpanStats::new(Address::id("a"), [("time".to_string(), reversed)]).unwrap();
        stats.extend_param("time", ParamRange::ints(inner, inner)).unwrap();

        prop_assert_eq!(stats.param("time"), Some(&ParamRange::ints(lo, hi)));
        prop_assert!(!stats.is_dirty());
    }

    #[test]
    fn widening_commutes(
        a in (-1_000_i64..1_000, -1_000_i64..1_000),
        b in (-1_000_i64..1_000, -1_000_i64..1_000),
        c in (-1_000_i64..1_000, -1_000_i64..1_000),
    ) {
        let mut left = record(a.0, a.1);
        left.extend(&record(b.0, b.1)).unwrap();
        left.extend(&record(c.0, c.1)).unwrap();

        let mut right = record(a.0, a.1);
        right.extend(&record(c.0, c.1)).unwrap();
        right.extend(&record(b.0, b.1)).unwrap();

        prop_assert_eq!(&left, &right);
        let lo = a.0.min(a.1).min(b.0.min(b.1)).min(c.0.min(c.1));
        let hi = a.0.max(a.1).max(b.0.max(b.1)).max(c.0.max(c.1));
        prop_assert_eq!(left.param("time"), Some(&ParamRange::ints(lo, hi)));
    }

    #[test]
    fn text_form_reparses(lo in any::<i64>(), hi in any::<i64>(), key in "[a-z_]{1,12}") {
        prop_assume!(key != "type" && key != "address");
        let stats = SpanStats::new(
            Address::file("cov", "data/part-0.bin", 0, 128),
            [(key, ParamRange::ints(lo, hi))],
        ).unwrap();
        let back: SpanStats = stats.to_string().parse().unwrap();
        prop_assert_eq!(back, stats);
    }
}
