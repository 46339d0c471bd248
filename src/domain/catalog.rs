//! Ordered condition catalog.
//!
//! Ordinals are only meaningful against a stable catalog, so generation is a
//! pure function of the tag sequence: families in a fixed order, and within
//! each family every leg in tag order.

use crate::domain::condition::{CompareOp, Condition, Leg, Operand};

/// Supplies the ordered predicate sequence for a tag list.
pub trait ConditionCatalog {
    fn catalog(&self, tags: &[String]) -> Vec<Condition>;
}

/// Tag that appends the win/lose streak family.
pub const TRADE_TAG: &str = "trade";
/// Tag (and leg name) of the market-wide new-high score series.
pub const NEW_SCORE_TAG: &str = "new_score";

const AVERAGE_COLUMNS: [&str; 2] = ["daily_average", "weekly_average"];
const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

const CROSS_COLUMNS: [&str; 7] = [
    "average_cross",
    "macd_cross",
    "rci_cross",
    "env12_cross",
    "env11_cross",
    "env09_cross",
    "env08_cross",
];

const TREND_COLUMNS: [&str; 11] = [
    "daily_average_trend",
    "weekly_average_trend",
    "volume_average_trend",
    "macd_trend",
    "macdhist_trend",
    "rci_trend",
    "rci_long_trend",
    "stages_trend",
    "stages_average_trend",
    "rising_safety_trend",
    "fall_safety_trend",
];

const CANDLESTICK_COLUMNS: [&str; 27] = [
    "yang_tsutsumi",
    "yang_harami",
    "lower_kenuki",
    "ake_mojo",
    "yin_sanku",
    "yin_sanpei",
    "yin_tsutsumi",
    "yin_harami",
    "upper_kenuki",
    "yoi_mojo",
    "yang_sanku",
    "yang_sanpei",
    "long_upper_shadow",
    "long_lower_shadow",
    "yang",
    "yin",
    "long_yang",
    "long_yin",
    "low_roundup",
    "high_roundup",
    "low_rounddown",
    "high_rounddown",
    "yang_gap",
    "yin_gap",
    "gap",
    "harami",
    "tsutsumi",
];

/// Catalog over the indicator columns produced by the data pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCatalog;

impl ConditionCatalog for StandardCatalog {
    fn catalog(&self, tags: &[String]) -> Vec<Condition> {
        let legs: Vec<Leg> = tags
            .iter()
            .filter(|t| t.as_str() != TRADE_TAG && t.as_str() != NEW_SCORE_TAG)
            .map(|t| Leg::from_tag(t))
            .collect();

        let families: [fn(&Leg) -> Vec<Condition>; 7] = [
            average_conditions,
            oscillator_conditions,
            cross_conditions,
            trend_conditions,
            band_conditions,
            stages_conditions,
            candlestick_conditions,
        ];

        let mut conditions: Vec<Condition> = families
            .iter()
            .flat_map(|family| legs.iter().flat_map(|leg| family(leg)))
            .collect();

        if tags.iter().any(|t| t == NEW_SCORE_TAG) {
            conditions.extend(new_score_conditions());
        }
        if tags.iter().any(|t| t == TRADE_TAG) {
            conditions.extend(trade_conditions());
        }
        conditions
    }
}

fn gt_lt(leg: &Leg, left: &str, right: &str) -> [Condition; 2] {
    [
        Condition::columns(leg, left, CompareOp::Gt, right),
        Condition::columns(leg, left, CompareOp::Lt, right),
    ]
}

fn flags(leg: &Leg, column: &str, values: &[f64]) -> Vec<Condition> {
    values
        .iter()
        .map(|&v| Condition::threshold(leg, column, CompareOp::Eq, v))
        .collect()
}

fn average_conditions(leg: &Leg) -> Vec<Condition> {
    let mut out = Vec::new();
    for column in AVERAGE_COLUMNS {
        for target in PRICE_COLUMNS {
            out.extend(gt_lt(leg, column, target));
        }
    }
    out.extend(gt_lt(leg, "volume", "volume_average"));
    out
}

fn oscillator_conditions(leg: &Leg) -> Vec<Condition> {
    let t = |column: &str, op, v| Condition::threshold(leg, column, op, v);
    let mut out = Vec::new();
    for column in ["rci", "rci_long"] {
        out.extend([
            t(column, CompareOp::Gt, 80.0),
            t(column, CompareOp::Lt, 80.0),
            t(column, CompareOp::Lt, -80.0),
            t(column, CompareOp::Gt, -80.0),
        ]);
    }
    out.extend(gt_lt(leg, "rci", "rci_long"));
    for column in ["macd", "macdsignal"] {
        out.extend([t(column, CompareOp::Gt, 0.0), t(column, CompareOp::Lt, 0.0)]);
    }
    out.extend(gt_lt(leg, "macd", "macdsignal"));
    out.extend([
        t("macdhist", CompareOp::Gt, 0.0),
        t("macdhist", CompareOp::Lt, 0.0),
    ]);
    out.extend(flags(leg, "macdhist_convert", &[1.0, 0.0, -1.0]));
    out
}

fn cross_conditions(leg: &Leg) -> Vec<Condition> {
    CROSS_COLUMNS
        .iter()
        .flat_map(|c| flags(leg, c, &[1.0, 0.0, -1.0]))
        .collect()
}

fn trend_conditions(leg: &Leg) -> Vec<Condition> {
    TREND_COLUMNS
        .iter()
        .flat_map(|c| flags(leg, c, &[1.0, 0.0, -1.0]))
        .collect()
}

fn band_conditions(leg: &Leg) -> Vec<Condition> {
    let [gt, lt] = gt_lt(leg, "env_entity", "env_entity_average");
    vec![lt, gt]
}

fn stages_conditions(leg: &Leg) -> Vec<Condition> {
    let mut out = flags(leg, "stages", &[-2.0, -1.0, 0.0, 1.0, 2.0]);
    let [gt, lt] = gt_lt(leg, "stages", "stages_average");
    out.extend([lt, gt]);
    for column in ["stages", "stages_average"] {
        out.extend([
            Condition::threshold(leg, column, CompareOp::Gt, 0.0),
            Condition::threshold(leg, column, CompareOp::Lt, 0.0),
        ]);
    }
    out
}

fn candlestick_conditions(leg: &Leg) -> Vec<Condition> {
    let mut out: Vec<Condition> = CANDLESTICK_COLUMNS
        .iter()
        .flat_map(|c| flags(leg, c, &[1.0, 0.0]))
        .collect();
    let [gt, lt] = gt_lt(leg, "entity", "entity_average");
    out.extend([lt, gt]);
    out
}

fn new_score_conditions() -> Vec<Condition> {
    let leg = Leg::Index(NEW_SCORE_TAG.to_string());
    let score = || Operand::col("score");
    let min = |bars| Operand::Min {
        column: "score".to_string(),
        bars,
    };
    let c = |left, op, right| Condition::on(leg.clone(), left, op, right);
    let k = Operand::Constant;

    let mut out = vec![
        c(
            score(),
            CompareOp::Lt,
            Operand::Lagged {
                column: "score".to_string(),
                bars: 1,
            },
        ),
        c(
            score(),
            CompareOp::Gt,
            Operand::Lagged {
                column: "score".to_string(),
                bars: 1,
            },
        ),
    ];
    for level in [-500.0, -1000.0, -2000.0] {
        out.push(c(score(), CompareOp::Lt, k(level)));
    }
    for level in [-500.0, -1000.0, -2000.0] {
        for bars in [5, 10, 20] {
            out.push(c(min(bars), CompareOp::Lt, k(level)));
        }
    }
    for level in [50.0, 100.0, 200.0] {
        out.push(c(score(), CompareOp::Gt, k(level)));
    }
    for level in [50.0, 100.0, 200.0] {
        for bars in [5, 10, 20] {
            out.push(c(min(bars), CompareOp::Gt, k(level)));
        }
    }
    out
}

fn trade_conditions() -> Vec<Condition> {
    let mut out = Vec::new();
    for streak in [Operand::WinStreak, Operand::LoseStreak] {
        for n in [1.0, 2.0, 3.0] {
            out.push(Condition::daily(
                streak.clone(),
                CompareOp::Ge,
                Operand::Constant(n),
            ));
        }
    }
    out
}
