use serde::{Deserialize, Serialize};

use crate::{entity::commission_rule, prelude::*};

/// Resolve the commission percent for a trailing monthly-sales figure.
///
/// `rules` must be sorted ascending by threshold (the query order and the
/// stored invariant). The highest threshold not exceeding `month_sales`
/// wins; no qualifying rule means 0%.
pub fn resolve_percent(
  rules: &[commission_rule::Model],
  month_sales: i64,
) -> i32 {
  rules
    .iter()
    .filter(|rule| rule.min_monthly_sales <= month_sales)
    .last()
    .map(|rule| rule.percent)
    .unwrap_or(0)
}

pub fn commission_for(base_amount: i64, percent: i32) -> i64 {
  base_amount * percent as i64 / 100
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleInput {
  pub min_monthly_sales: i64,
  pub percent: i32,
}

/// Validate and normalize a replacement rate table. Duplicate thresholds
/// are rejected here, at update time, so resolution never sees ties.
pub fn validate_rules(rules: &[RuleInput]) -> Result<Vec<RuleInput>> {
  let mut sorted = rules.to_vec();
  sorted.sort_by_key(|rule| rule.min_monthly_sales);

  for rule in &sorted {
    if rule.min_monthly_sales < 0 {
      return Err(Error::Validation {
        field: "rules",
        message: format!("negative threshold {}", rule.min_monthly_sales),
      });
    }
    if !(0..=100).contains(&rule.percent) {
      return Err(Error::Validation {
        field: "rules",
        message: format!("percent {} out of range", rule.percent),
      });
    }
  }

  for pair in sorted.windows(2) {
    if pair[0].min_monthly_sales == pair[1].min_monthly_sales {
      return Err(Error::Validation {
        field: "rules",
        message: format!("duplicate threshold {}", pair[0].min_monthly_sales),
      });
    }
  }

  Ok(sorted)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rules(table: &[(i64, i32)]) -> Vec<commission_rule::Model> {
    table
      .iter()
      .enumerate()
      .map(|(i, &(min_monthly_sales, percent))| commission_rule::Model {
        id: i as i32 + 1,
        affiliate_id: 1,
        min_monthly_sales,
        percent,
      })
      .collect()
  }

  #[test]
  fn test_resolve_highest_qualifying_tier() {
    let table = rules(&[(0, 5), (50_000, 7), (100_000, 10)]);

    assert_eq!(resolve_percent(&table, 75_000), 7);
    assert_eq!(resolve_percent(&table, 0), 5);
    assert_eq!(resolve_percent(&table, 49_999), 5);
    assert_eq!(resolve_percent(&table, 50_000), 7);
    assert_eq!(resolve_percent(&table, 1_000_000), 10);
  }

  #[test]
  fn test_resolve_no_qualifying_rule() {
    assert_eq!(resolve_percent(&[], 75_000), 0);

    let table = rules(&[(10_000, 5)]);
    assert_eq!(resolve_percent(&table, 9_999), 0);
  }

  #[test]
  fn test_resolve_monotonic_in_sales() {
    let table = rules(&[(0, 2), (1_000, 4), (5_000, 6), (20_000, 9)]);

    let mut last = 0;
    for sales in (0..30_000).step_by(250) {
      let percent = resolve_percent(&table, sales);
      assert!(percent >= last, "percent decreased at sales={sales}");
      last = percent;
    }
  }

  #[test]
  fn test_commission_computation() {
    assert_eq!(commission_for(1000, 7), 70);
    assert_eq!(commission_for(0, 7), 0);
    assert_eq!(commission_for(999, 10), 99);
  }

  #[test]
  fn test_validate_rejects_duplicate_thresholds() {
    let input = vec![
      RuleInput { min_monthly_sales: 0, percent: 5 },
      RuleInput { min_monthly_sales: 50_000, percent: 7 },
      RuleInput { min_monthly_sales: 50_000, percent: 9 },
    ];
    assert!(matches!(
      validate_rules(&input),
      Err(Error::Validation { field: "rules", .. })
    ));
  }

  #[test]
  fn test_validate_rejects_bad_percent() {
    let input = vec![RuleInput { min_monthly_sales: 0, percent: 101 }];
    assert!(validate_rules(&input).is_err());

    let input = vec![RuleInput { min_monthly_sales: 0, percent: -1 }];
    assert!(validate_rules(&input).is_err());
  }

  #[test]
  fn test_validate_sorts_input() {
    let input = vec![
      RuleInput { min_monthly_sales: 50_000, percent: 7 },
      RuleInput { min_monthly_sales: 0, percent: 5 },
    ];
    let sorted = validate_rules(&input).unwrap();
    assert_eq!(sorted[0].min_monthly_sales, 0);
    assert_eq!(sorted[1].min_monthly_sales, 50_000);
  }
}
