use crate::prelude::*;

/// `YYYY-MM` period bucket for a timestamp. Lexicographic order on these
/// keys matches chronological order.
pub fn month_key(at: DateTime) -> String {
  at.format("%Y-%m").to_string()
}

/// Extract the `ref` query value from a storefront URL, as embedded in
/// affiliate referral links.
pub fn code_from_url(url: &str) -> Option<String> {
  let query = url.split_once('?')?.1;
  let query = query.split('#').next().unwrap_or(query);
  query.split('&').find_map(|pair| {
    let (key, value) = pair.split_once('=')?;
    (key == "ref" && !value.is_empty()).then(|| value.to_string())
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_month_key() {
    let at = chrono::NaiveDate::from_ymd_opt(2026, 8, 26)
      .unwrap()
      .and_hms_opt(13, 45, 0)
      .unwrap();
    assert_eq!(month_key(at), "2026-08");

    let jan = chrono::NaiveDate::from_ymd_opt(2027, 1, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    assert_eq!(month_key(jan), "2027-01");
  }

  #[test]
  fn test_code_from_url() {
    assert_eq!(
      code_from_url("https://shop.example/p/42?utm=x&ref=RAVI10"),
      Some("RAVI10".into())
    );
    assert_eq!(
      code_from_url("https://shop.example/?ref=abc#top"),
      Some("abc".into())
    );
    assert_eq!(code_from_url("https://shop.example/p/42"), None);
    assert_eq!(code_from_url("https://shop.example/p/42?ref="), None);
  }
}
