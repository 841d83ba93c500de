pub mod audit;
pub mod auth;
pub mod care;
pub mod document;
pub mod medication;
pub mod notification;
pub mod records;
pub mod resident;
pub mod staff;
pub mod user;
pub mod workflow;

use serde::{Deserialize, Deserializer};

/// For update bodies: an absent field stays `None` (keep the stored value)
/// while an explicit `null` becomes `Some(None)` (clear it). Use together
/// with `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// LIMIT/OFFSET pair from 1-based `page` and `per_page` (default 20, max 100).
pub fn paginate(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page.unwrap_or(1).max(1) - 1) * per_page;
    (per_page, offset)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde::Deserialize;

    use super::{nullable, paginate};

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        end_date: Option<Option<NaiveDate>>,
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(paginate(None, None), (20, 0));
        assert_eq!(paginate(Some(3), None), (20, 40));
        assert_eq!(paginate(Some(0), Some(500)), (100, 0));
        assert_eq!(paginate(Some(-2), Some(0)), (1, 0));
    }

    #[test]
    fn nullable_field_distinguishes_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.end_date, None);
        let cleared: Patch = serde_json::from_str(r#"{"end_date": null}"#).unwrap();
        assert_eq!(cleared.end_date, Some(None));
        let set: Patch = serde_json::from_str(r#"{"end_date": "2025-06-30"}"#).unwrap();
        assert_eq!(set.end_date, Some(NaiveDate::from_ymd_opt(2025, 6, 30)));
    }
}
