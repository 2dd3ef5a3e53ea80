use crate::schema::FieldPath;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::ReportIssue;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    // Two-digit years first, %Y would read "24" as year 24
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
];

pub fn parse_bill_date(date_str: &str) -> Option<NaiveDate> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

/// Two date fields where `later` must not precede `earlier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateOrder {
    pub earlier: FieldPath,
    pub later: FieldPath,
}

impl DateOrder {
    /// Returns a warning per unreadable date, or an error when the order is wrong
    pub fn check(&self, record: &Value) -> Vec<ReportIssue> {
        let earlier = self.read(&self.earlier, record);
        let later = self.read(&self.later, record);

        match (earlier, later) {
            (Ok(Some(earlier_date)), Ok(Some(later_date))) if later_date < earlier_date => {
                vec![ReportIssue::error(
                    self.later.as_str(),
                    format!(
                        "{} ({}) is before {} ({})",
                        self.later, later_date, self.earlier, earlier_date
                    ),
                )]
            }
            (earlier, later) => [earlier, later]
                .into_iter()
                .filter_map(Result::err)
                .collect(),
        }
    }

    fn read(&self, path: &FieldPath, record: &Value) -> Result<Option<NaiveDate>, ReportIssue> {
        match path.get(record) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => parse_bill_date(s).map(Some).ok_or_else(|| {
                ReportIssue::warning(path.as_str(), format!("unrecognized date '{}'", s))
            }),
            Some(other) => Err(ReportIssue::warning(
                path.as_str(),
                format!("expected a date but found {}", other),
            )),
        }
    }
}

/// Days between the start and end of a service period, `None` when the
/// period ends before it starts
pub fn service_days(start: &str, end: &str) -> Option<i64> {
    let start = parse_bill_date(start)?;
    let end = parse_bill_date(end)?;
    let days = (end - start).num_days();
    (days >= 0).then_some(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;
    use shared_types::IssueSeverity;

    fn order(earlier: &str, later: &str) -> DateOrder {
        DateOrder {
            earlier: FieldPath::parse(earlier).unwrap(),
            later: FieldPath::parse(later).unwrap(),
        }
    }

    #[test]
    fn test_parse_formats() {
        for input in [
            "2024-03-15",
            "03/15/2024",
            "03/15/24",
            "03-15-2024",
            "Mar 15, 2024",
            "March 15, 2024",
            "15 Mar 2024",
        ] {
            let date = parse_bill_date(input).unwrap_or_else(|| panic!("failed on {input}"));
            assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 15));
        }
        assert!(parse_bill_date("").is_none());
        assert!(parse_bill_date("next tuesday").is_none());
    }

    #[test]
    fn test_due_before_bill_date() {
        let rule = order("bill_date", "due_date");

        let ok = json!({"bill_date": "2024-03-01", "due_date": "03/21/2024"});
        assert!(rule.check(&ok).is_empty());

        let bad = json!({"bill_date": "2024-03-01", "due_date": "2024-02-20"});
        let issues = rule.check(&bad);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert_eq!(issues[0].path, "due_date");
    }

    #[test]
    fn test_missing_and_unparseable_dates() {
        let rule = order("service_period.start", "service_period.end");

        assert!(rule.check(&json!({})).is_empty());
        assert!(rule
            .check(&json!({"service_period": {"start": null, "end": "2024-02-01"}}))
            .is_empty());

        let issues = rule.check(&json!({"service_period": {"start": "soon", "end": "2024-02-01"}}));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
        assert_eq!(issues[0].path, "service_period.start");
    }

    #[test]
    fn test_both_dates_unreadable() {
        let rule = order("service_period.start", "service_period.end");
        let issues = rule.check(&json!({"service_period": {"start": "soon", "end": 20240201}}));

        let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["service_period.start", "service_period.end"]);
        assert!(issues.iter().all(|i| i.severity == IssueSeverity::Warning));
    }

    #[test]
    fn test_service_days() {
        assert_eq!(service_days("2024-01-15", "02/14/2024"), Some(30));
        assert_eq!(service_days("2024-01-15", "unknown"), None);
        assert_eq!(service_days("2024-02-14", "2024-02-14"), Some(0));
        assert_eq!(service_days("2024-03-01", "2024-02-01"), None);
    }
}
