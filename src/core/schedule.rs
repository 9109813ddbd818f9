use crate::domain::model::{ScheduleFields, ScheduleSpec};
use crate::utils::error::{DeployError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScheduleKind {
    Cron,
    Interval,
    RRule,
}

/// 回傳唯一的排程型別；多於一種即衝突
fn kind_of(fields: &ScheduleFields) -> Result<Option<ScheduleKind>> {
    let kinds: Vec<ScheduleKind> = [
        fields.cron.as_ref().map(|_| ScheduleKind::Cron),
        fields.interval.map(|_| ScheduleKind::Interval),
        fields.rrule.as_ref().map(|_| ScheduleKind::RRule),
    ]
    .into_iter()
    .flatten()
    .collect();

    match kinds.as_slice() {
        [] => Ok(None),
        [kind] => Ok(Some(*kind)),
        _ => Err(DeployError::ConflictingScheduleError),
    }
}

fn overlay(base: &ScheduleFields, top: &ScheduleFields) -> ScheduleFields {
    ScheduleFields {
        cron: top.cron.clone().or_else(|| base.cron.clone()),
        interval: top.interval.or(base.interval),
        anchor_date: top.anchor_date.clone().or_else(|| base.anchor_date.clone()),
        timezone: top.timezone.clone().or_else(|| base.timezone.clone()),
        rrule: top.rrule.clone().or_else(|| base.rrule.clone()),
    }
}

/// 合併 CLI 與檔案的排程欄位並驗證
pub struct ScheduleResolver;

impl ScheduleResolver {
    /// CLI 旗標只能指定一種排程型別，在處理任何部署前檢查一次
    pub fn validate_cli(cli: &ScheduleFields) -> Result<()> {
        kind_of(cli).map(|_| ())
    }

    pub fn resolve(
        cli: Option<&ScheduleFields>,
        file: Option<&ScheduleFields>,
    ) -> Result<Option<ScheduleSpec>> {
        let empty = ScheduleFields::default();
        let cli = cli.unwrap_or(&empty);
        let file = file.unwrap_or(&empty);

        let cli_kind = kind_of(cli)?;
        let file_kind = kind_of(file)?;

        let merged = match (cli_kind, file_kind) {
            (Some(cli_kind), Some(file_kind)) if cli_kind == file_kind => overlay(file, cli),
            (Some(_), _) => cli.clone(),
            (None, _) => ScheduleFields {
                anchor_date: cli.anchor_date.clone().or_else(|| file.anchor_date.clone()),
                timezone: cli.timezone.clone().or_else(|| file.timezone.clone()),
                ..file.clone()
            },
        };

        let kind = kind_of(&merged)?;

        if merged.anchor_date.is_some() && kind != Some(ScheduleKind::Interval) {
            return Err(DeployError::AnchorWithoutIntervalError);
        }

        let Some(kind) = kind else {
            if merged.timezone.is_some() {
                tracing::warn!("⚠️ A timezone was provided without a schedule; ignoring it");
            }
            return Ok(None);
        };

        let timezone = merged.timezone.filter(|tz| !tz.trim().is_empty());

        let spec = match kind {
            ScheduleKind::Cron => {
                let cron = merged.cron.unwrap_or_default();
                Self::validate_cron(&cron)?;
                ScheduleSpec::Cron { cron, timezone }
            }
            ScheduleKind::Interval => {
                let interval = merged.interval.unwrap_or_default();
                if interval == 0 {
                    return Err(DeployError::InvalidScheduleError {
                        field: "interval".to_string(),
                        reason: "must be a positive number of seconds".to_string(),
                    });
                }
                let anchor_date = merged
                    .anchor_date
                    .as_deref()
                    .map(Self::parse_anchor)
                    .transpose()?;
                ScheduleSpec::Interval {
                    interval,
                    anchor_date,
                    timezone,
                }
            }
            ScheduleKind::RRule => {
                let rrule = merged.rrule.unwrap_or_default();
                Self::validate_rrule(&rrule)?;
                ScheduleSpec::RRule { rrule, timezone }
            }
        };

        Ok(Some(spec))
    }

    fn validate_cron(cron: &str) -> Result<()> {
        let fields = cron.split_whitespace().count();
        if !(5..=6).contains(&fields) {
            return Err(DeployError::InvalidScheduleError {
                field: "cron".to_string(),
                reason: format!("expected 5 or 6 fields, found {} in '{}'", fields, cron),
            });
        }
        Ok(())
    }

    fn validate_rrule(rrule: &str) -> Result<()> {
        let trimmed = rrule.trim();
        if trimmed.contains("RRULE:") || trimmed.starts_with("FREQ=") {
            return Ok(());
        }
        Err(DeployError::InvalidScheduleError {
            field: "rrule".to_string(),
            reason: format!("'{}' is not an iCal recurrence rule", rrule),
        })
    }

    /// RFC 3339 或 `YYYY-MM-DD`（當日零時）
    fn parse_anchor(raw: &str) -> Result<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.naive_utc());
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Ok(parsed);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(|| DeployError::InvalidScheduleError {
                field: "anchor_date".to_string(),
                reason: format!("'{}' is not a valid date", raw),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cron(expr: &str) -> ScheduleFields {
        ScheduleFields {
            cron: Some(expr.to_string()),
            ..Default::default()
        }
    }

    fn interval(seconds: u64) -> ScheduleFields {
        ScheduleFields {
            interval: Some(seconds),
            ..Default::default()
        }
    }

    fn rrule(rule: &str) -> ScheduleFields {
        ScheduleFields {
            rrule: Some(rule.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_multi_type_combination_is_rejected() {
        let anchor = Some("2040-02-02".to_string());
        let combinations = vec![
            ScheduleFields { interval: Some(42), ..cron("0 4 * * *") },
            ScheduleFields { rrule: Some("FREQ=DAILY".to_string()), ..cron("0 4 * * *") },
            ScheduleFields { rrule: Some("FREQ=DAILY".to_string()), ..interval(42) },
            ScheduleFields {
                interval: Some(42),
                rrule: Some("FREQ=DAILY".to_string()),
                anchor_date: anchor.clone(),
                ..cron("0 4 * * *")
            },
        ];

        for fields in combinations {
            assert!(matches!(
                ScheduleResolver::validate_cli(&fields),
                Err(DeployError::ConflictingScheduleError)
            ));
            assert!(matches!(
                ScheduleResolver::resolve(Some(&fields), None),
                Err(DeployError::ConflictingScheduleError)
            ));
            assert!(matches!(
                ScheduleResolver::resolve(None, Some(&fields)),
                Err(DeployError::ConflictingScheduleError)
            ));
        }
    }

    #[test]
    fn test_anchor_requires_interval() {
        let anchor = Some("2040-02-02".to_string());
        let invalid = vec![
            ScheduleFields { anchor_date: anchor.clone(), ..cron("0 4 * * *") },
            ScheduleFields { anchor_date: anchor.clone(), ..rrule("FREQ=HOURLY") },
            ScheduleFields { anchor_date: anchor.clone(), ..Default::default() },
        ];

        for fields in invalid {
            assert!(matches!(
                ScheduleResolver::resolve(Some(&fields), None),
                Err(DeployError::AnchorWithoutIntervalError)
            ));
        }

        // CLI anchor attaches to an interval declared in the file
        let cli = ScheduleFields { anchor_date: anchor, ..Default::default() };
        let resolved = ScheduleResolver::resolve(Some(&cli), Some(&interval(42))).unwrap();
        assert_eq!(
            resolved,
            Some(ScheduleSpec::Interval {
                interval: 42,
                anchor_date: NaiveDate::from_ymd_opt(2040, 2, 2).and_then(|d| d.and_hms_opt(0, 0, 0)),
                timezone: None,
            })
        );
    }

    #[test]
    fn test_no_schedule_is_not_an_error() {
        assert_eq!(ScheduleResolver::resolve(None, None).unwrap(), None);

        let tz_only = ScheduleFields {
            timezone: Some("America/Chicago".to_string()),
            ..Default::default()
        };
        assert_eq!(ScheduleResolver::resolve(Some(&tz_only), None).unwrap(), None);
    }

    #[test]
    fn test_cli_timezone_overrides_file_timezone() {
        let file = ScheduleFields {
            timezone: Some("Europe/Berlin".to_string()),
            ..cron("0 4 * * *")
        };
        let cli = ScheduleFields {
            timezone: Some("America/Chicago".to_string()),
            ..Default::default()
        };

        let resolved = ScheduleResolver::resolve(Some(&cli), Some(&file)).unwrap();
        assert_eq!(
            resolved,
            Some(ScheduleSpec::Cron {
                cron: "0 4 * * *".to_string(),
                timezone: Some("America/Chicago".to_string()),
            })
        );
    }

    #[test]
    fn test_same_type_overlays_field_by_field() {
        let file = ScheduleFields {
            timezone: Some("Europe/Berlin".to_string()),
            ..cron("0 4 * * *")
        };
        let resolved = ScheduleResolver::resolve(Some(&cron("0 5 * * *")), Some(&file)).unwrap();

        assert_eq!(
            resolved,
            Some(ScheduleSpec::Cron {
                cron: "0 5 * * *".to_string(),
                timezone: Some("Europe/Berlin".to_string()),
            })
        );
    }

    #[test]
    fn test_different_cli_type_replaces_file_block() {
        let file = ScheduleFields {
            timezone: Some("Europe/Berlin".to_string()),
            ..cron("0 4 * * *")
        };
        let resolved = ScheduleResolver::resolve(Some(&interval(42)), Some(&file)).unwrap();

        assert_eq!(
            resolved,
            Some(ScheduleSpec::Interval {
                interval: 42,
                anchor_date: None,
                timezone: None,
            })
        );
    }

    #[test]
    fn test_file_only_schedules() {
        assert_eq!(
            ScheduleResolver::resolve(None, Some(&rrule("FREQ=HOURLY;INTERVAL=2"))).unwrap(),
            Some(ScheduleSpec::RRule {
                rrule: "FREQ=HOURLY;INTERVAL=2".to_string(),
                timezone: None,
            })
        );

        let file = ScheduleFields {
            anchor_date: Some("2040-01-01T10:30:00Z".to_string()),
            ..interval(3600)
        };
        let resolved = ScheduleResolver::resolve(None, Some(&file)).unwrap();
        assert_eq!(
            resolved,
            Some(ScheduleSpec::Interval {
                interval: 3600,
                anchor_date: NaiveDate::from_ymd_opt(2040, 1, 1).and_then(|d| d.and_hms_opt(10, 30, 0)),
                timezone: None,
            })
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = vec![
            (cron("* * *"), "cron"),
            (interval(0), "interval"),
            (rrule("every day"), "rrule"),
            (
                ScheduleFields {
                    anchor_date: Some("next tuesday".to_string()),
                    ..interval(60)
                },
                "anchor_date",
            ),
        ];

        for (fields, expected_field) in cases {
            match ScheduleResolver::resolve(Some(&fields), None) {
                Err(DeployError::InvalidScheduleError { field, .. }) => {
                    assert_eq!(field, expected_field)
                }
                other => panic!("expected invalid {} but got {:?}", expected_field, other),
            }
        }
    }
}
