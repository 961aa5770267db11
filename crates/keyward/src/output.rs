// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text and JSON rendering of command results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use keyward_core::{CredentialSummary, KeywardError};
use keyward_policy::ScanReport;

/// Serialize any result for `--json` mode.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, KeywardError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| KeywardError::Internal(format!("failed to serialize output: {e}")))
}

/// Human-readable time until (or since) the rotation deadline.
pub fn format_due(due_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (due_at - now).num_days();
    match days {
        d if d < 0 => format!("overdue {}d", -d),
        0 => "due today".to_string(),
        d => format!("in {d}d"),
    }
}

/// Fixed-width table of credential summaries.
pub fn format_table(summaries: &[CredentialSummary], now: DateTime<Utc>) -> String {
    if summaries.is_empty() {
        return "no credentials".to_string();
    }

    let mut out = format!(
        "{:<36}  {:<16}  {:<24}  {:<12}  {:<11}  {:<15}  {:<8}  {}\n",
        "ID", "OWNER", "NAME", "SERVICE", "ENV", "MODE", "STATUS", "ROTATION"
    );
    for s in summaries {
        out.push_str(&format!(
            "{:<36}  {:<16}  {:<24}  {:<12}  {:<11}  {:<15}  {:<8}  {}\n",
            s.id.as_str(),
            truncate(&s.owner_id, 16),
            truncate(&s.name, 24),
            truncate(&s.service, 12),
            s.environment.to_string(),
            s.key_mode.to_string(),
            s.status.to_string(),
            format_due(s.rotation_due_at, now),
        ));
    }
    out.truncate(out.trim_end().len());
    out
}

/// Key/value view of one credential.
pub fn format_detail(s: &CredentialSummary, now: DateTime<Utc>) -> String {
    let last_used = s
        .last_used_at
        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
    [
        format!("id:             {}", s.id),
        format!("owner:          {}", s.owner_id),
        format!("name:           {}", s.name),
        format!("service:        {}", s.service),
        format!("description:    {}", s.description.as_deref().unwrap_or("-")),
        format!("environment:    {}", s.environment),
        format!("tags:           {}", s.tags.join(", ")),
        format!("key mode:       {}", s.key_mode),
        format!("status:         {}", s.status),
        format!("interval:       {} days", s.rotation_interval_days),
        format!("created:        {}", s.created_at.to_rfc3339()),
        format!("last rotated:   {}", s.last_rotated_at.to_rfc3339()),
        format!(
            "rotation due:   {} ({})",
            s.rotation_due_at.to_rfc3339(),
            format_due(s.rotation_due_at, now)
        ),
        format!("last used:      {last_used}"),
        format!("uses:           {}", s.usage_count),
    ]
    .join("\n")
}

pub fn format_report(report: &ScanReport) -> String {
    let mut line = format!(
        "scanned {}, expired {}, due soon {}, failed {}, skipped {}",
        report.scanned, report.expired, report.due_soon, report.failed, report.skipped
    );
    if report.interrupted {
        line.push_str(" (interrupted)");
    }
    line
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use keyward_core::{CredentialStatus, Environment, KeyMode};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()
    }

    fn summary() -> CredentialSummary {
        let rotated = now() - Duration::days(80);
        CredentialSummary {
            id: "cred-1".into(),
            owner_id: "alice".into(),
            name: "openai production key".into(),
            service: "openai".into(),
            description: None,
            environment: Environment::Production,
            tags: vec!["llm".into(), "eu".into()],
            key_mode: KeyMode::UserPassphrase,
            status: CredentialStatus::Active,
            rotation_interval_days: 90,
            created_at: rotated,
            last_rotated_at: rotated,
            rotation_due_at: rotated + Duration::days(90),
            last_used_at: None,
            usage_count: 3,
        }
    }

    #[test]
    fn due_labels() {
        assert_eq!(format_due(now() + Duration::days(10), now()), "in 10d");
        assert_eq!(format_due(now() + Duration::hours(5), now()), "due today");
        assert_eq!(format_due(now() - Duration::days(3), now()), "overdue 3d");
    }

    #[test]
    fn table_lists_every_row() {
        let table = format_table(&[summary()], now());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("cred-1"));
        assert!(lines[1].contains("in 10d"));
    }

    #[test]
    fn empty_table() {
        assert_eq!(format_table(&[], now()), "no credentials");
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdefgh", 4), "abc~");
        assert_eq!(truncate("abc", 4), "abc");
    }

    #[test]
    fn detail_shows_mode_and_deadline() {
        let detail = format_detail(&summary(), now());
        assert!(detail.contains(&format!("key mode:       {}", KeyMode::UserPassphrase)));
        assert!(detail.contains("interval:       90 days"));
        assert!(detail.contains("(in 10d)"));
        assert!(detail.contains("environment:    production"));
        assert!(detail.contains("tags:           llm, eu"));
        assert!(detail.contains("description:    -"));
        assert!(detail.contains("last used:      never"));
        assert!(detail.contains("uses:           3"));
    }

    #[test]
    fn report_line_flags_interruption() {
        let report = ScanReport {
            scanned: 4,
            expired: 1,
            interrupted: true,
            ..ScanReport::default()
        };
        let line = format_report(&report);
        assert!(line.starts_with("scanned 4, expired 1"));
        assert!(line.ends_with("(interrupted)"));
    }

    #[test]
    fn json_output_has_no_secret_fields() {
        let json = to_json(&[summary()]).unwrap();
        assert!(json.contains("\"owner_id\": \"alice\""));
        assert!(!json.contains("sealed"));
        assert!(!json.contains("ciphertext"));
    }
}
