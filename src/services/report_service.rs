use chrono::Utc;

use crate::models::{AuthorityReport, Issue, IssueDocument, IssueStatus, ReportOutcome};

pub const NOT_ENOUGH_SUPPORT: &str = "No issue has enough community support to be reported yet.";

/// Build the authority-facing report from the reportable issues, in the order given.
pub fn build_report(reportable: &[Issue]) -> ReportOutcome {
    let entries: Vec<IssueDocument> = reportable
        .iter()
        .filter(|issue| issue.status == IssueStatus::Reported)
        .map(IssueDocument::from)
        .collect();

    if entries.is_empty() {
        return ReportOutcome::NotEnoughSupport {
            message: NOT_ENOUGH_SUPPORT.to_string(),
        };
    }

    ReportOutcome::Ready(AuthorityReport {
        generated_at: Utc::now(),
        total: entries.len(),
        entries,
    })
}

pub fn render_text(outcome: &ReportOutcome) -> String {
    match outcome {
        ReportOutcome::NotEnoughSupport { message } => message.clone(),
        ReportOutcome::Ready(report) => render_report(report),
    }
}

fn render_report(report: &AuthorityReport) -> String {
    let mut out = format!(
        "COMMUNITY ISSUE REPORT\nGenerated: {}\nIssues: {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.total
    );

    for (n, entry) in report.entries.iter().enumerate() {
        out.push('\n');
        out.push_str(&render_document(n + 1, entry));
    }

    out
}

pub fn render_document(number: usize, doc: &IssueDocument) -> String {
    let mut out = format!("{}. {}\n", number, doc.title);
    out.push_str(&format!(
        "   Submitted: {}\n",
        doc.created_at.format("%Y-%m-%d")
    ));
    out.push_str(&format!(
        "   Location: {}\n",
        doc.location.as_deref().unwrap_or("not given")
    ));
    out.push_str(&format!(
        "   Support: {} up / {} down\n",
        doc.upvotes, doc.downvotes
    ));
    out.push_str(&format!("   Description: {}\n", doc.description));

    if let Some(summary) = &doc.summary {
        out.push_str(&format!("   Summary: {}\n", summary));
    }

    if !doc.opinions.is_empty() {
        out.push_str("   Community opinions:\n");
        for opinion in &doc.opinions {
            out.push_str(&format!("   - {}\n", opinion));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SUMMARY_UNAVAILABLE;
    use uuid::Uuid;

    fn issue(title: &str, status: IssueStatus) -> Issue {
        Issue {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: format!("{} description", title),
            location: None,
            attachment: None,
            upvotes: 5,
            downvotes: 0,
            status,
            opinions: vec!["Needs fixing".to_string()],
            summary: None,
            summary_revision: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_set_is_distinguishable() {
        let outcome = build_report(&[]);
        assert!(matches!(outcome, ReportOutcome::NotEnoughSupport { .. }));
        assert_eq!(render_text(&outcome), NOT_ENOUGH_SUPPORT);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "not_enough_support");
    }

    #[test]
    fn report_keeps_order_and_content() {
        let mut second = issue("Second", IssueStatus::Reported);
        second.summary = Some(SUMMARY_UNAVAILABLE.to_string());
        second.location = Some("Park Lane".to_string());

        let outcome = build_report(&[issue("First", IssueStatus::Reported), second]);
        let ReportOutcome::Ready(report) = &outcome else {
            panic!("expected a ready report");
        };

        assert_eq!(report.total, 2);
        assert_eq!(report.entries[0].title, "First");
        assert!(report.entries[1].summary.is_none());

        let text = render_text(&outcome);
        assert!(text.contains("1. First"));
        assert!(text.contains("2. Second"));
        assert!(text.contains("Location: Park Lane"));
        assert!(text.contains("- Needs fixing"));
        assert!(text.find("1. First") < text.find("2. Second"));
    }

    #[test]
    fn non_reported_issues_are_skipped() {
        let outcome = build_report(&[issue("Open", IssueStatus::Open)]);
        assert!(matches!(outcome, ReportOutcome::NotEnoughSupport { .. }));
    }
}
