//! Message bodies for login codes and decision notices.

use hoi_storage::{Role, SubmissionRecord, SubmissionStatus};

use super::Email;

fn role_title(role: Role) -> &'static str {
    match role {
        Role::Reviewer => "HOI Dashboard Admin",
        Role::Submitter => "Form Submitter",
    }
}

/// The login code message.
pub fn login_code(to: &str, role: Role, code: &str, ttl_secs: i64) -> Email {
    let title = role_title(role);
    Email::new(
        to,
        format!("Your {} Login OTP", title),
        format!(
            "Dear User,\n\n\
             Your One-Time Password (OTP) for {title} login is: {code}\n\
             This code is valid for {ttl_secs} seconds.\n\n\
             Do not share this OTP with anyone."
        ),
    )
}

/// The notice sent to the submitter after a decision.
pub fn decision_notice(submission: &SubmissionRecord, reviewer: &str, remarks: &str) -> Email {
    let subject = &submission.subject;
    let (title, body) = match submission.status {
        SubmissionStatus::Approved => (
            format!("Approved: {}", subject),
            format!(
                "Dear User,\n\n\
                 Your submission for '{subject}' has been APPROVED by {reviewer}.\n\n\
                 HOI Remarks: {remarks}\n\n\
                 Thank you."
            ),
        ),
        SubmissionStatus::Disapproved => (
            format!("Action Required: {}", subject),
            format!(
                "Dear User,\n\n\
                 Your submission for '{subject}' has been DISAPPROVED by {reviewer}.\n\n\
                 --- HOI Remarks (Reason for Disapproval) ---\n\
                 {remarks}\n\
                 --------------------------------------------\n\n\
                 Please review the form and resubmit with necessary corrections."
            ),
        ),
        SubmissionStatus::Alert => (
            format!("Alert Flag: {}", subject),
            format!(
                "Dear User,\n\n\
                 Your submission for '{subject}' has been FLAGGED AS ALERT by {reviewer} \
                 for further review.\n\n\
                 HOI Remarks: {remarks}\n\n\
                 Action will be notified soon."
            ),
        ),
        SubmissionStatus::Pending | SubmissionStatus::Activity => (
            format!("Returned to Pending: {}", subject),
            format!(
                "Dear User,\n\n\
                 Your submission for '{subject}' has been returned to PENDING by {reviewer}.\n\n\
                 HOI Remarks: {remarks}\n\n\
                 No action is required from you at this time."
            ),
        ),
    };
    Email::new(&submission.user, title, body)
}

/// Subject and body of the management digest for approvals and alerts.
pub fn management_digest(
    submission: &SubmissionRecord,
    reviewer: &str,
    remarks: &str,
) -> (String, String) {
    let status = submission.status.as_str().to_uppercase();
    let subject = format!("HOI ALERT: {} - {}", status, submission.subject);
    let body = format!(
        "A submission has been processed by {reviewer} with status: {status}.\n\n\
         Details:\n \
         - Submission ID: {id}\n \
         - Form Type: {form}\n \
         - Submitted By: {user}\n \
         - HOI Remarks: {remarks}\n",
        id = submission.id,
        form = submission.form,
        user = submission.user,
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn decided(status: SubmissionStatus) -> SubmissionRecord {
        SubmissionRecord {
            id: "S0000001".into(),
            form: "Academics".into(),
            user: "staff@x".into(),
            subject: "Q3 report".into(),
            payload: serde_json::json!({}),
            status,
            submitted_at: datetime!(2025-03-01 10:00 UTC),
            decided_at: Some(datetime!(2025-03-02 10:00 UTC)),
            reviewed_by: Some("hoi@x".into()),
            remarks: Some("fine".into()),
        }
    }

    #[test]
    fn login_code_names_role_and_code() {
        let mail = login_code("staff@x", Role::Submitter, "123456", 120);
        assert_eq!(mail.subject, "Your Form Submitter Login OTP");
        assert!(mail.body.contains("123456"));
        assert!(mail.body.contains("120 seconds"));
    }

    #[test]
    fn disapproval_carries_remarks_and_resubmit_instruction() {
        let mail = decision_notice(&decided(SubmissionStatus::Disapproved), "hoi@x", "missing totals");
        assert_eq!(mail.to, "staff@x");
        assert!(mail.subject.starts_with("Action Required"));
        assert!(mail.body.contains("missing totals"));
        assert!(mail.body.contains("resubmit"));
    }

    #[test]
    fn pending_notice_is_distinct() {
        let mail = decision_notice(&decided(SubmissionStatus::Pending), "hoi@x", "later");
        assert!(mail.subject.starts_with("Returned to Pending"));
    }

    #[test]
    fn digest_lists_submission_details() {
        let (subject, body) = management_digest(&decided(SubmissionStatus::Alert), "hoi@x", "look");
        assert_eq!(subject, "HOI ALERT: ALERT - Q3 report");
        assert!(body.contains("S0000001"));
        assert!(body.contains("Academics"));
        assert!(body.contains("staff@x"));
    }
}
