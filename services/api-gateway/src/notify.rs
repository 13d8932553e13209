//! Email notifications.
//!
//! Handlebars renders the message; lettre delivers it over SMTP with
//! STARTTLS. When SMTP credentials are missing every send is skipped.
//! Callers log failures and carry on: a notification never fails the
//! request that triggered it.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::sync::Arc;

use mrf_models::MaterialRequest;
use mrf_utils::EmailConfig;

const NEW_REQUEST: &str = "new_request";
const STATUS_UPDATE: &str = "status_update";

const NEW_REQUEST_SUBJECT: &str = "New Material Request: {{mrf_number}}";
const NEW_REQUEST_BODY: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family:Arial,sans-serif;color:#333;">
<div style="background:#00205B;color:#fff;padding:16px;"><h2>New Material Request</h2></div>
<div style="padding:16px;">
<p><strong>MRF Number:</strong> {{mrf_number}}</p>
<p><strong>Requester:</strong> {{requester}}</p>
<p><strong>Location:</strong> {{asset}}</p>
<p><strong>Discipline:</strong> {{discipline}}</p>
<p><strong>Criticality:</strong> {{criticality}}</p>
<p><strong>Reason:</strong> {{reason}}</p>
<p><strong>Line items:</strong> {{line_count}}</p>
</div>
</body>
</html>"#;

const STATUS_UPDATE_SUBJECT: &str = "MRF {{mrf_number}} is now {{status}}";
const STATUS_UPDATE_BODY: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family:Arial,sans-serif;color:#333;">
<div style="background:#00205B;color:#fff;padding:16px;"><h2>Request Status Update</h2></div>
<div style="padding:16px;">
<p>Dear {{requester}},</p>
<p>Your material request <strong>{{mrf_number}}</strong> changed from {{previous_status}} to <strong>{{status}}</strong>.</p>
{{#if status_notes}}<p><strong>Notes:</strong> {{status_notes}}</p>{{/if}}
</div>
</body>
</html>"#;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body_html: String,
}

#[derive(Serialize)]
struct NewRequestContext<'a> {
    mrf_number: &'a str,
    requester: String,
    asset: &'a str,
    discipline: &'a str,
    criticality: &'a str,
    reason: &'a str,
    line_count: usize,
}

#[derive(Serialize)]
struct StatusUpdateContext<'a> {
    mrf_number: &'a str,
    requester: String,
    previous_status: &'a str,
    status: &'a str,
    status_notes: Option<&'a str>,
}

#[derive(Clone)]
pub struct Notifier {
    config: EmailConfig,
    templates: Arc<Handlebars<'static>>,
}

impl Notifier {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let mut templates = Handlebars::new();
        for (name, subject, body) in [
            (NEW_REQUEST, NEW_REQUEST_SUBJECT, NEW_REQUEST_BODY),
            (STATUS_UPDATE, STATUS_UPDATE_SUBJECT, STATUS_UPDATE_BODY),
        ] {
            templates
                .register_template_string(&format!("{}_subject", name), subject)
                .with_context(|| format!("Invalid subject template {}", name))?;
            templates
                .register_template_string(&format!("{}_body", name), body)
                .with_context(|| format!("Invalid body template {}", name))?;
        }

        Ok(Self {
            config,
            templates: Arc::new(templates),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    pub fn render_new_request(&self, request: &MaterialRequest, line_count: usize) -> Result<RenderedEmail> {
        self.render(
            NEW_REQUEST,
            &NewRequestContext {
                mrf_number: &request.mrf_number,
                requester: request.requester_name(),
                asset: &request.asset,
                discipline: &request.discipline,
                criticality: request.criticality.as_str(),
                reason: &request.reason,
                line_count,
            },
        )
    }

    pub fn render_status_update(&self, request: &MaterialRequest, previous_status: &str) -> Result<RenderedEmail> {
        self.render(
            STATUS_UPDATE,
            &StatusUpdateContext {
                mrf_number: &request.mrf_number,
                requester: request.requester_name(),
                previous_status,
                status: request.status.as_str(),
                status_notes: request.status_notes.as_deref(),
            },
        )
    }

    /// Tells the admin recipients about a newly created request.
    pub async fn notify_new_request(&self, request: &MaterialRequest, line_count: usize) -> Result<()> {
        if !self.is_enabled() || self.config.admin_recipients.is_empty() {
            tracing::debug!(mrf_number = %request.mrf_number, "Email not configured, skipping new request notification");
            return Ok(());
        }

        let email = self.render_new_request(request, line_count)?;
        for recipient in &self.config.admin_recipients {
            self.send(recipient, &email).await?;
        }
        tracing::info!(mrf_number = %request.mrf_number, "New request notification sent");
        Ok(())
    }

    pub async fn notify_status_change(
        &self,
        request: &MaterialRequest,
        previous_status: &str,
        requester_email: &str,
    ) -> Result<()> {
        if !self.is_enabled() {
            tracing::debug!(mrf_number = %request.mrf_number, "Email not configured, skipping status notification");
            return Ok(());
        }

        let email = self.render_status_update(request, previous_status)?;
        self.send(requester_email, &email).await?;
        tracing::info!(
            mrf_number = %request.mrf_number,
            status = %request.status,
            "Status change notification sent"
        );
        Ok(())
    }

    fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<RenderedEmail> {
        Ok(RenderedEmail {
            subject: self
                .templates
                .render(&format!("{}_subject", name), context)
                .with_context(|| format!("Failed to render {} subject", name))?,
            body_html: self
                .templates
                .render(&format!("{}_body", name), context)
                .with_context(|| format!("Failed to render {} body", name))?,
        })
    }

    async fn send(&self, to: &str, email: &RenderedEmail) -> Result<()> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_address)
            .parse()
            .context("Invalid from address")?;
        let to: Mailbox = to.parse().with_context(|| format!("Invalid recipient {}", to))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.body_html.clone())
            .context("Failed to build email")?;

        let credentials = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .context("Failed to create SMTP transport")?
            .port(self.config.smtp_port)
            .credentials(credentials)
            .build();

        mailer.send(message).await.context("Failed to send email")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mrf_models::{Criticality, QuotationStatus, RequestStatus, WorkflowStage};
    use uuid::Uuid;

    fn request() -> MaterialRequest {
        MaterialRequest {
            id: Uuid::new_v4(),
            mrf_number: "SAR-007-2025".into(),
            request_date: Utc::now().date_naive(),
            user_id: None,
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            user_code: "EMP-1".into(),
            designation: "Technician".into(),
            office_extension: String::new(),
            asset: "OBOB".into(),
            unit_tag: String::new(),
            discipline: "MECHANICAL".into(),
            material_category: String::new(),
            criticality: Criticality::High,
            work_order_no: String::new(),
            work_order_type: String::new(),
            reason: "Seal <replacement>".into(),
            service_material: String::new(),
            remarks: None,
            status: RequestStatus::Approved,
            status_notes: Some("PO raised".into()),
            internal_reference: None,
            action_pending: None,
            vendor_name: None,
            blanket_order_number: None,
            call_off_number: None,
            purchase_order_no: None,
            quotation_reference: None,
            quotation_status: QuotationStatus::NotSubmitted,
            quotation_approval_date: None,
            quotation_amount_usd: None,
            quotation_amount_eur: None,
            quotation_amount_ngn: None,
            estimated_delivery_date: None,
            actual_delivery_date: None,
            notes: None,
            other: None,
            workflow_stage: WorkflowStage::MrfCreated,
            approved_by_supervisor: None,
            approved_date_supervisor: None,
            supervisor_comments: None,
            approved_by_manager: None,
            approved_date_manager: None,
            manager_comments: None,
            approved_by_area_manager: None,
            approved_date_area_manager: None,
            area_manager_comments: None,
            has_blanket_order: false,
            blanket_order_ref: None,
            proforma_ref: None,
            proforma_amount_usd: None,
            proforma_amount_ngn: None,
            proforma_date: None,
            compliance_status: None,
            compliance_notes: None,
            rejection_reason: None,
            rejection_stage: None,
            rescheduled_date: None,
            reschedule_reason: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_request_template() {
        let notifier = Notifier::new(EmailConfig::default()).unwrap();
        let email = notifier.render_new_request(&request(), 3).unwrap();

        assert_eq!(email.subject, "New Material Request: SAR-007-2025");
        assert!(email.body_html.contains("Ada Obi"));
        assert!(email.body_html.contains("<strong>Line items:</strong> 3"));
        assert!(email.body_html.contains("Seal &lt;replacement&gt;"));
    }

    #[test]
    fn test_status_update_template() {
        let notifier = Notifier::new(EmailConfig::default()).unwrap();
        let email = notifier.render_status_update(&request(), "Pending").unwrap();

        assert_eq!(email.subject, "MRF SAR-007-2025 is now Approved");
        assert!(email.body_html.contains("changed from Pending to <strong>Approved</strong>"));
        assert!(email.body_html.contains("PO raised"));
    }

    #[test]
    fn test_unconfigured_notifier_skips_delivery() {
        let notifier = Notifier::new(EmailConfig::default()).unwrap();
        assert!(!notifier.is_enabled());
        tokio_test::block_on(notifier.notify_new_request(&request(), 1)).unwrap();
        tokio_test::block_on(notifier.notify_status_change(&request(), "Pending", "ada@example.com"))
            .unwrap();
    }
}
