use async_trait::async_trait;
use resend_rs::{
    types::{Attachment, CreateEmailBaseOptions},
    Resend,
};
use tracing::{error, info};

use crate::error::DeliveryError;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A rendered workbook ready to be handed to a delivery sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Where finished reports and notices go. Returns an id acknowledging the send.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send(
        &self,
        destination: &str,
        document: &ReportDocument,
        summary: &str,
    ) -> Result<String, DeliveryError>;

    async fn notify(&self, destination: &str, text: &str) -> Result<String, DeliveryError>;
}

/// Delivers reports by e-mail through Resend. `destination` is a
/// comma-separated list of addresses.
#[derive(Clone)]
pub struct EmailSink {
    resend: Resend,
    from: String,
}

impl EmailSink {
    pub fn new(resend: Resend, from: impl Into<String>) -> Self {
        Self {
            resend,
            from: from.into(),
        }
    }

    async fn deliver(
        &self,
        destination: &str,
        subject: &str,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<String, DeliveryError> {
        let to = recipients(destination)?;
        info!("Preparing email '{}' for {:?}", subject, to);

        let mut email = CreateEmailBaseOptions::new(&self.from, to, subject).with_text(text);
        if let Some(attachment) = attachment {
            email = email.with_attachment(attachment);
        }

        match self.resend.emails.send(email).await {
            Ok(response) => {
                info!("Email sent successfully with ID: {}", response.id);
                Ok(response.id.to_string())
            }
            Err(e) => {
                error!("Failed to send email: {}", e);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl DeliverySink for EmailSink {
    async fn send(
        &self,
        destination: &str,
        document: &ReportDocument,
        summary: &str,
    ) -> Result<String, DeliveryError> {
        let subject = summary.lines().next().unwrap_or("Monthly worklog report");
        info!(
            "Report attachment {} size: {} bytes",
            document.file_name,
            document.bytes.len()
        );

        let attachment = Attachment::from_content(document.bytes.clone())
            .with_filename(document.file_name.as_str())
            .with_content_type(XLSX_CONTENT_TYPE);

        self.deliver(destination, subject, summary, Some(attachment))
            .await
    }

    async fn notify(&self, destination: &str, text: &str) -> Result<String, DeliveryError> {
        info!("Sending notice email");
        self.deliver(destination, "Worklog report service notice", text, None)
            .await
    }
}

fn recipients(destination: &str) -> Result<Vec<String>, DeliveryError> {
    let to: Vec<String> = destination
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect();

    if to.is_empty() {
        return Err(DeliveryError::NoRecipient);
    }
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_splits_into_addresses() {
        assert_eq!(
            recipients("a@example.com, b@example.com,").unwrap(),
            vec!["a@example.com".to_string(), "b@example.com".to_string()]
        );
        assert!(matches!(recipients(" , "), Err(DeliveryError::NoRecipient)));
    }

    #[tokio::test]
    async fn empty_destination_fails_before_sending() {
        let sink = EmailSink::new(Resend::new("re_test_key"), "reports@example.com");
        let err = sink.notify("", "hello").await.unwrap_err();
        assert!(matches!(err, DeliveryError::NoRecipient));
    }
}
