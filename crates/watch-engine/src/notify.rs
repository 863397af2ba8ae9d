use std::sync::Mutex;

use thiserror::Error;
use tracing::info;

use model::ChangeReport;

/// Failure reported by a delivery sink. The engine only logs these; a
/// broken sink never blocks the pipeline or rolls back the notification
/// record.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink could not deliver the message
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// The delivery sink the engine hands finished payloads to. Concrete
/// sinks live outside the core; tests substitute [`RecordingNotifier`].
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one watch's change report to its owner.
    async fn deliver_change(&self, user_id: &str, report: &ChangeReport)
    -> Result<(), NotifyError>;

    /// Deliver an operator-facing message to a channel.
    async fn deliver_summary(&self, channel_id: &str, message: &str) -> Result<(), NotifyError>;
}

/// Render one change report as the message text a sink would send. Caps
/// the per-section listings so a big campground flipping over does not
/// produce a wall of lines.
pub fn render_change_message(report: &ChangeReport) -> String {
    const MAX_LISTED: usize = 8;

    let watch = &report.watch;
    let mut message = format!(
        "{} ({} to {}): {} newly available, {} newly booked; {} currently bookable in your window",
        watch.campground_id,
        watch.checkin.format("%b %d, %Y"),
        watch.checkout.format("%b %d, %Y"),
        report.newly_available.len(),
        report.newly_booked.len(),
        report.current_available.len(),
    );

    for (label, sites) in [
        ("newly available", &report.newly_available),
        ("newly booked", &report.newly_booked),
    ] {
        if sites.is_empty() {
            continue;
        }
        message.push_str(&format!("\n{label}:"));
        for site in sites.iter().take(MAX_LISTED) {
            message.push_str(&format!(
                "\n  site {} on {}",
                site.campsite_id,
                site.date.format("%b %d")
            ));
        }
        if sites.len() > MAX_LISTED {
            message.push_str(&format!("\n  ... and {} more", sites.len() - MAX_LISTED));
        }
    }

    message
}

/// Sink that writes deliveries to the log. The default when no real
/// delivery integration is wired up.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver_change(
        &self,
        user_id: &str,
        report: &ChangeReport,
    ) -> Result<(), NotifyError> {
        info!(
            user_id,
            watch_id = report.watch.id,
            message = %render_change_message(report),
            "availability change"
        );
        Ok(())
    }

    async fn deliver_summary(&self, channel_id: &str, message: &str) -> Result<(), NotifyError> {
        info!(channel_id, message, "operator summary");
        Ok(())
    }
}

/// Sink that records every delivery in memory. Test double.
#[derive(Default)]
pub struct RecordingNotifier {
    /// Change reports delivered, in order, with the receiving user
    pub changes: Mutex<Vec<(String, ChangeReport)>>,
    /// Summary messages delivered, in order, with their channel
    pub summaries: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver_change(
        &self,
        user_id: &str,
        report: &ChangeReport,
    ) -> Result<(), NotifyError> {
        self.changes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((user_id.to_string(), report.clone()));
        Ok(())
    }

    async fn deliver_summary(&self, channel_id: &str, message: &str) -> Result<(), NotifyError> {
        self.summaries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((channel_id.to_string(), message.to_string()));
        Ok(())
    }
}
