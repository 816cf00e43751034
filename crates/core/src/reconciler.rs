//! Moves open pre-postings forward from carrier tracking events.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::carrier::{Carrier, TrackingEvent};
use crate::metrics;
use crate::preposting::{PrePosting, PrePostingError, PrePostingStatus, PrePostingStore, StatusUpdate};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Pre-postings checked.
    pub scanned: usize,
    pub updated: usize,
    /// Tracking lookups that failed and were skipped.
    pub failed: usize,
}

const DELIVERED_EVENT: &str = "BDE";
const RETURNED_EVENT: &str = "BDI";

/// True when `text` reports `phrase` as done.
fn affirms(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(at, _)| {
        let before = text[..at].trim_end();
        !(before.ends_with("não") || before.ends_with("nao"))
    })
}

fn denies(text: &str, phrase: &str) -> bool {
    text.contains(&format!("não {}", phrase)) || text.contains(&format!("nao {}", phrase))
}

/// Matches on the event type, falling back to the description. A negated
/// description ("não entregue") overrides both.
fn reports(event: &TrackingEvent, code: &str, description: &str, phrase: &str) -> bool {
    if denies(description, phrase) {
        return false;
    }
    event.event_type == code || affirms(description, phrase)
}

/// The status the latest tracking event implies, if it changes anything.
pub fn classify(posting: &PrePosting, latest: &TrackingEvent) -> Option<StatusUpdate> {
    let description = latest.description.to_lowercase();
    let current = posting.status;

    let (status, posted_at, delivered_at) =
        if reports(latest, DELIVERED_EVENT, &description, "entregue") {
            (PrePostingStatus::Delivered, None, latest.occurred_at)
        } else if reports(latest, RETURNED_EVENT, &description, "devolvido") {
            (PrePostingStatus::ReturnedToSender, None, None)
        } else if affirms(&description, "postado") {
            // Never step back from in transit.
            if !matches!(current, PrePostingStatus::Generated | PrePostingStatus::Posted) {
                return None;
            }
            (PrePostingStatus::Posted, latest.occurred_at, None)
        } else if matches!(current, PrePostingStatus::Generated | PrePostingStatus::Posted) {
            (PrePostingStatus::InTransit, None, None)
        } else {
            return None;
        };

    let unchanged = status == current
        && (posted_at.is_none() || posted_at == posting.posted_at)
        && (delivered_at.is_none() || delivered_at == posting.delivered_at);
    if unchanged {
        return None;
    }

    Some(StatusUpdate {
        id: posting.id,
        status,
        posted_at,
        delivered_at,
    })
}

/// Reconciles pre-posting status against carrier tracking.
pub struct StatusReconciler {
    store: Arc<dyn PrePostingStore>,
    carrier: Arc<dyn Carrier>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn PrePostingStore>, carrier: Arc<dyn Carrier>) -> Self {
        Self { store, carrier }
    }

    /// Track every open pre-posting and apply the resulting changes in one
    /// batch. A failed lookup skips that pre-posting only.
    pub async fn reconcile_all(&self) -> Result<ReconcileSummary, PrePostingError> {
        let open = self.store.list_open()?;
        let mut summary = ReconcileSummary {
            scanned: open.len(),
            ..Default::default()
        };
        let mut updates = Vec::new();

        for posting in &open {
            let Some(code) = posting.tracking_code.as_deref() else {
                continue;
            };

            let result = self.carrier.track(code).await;
            if result.error {
                summary.failed += 1;
                metrics::RECONCILE_FAILURES.inc();
                warn!(
                    pre_posting_id = posting.id,
                    tracking_code = %code,
                    message = ?result.message,
                    "Tracking failed, skipping"
                );
                continue;
            }

            let Some(latest) = result.latest() else {
                debug!(pre_posting_id = posting.id, tracking_code = %code, "No tracking events yet");
                continue;
            };

            if let Some(update) = classify(posting, latest) {
                debug!(
                    pre_posting_id = posting.id,
                    tracking_code = %code,
                    from = posting.status.as_str(),
                    to = update.status.as_str(),
                    "Status change"
                );
                updates.push(update);
            }
        }

        summary.updated = self.store.apply_status_updates(&updates)?;
        for update in &updates {
            metrics::RECONCILE_UPDATES
                .with_label_values(&[update.status.as_str()])
                .inc();
        }

        info!(
            scanned = summary.scanned,
            updated = summary.updated,
            failed = summary.failed,
            "Pre-posting reconciliation finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::carrier::Package;
    use crate::preposting::{NewPrePosting, SqlitePrePostingStore};
    use crate::testing::{fixtures, MockCarrier};

    fn posting_with(status: PrePostingStatus) -> PrePosting {
        PrePosting {
            id: 1,
            order_id: 1001,
            carrier_id: Some("PP1".to_string()),
            tracking_code: Some("AA1BR".to_string()),
            label_number: None,
            service_code: "03220".to_string(),
            service_name: "SEDEX".to_string(),
            weight_kg: Package::default().weight_kg,
            height_cm: 5,
            width_cm: 15,
            length_cm: 20,
            declared_value: None,
            status,
            created_at: Utc::now(),
            posted_at: None,
            delivered_at: None,
            posting_deadline: None,
            notes: None,
            error_message: None,
            carrier_response: None,
        }
    }

    #[test]
    fn test_delivered_by_code_or_text() {
        let posting = posting_with(PrePostingStatus::InTransit);
        let mut event = fixtures::tracking_event("BDE", "Objeto entregue ao destinatario");
        event.occurred_at = Some(Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap());

        let update = classify(&posting, &event).unwrap();
        assert_eq!(update.status, PrePostingStatus::Delivered);
        assert_eq!(update.delivered_at, event.occurred_at);

        let by_text = fixtures::tracking_event("XYZ", "Objeto Entregue");
        assert_eq!(
            classify(&posting, &by_text).unwrap().status,
            PrePostingStatus::Delivered
        );
    }

    #[test]
    fn test_failed_delivery_is_not_delivered() {
        let in_transit = posting_with(PrePostingStatus::InTransit);
        let absent = fixtures::tracking_event("LDE", "Objeto não entregue - carteiro não atendido");
        assert!(classify(&in_transit, &absent).is_none());

        // Failed attempts share the delivery event type
        let attempt = fixtures::tracking_event("BDE", "Objeto NÃO entregue - endereço incorreto");
        assert!(classify(&in_transit, &attempt).is_none());

        let unaccented = fixtures::tracking_event("BDR", "Objeto nao entregue - destinatario ausente");
        assert!(classify(&in_transit, &unaccented).is_none());

        let update = classify(&posting_with(PrePostingStatus::Posted), &absent).unwrap();
        assert_eq!(update.status, PrePostingStatus::InTransit);
        assert!(update.delivered_at.is_none());
    }

    #[test]
    fn test_returned_to_sender() {
        let posting = posting_with(PrePostingStatus::InTransit);
        let event = fixtures::tracking_event("BDI", "Objeto devolvido ao remetente");
        assert_eq!(
            classify(&posting, &event).unwrap().status,
            PrePostingStatus::ReturnedToSender
        );

        let kept = fixtures::tracking_event("FC", "Objeto não devolvido - aguardando retirada");
        assert!(classify(&posting, &kept).is_none());
    }

    #[test]
    fn test_posted_only_from_early_states() {
        let event = fixtures::tracking_event("PO", "Objeto postado");

        let update = classify(&posting_with(PrePostingStatus::Generated), &event).unwrap();
        assert_eq!(update.status, PrePostingStatus::Posted);
        assert!(update.posted_at.is_some());

        assert!(classify(&posting_with(PrePostingStatus::InTransit), &event).is_none());
    }

    #[test]
    fn test_other_events_mean_in_transit() {
        let event = fixtures::tracking_event("RO", "Objeto em transferencia");
        assert_eq!(
            classify(&posting_with(PrePostingStatus::Posted), &event)
                .unwrap()
                .status,
            PrePostingStatus::InTransit
        );
        assert!(classify(&posting_with(PrePostingStatus::InTransit), &event).is_none());
    }

    fn insert(store: &SqlitePrePostingStore, order_id: i64, tracking: &str) -> i64 {
        store
            .insert(&NewPrePosting {
                order_id,
                carrier_id: Some(format!("PP{}", order_id)),
                tracking_code: Some(tracking.to_string()),
                label_number: None,
                service_code: "03220".to_string(),
                service_name: "SEDEX".to_string(),
                package: Package::default(),
                declared_value: None,
                status: PrePostingStatus::Generated,
                posting_deadline: None,
                notes: None,
                carrier_response: None,
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_reconcile_all_applies_updates_and_skips_failures() {
        let store = Arc::new(SqlitePrePostingStore::in_memory().unwrap());
        let carrier = Arc::new(MockCarrier::new());

        let delivered = insert(&store, 1, "AA000000001BR");
        let moving = insert(&store, 2, "AA000000002BR");
        let unknown = insert(&store, 3, "AA000000003BR");

        carrier
            .set_tracking(fixtures::tracking_result(
                "AA000000001BR",
                &[("BDE", "Objeto entregue ao destinatario"), ("RO", "Em transito")],
            ))
            .await;
        carrier
            .set_tracking(fixtures::tracking_result(
                "AA000000002BR",
                &[("RO", "Objeto em transferencia")],
            ))
            .await;

        let reconciler = StatusReconciler::new(store.clone(), carrier.clone());
        let summary = reconciler.reconcile_all().await.unwrap();

        assert_eq!(
            summary,
            ReconcileSummary {
                scanned: 3,
                updated: 2,
                failed: 1,
            }
        );
        assert_eq!(
            store.get(delivered).unwrap().unwrap().status,
            PrePostingStatus::Delivered
        );
        assert!(store.get(delivered).unwrap().unwrap().delivered_at.is_some());
        assert_eq!(
            store.get(moving).unwrap().unwrap().status,
            PrePostingStatus::InTransit
        );
        assert_eq!(
            store.get(unknown).unwrap().unwrap().status,
            PrePostingStatus::Generated
        );

        // Delivered postings drop out of the next pass
        let again = reconciler.reconcile_all().await.unwrap();
        assert_eq!(again.scanned, 2);
        assert_eq!(again.updated, 0);
    }
}
