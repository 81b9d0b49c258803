//! services/api/src/bot/delivery.rs
//!
//! Streams a purchased document out of the content store and through the
//! chat channel, then records the download on the catalog item and the
//! user's history. The post-send mutations are best-effort and independently
//! logged: once the user has the file, nothing is rolled back.

use crate::bot::replies;
use bytes::BytesMut;
use chrono::Utc;
use futures::StreamExt;
use study_shelf_core::domain::{CatalogItem, DownloadEntry};
use study_shelf_core::ports::{
    CatalogStore, ChatChannel, ContentStore, PortError, PortResult, UserStore,
};
use tracing::{error, info, warn};

/// Transfer ceiling: files assembled past this size are rejected before any
/// send attempt.
pub const MAX_TRANSFER_BYTES: u64 = 50 * 1024 * 1024;

/// Delivers `item` to the user behind `channel`.
///
/// Fails without touching any counter when the content is missing or too
/// large. After a successful send the download counter, purchase/revenue
/// counters, and the user's history are each updated independently; a
/// failure in one is logged and does not undo the others (at-least-once).
pub async fn deliver(
    catalog: &dyn CatalogStore,
    users: &dyn UserStore,
    content: &dyn ContentStore,
    channel: &dyn ChatChannel,
    external_id: i64,
    item: &CatalogItem,
) -> PortResult<()> {
    let mut stream = content.open_read(item.content_ref).await?;

    let mut assembled = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let size = (assembled.len() + chunk.len()) as u64;
        if size > MAX_TRANSFER_BYTES {
            return Err(PortError::TooLarge {
                size,
                limit: MAX_TRANSFER_BYTES,
            });
        }
        assembled.extend_from_slice(&chunk);
    }

    channel
        .send_document(
            &item.file_name,
            &item.mime_type,
            &replies::delivery_caption(item),
            assembled.freeze(),
        )
        .await?;
    info!(
        "Delivered '{}' ({} bytes) to user {}",
        item.title, item.file_size_bytes, external_id
    );

    if let Err(e) = catalog.increment_download(item.id).await {
        error!(
            "Failed to increment downloads for material {}: {:?}",
            item.id, e
        );
    }

    if !item.price.is_free() {
        match item.price.amount() {
            Some(amount) => {
                if let Err(e) = catalog.record_purchase(item.id, amount).await {
                    error!(
                        "Failed to record purchase for material {}: {:?}",
                        item.id, e
                    );
                }
            }
            None => {
                warn!(
                    "Price '{}' on material {} does not parse; purchase not recorded",
                    item.price, item.id
                );
            }
        }
    }

    let entry = DownloadEntry {
        content_id: item.content_ref,
        title: item.title.clone(),
        category: item.category,
        price: item.price.clone(),
        downloaded_at: Utc::now(),
    };
    if let Err(e) = users.append_download(external_id, entry).await {
        error!(
            "Failed to append download history for user {}: {:?}",
            external_id, e
        );
    }

    Ok(())
}
