use std::future::Future;

use tracing::info;

use crate::error::Result;
use crate::fmt;
use crate::models::{AccountPool, Flow, Transaction};

/// One notification-worthy transaction, ready for whatever presentation
/// layer consumes it. Delivery (chat message, embed, webhook) lives outside
/// this crate.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub transaction: Transaction,
    /// Derived vendor label; also the cooldown key.
    pub vendor: String,
    pub account_name: String,
    pub account_pool: AccountPool,
}

pub trait Notifier {
    fn notify(&self, event: &NotificationEvent) -> impl Future<Output = Result<()>> + Send;
}

/// Emits events to the structured log. The daemon's default sink; also the
/// fallback when no chat frontend is wired up.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NotificationEvent) -> impl Future<Output = Result<()>> + Send {
        let action = match event.transaction.flow() {
            Flow::Credit => "received",
            Flow::Debit => "spent",
        };
        info!(
            target: "bursar::notifications",
            vendor = %event.vendor,
            account = %event.account_name,
            pool = %event.account_pool,
            amount = %fmt::money(event.transaction.amount.abs()),
            category = event.transaction.category_label(),
            date = %fmt::short_datetime(&event.transaction.created_at),
            txn = %event.transaction.id,
            "{action} {}",
            fmt::money(event.transaction.amount.abs()),
        );
        async { Ok(()) }
    }
}
