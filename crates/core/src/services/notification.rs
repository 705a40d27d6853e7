//! In-app notifications.
//!
//! Lifecycle services call [`record`] inside their own transaction, so a notification
//! exists exactly when the transition that raised it was committed.

use chrono::Utc;

use super::{found, ServiceContext};
use crate::auth::Actor;
use crate::constants::NOTIFICATION;
use crate::models::{Notification, NotificationKind};
use crate::repositories::{Database, Page, Repositories};
use crate::{CoreError, CoreResult};

/// Writes a notification for `user_id` as part of the caller's transaction.
pub(crate) fn record(
    tx: &mut dyn Repositories,
    user_id: i64,
    kind: NotificationKind,
    message: impl Into<String>,
) -> CoreResult<Notification> {
    tx.insert_notification(Notification {
        id: 0,
        user_id,
        kind,
        message: message.into(),
        is_read: false,
        created_at: Utc::now(),
    })
}

#[derive(Debug)]
pub struct NotificationService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> NotificationService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// The acting user's notifications, newest first.
    pub fn list(&self, actor: &Actor, page: Page) -> CoreResult<Vec<Notification>> {
        self.ctx
            .db
            .transaction(|tx| tx.notifications_for(actor.user_id, page))
    }

    pub fn unread_count(&self, actor: &Actor) -> CoreResult<usize> {
        self.ctx
            .db
            .transaction(|tx| tx.unread_notification_count(actor.user_id))
    }

    /// Marks one of the actor's own notifications as read.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Forbidden` when the notification belongs to
    /// someone else (admins included).
    pub fn mark_read(&self, actor: &Actor, id: i64) -> CoreResult<Notification> {
        self.ctx.db.transaction(|tx| {
            let mut notification = found(tx.notification(id)?, NOTIFICATION, id)?;
            if notification.user_id != actor.user_id {
                return Err(CoreError::Forbidden(format!(
                    "notification {id} belongs to another user"
                )));
            }
            if notification.is_read {
                return Ok(notification);
            }
            notification.is_read = true;
            tx.update_notification(notification)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    #[test]
    fn notifications_are_scoped_to_their_owner() {
        let services = services();
        let note = services
            .notifications
            .ctx
            .db
            .transaction(|tx| record(tx, PATIENT, NotificationKind::AppointmentCreated, "booked"))
            .expect("record should succeed");

        assert_eq!(services.notifications.unread_count(&patient()).unwrap(), 1);
        assert_eq!(
            services.notifications.unread_count(&other_patient()).unwrap(),
            0
        );

        let err = services
            .notifications
            .mark_read(&other_patient(), note.id)
            .expect_err("foreign notification");
        assert!(matches!(err, CoreError::Forbidden(_)));

        let read = services
            .notifications
            .mark_read(&patient(), note.id)
            .expect("mark read should succeed");
        assert!(read.is_read);
        assert_eq!(services.notifications.unread_count(&patient()).unwrap(), 0);
        assert_eq!(
            services
                .notifications
                .list(&patient(), Page::all())
                .unwrap()
                .len(),
            1
        );
    }
}
