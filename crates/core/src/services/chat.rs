//! Messages exchanged between the patient and doctor of a consultation.

use carebook_types::NonEmptyText;
use chrono::Utc;

use super::{found, ServiceContext};
use crate::auth::{Action, Actor, Parties, Role};
use crate::constants::{CHAT_MESSAGE, CONSULTATION};
use crate::models::{ChatMessage, NewChatMessage};
use crate::repositories::{Database, Page};
use crate::{CoreError, CoreResult};

#[derive(Debug)]
pub struct ChatService<D> {
    ctx: ServiceContext<D>,
}

impl<D: Database> ChatService<D> {
    pub fn new(ctx: ServiceContext<D>) -> Self {
        Self { ctx }
    }

    /// Sends a message within an open consultation.
    ///
    /// Only the consultation's patient and doctor may send; completed consultations
    /// are closed to new messages.
    pub fn send(&self, actor: &Actor, new: NewChatMessage) -> CoreResult<ChatMessage> {
        let message = NonEmptyText::new(&new.message)
            .map_err(|_| CoreError::Validation("message is required".into()))?;

        let result = self.ctx.db.transaction(|tx| {
            let consultation = found(
                tx.consultation(new.consultation_id)?,
                CONSULTATION,
                new.consultation_id,
            )?;
            let recipient_id = match actor.role {
                Role::Patient => consultation.doctor_id,
                Role::Doctor => consultation.patient_id,
                Role::Admin | Role::HomeCareProvider => {
                    return Err(CoreError::Forbidden(
                        "only consultation participants may send messages".into(),
                    ))
                }
            };
            self.ctx.authorizer.authorize(
                actor,
                Action::SendMessage,
                &Parties::of_consultation(&consultation),
            )?;
            if consultation.is_completed() {
                return Err(CoreError::InvalidState(format!(
                    "consultation {} is completed",
                    consultation.id
                )));
            }

            tx.insert_message(ChatMessage {
                id: 0,
                consultation_id: consultation.id,
                sender_id: actor.user_id,
                sender_role: actor.role,
                recipient_id,
                message,
                sent_at: Utc::now(),
                is_read: false,
            })
        });

        if let Ok(m) = &result {
            tracing::debug!(
                message_id = m.id,
                consultation_id = m.consultation_id,
                "message sent"
            );
        }
        result
    }

    /// Messages of a consultation, newest first.
    pub fn list(
        &self,
        actor: &Actor,
        consultation_id: i64,
        page: Page,
    ) -> CoreResult<Vec<ChatMessage>> {
        self.ctx.db.transaction(|tx| {
            let consultation =
                found(tx.consultation(consultation_id)?, CONSULTATION, consultation_id)?;
            self.ctx.authorizer.authorize(
                actor,
                Action::ViewMessages,
                &Parties::of_consultation(&consultation),
            )?;
            tx.messages_for(consultation_id, page)
        })
    }

    /// Marks a message read. Only its recipient may do so.
    pub fn mark_read(&self, actor: &Actor, id: i64) -> CoreResult<ChatMessage> {
        self.ctx.db.transaction(|tx| {
            let mut message = found(tx.message(id)?, CHAT_MESSAGE, id)?;
            if message.recipient_id != actor.user_id {
                return Err(CoreError::Forbidden(format!(
                    "message {id} was not sent to user {}",
                    actor.user_id
                )));
            }
            if message.is_read {
                return Ok(message);
            }
            message.is_read = true;
            tx.update_message(message)
        })
    }

    pub fn unread_count(&self, actor: &Actor) -> CoreResult<usize> {
        self.ctx
            .db
            .transaction(|tx| tx.unread_message_count(actor.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompleteConsultation, Consultation, NewConsultation};
    use crate::repositories::LocalDatabase;
    use crate::services::test_support::*;
    use crate::services::CoreServices;

    fn consultation(services: &CoreServices<LocalDatabase>) -> Consultation {
        services
            .consultations
            .start(
                &doctor(),
                NewConsultation {
                    patient_id: PATIENT,
                    doctor_id: DOCTOR_ID,
                    appointment_id: None,
                    consultation_type: "chat".into(),
                    notes: None,
                    fee: None,
                },
            )
            .expect("start should succeed")
    }

    fn say(consultation_id: i64, text: &str) -> NewChatMessage {
        NewChatMessage {
            consultation_id,
            message: text.into(),
        }
    }

    #[test]
    fn participants_exchange_messages() {
        let services = services();
        let c = consultation(&services);

        let hello = services
            .chat
            .send(&patient(), say(c.id, "hello doctor"))
            .expect("patient send should succeed");
        assert_eq!(hello.recipient_id, DOCTOR_ID);
        services
            .chat
            .send(&doctor(), say(c.id, "hello"))
            .expect("doctor send should succeed");

        assert_eq!(services.chat.unread_count(&doctor()).unwrap(), 1);
        let err = services.chat.mark_read(&patient(), hello.id).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        services.chat.mark_read(&doctor(), hello.id).unwrap();
        assert_eq!(services.chat.unread_count(&doctor()).unwrap(), 0);

        let listed = services.chat.list(&patient(), c.id, Page::all()).unwrap();
        assert_eq!(listed.len(), 2);
        let err = services
            .chat
            .list(&other_patient(), c.id, Page::all())
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn outsiders_and_empty_messages_are_rejected() {
        let services = services();
        let c = consultation(&services);
        let err = services
            .chat
            .send(&other_patient(), say(c.id, "hi"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        let err = services.chat.send(&patient(), say(c.id, "   ")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn completed_consultations_are_closed() {
        let services = services();
        let c = consultation(&services);
        services
            .consultations
            .complete(&doctor(), c.id, CompleteConsultation::default())
            .unwrap();
        let err = services.chat.send(&patient(), say(c.id, "one more thing")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }
}
