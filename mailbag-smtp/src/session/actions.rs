use mailbag_common::{error::SessionError, internal};
use mailbag_store::MailStore;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Flow, Session};
use crate::{
    envelope::Envelope,
    reply::Reply,
    state::{Action, Delivery, Event, Lookup},
};

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    pub(super) async fn perform(&mut self, action: Action) -> Result<Flow, SessionError> {
        match action {
            Action::Reply(reply) => {
                self.reply(&reply).await?;
                Ok(Flow::Continue)
            }
            Action::Absorb => Ok(Flow::Continue),
            Action::VerifyRecipient(recipient) => {
                let lookup = match self.store.user_exists(&recipient).await {
                    Ok(true) => Lookup::Found,
                    Ok(false) => Lookup::Missing,
                    Err(err) => {
                        internal!(level = ERROR, "Verifying recipient {recipient} failed: {err}");
                        Lookup::Failed
                    }
                };

                Ok(Flow::Feed(Event::RecipientChecked { recipient, lookup }))
            }
            Action::Deliver { envelope, content } => {
                let delivery = deliver(self.store.as_ref(), &envelope, &content).await;
                Ok(Flow::Feed(Event::Delivered(delivery)))
            }
            Action::Quit => {
                self.reply(&Reply::goodbye()).await?;
                Ok(Flow::Close)
            }
        }
    }
}

async fn deliver(store: &dyn MailStore, envelope: &Envelope, content: &[u8]) -> Delivery {
    match store.deliver(envelope.recipients(), content).await {
        Ok(id) => {
            internal!(
                level = INFO,
                "Accepted message {id} ({} bytes) from {} for {}",
                content.len(),
                envelope.sender(),
                envelope.recipients().join(", ")
            );
            Delivery::Stored
        }
        Err(err) => {
            internal!(level = ERROR, "Delivery from {} failed: {err}", envelope.sender());
            Delivery::Failed
        }
    }
}
