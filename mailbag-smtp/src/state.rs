//! The submission session state machine.
//!
//! Commands walk a [`Phase`] through HELO, MAIL, RCPT and DATA. Once DATA is
//! accepted every line is body content until the end-of-data line. Recipient
//! checks and delivery need the store, so they are handed out as an
//! [`Action`] and their outcome comes back as an [`Event`].

use mailbag_common::{config::DEFAULT_MAX_MESSAGE_SIZE, error::CommandError, traits::FiniteStateMachine};

use crate::{
    command::Command,
    envelope::{Body, END_OF_DATA, Envelope},
    reply::Reply,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Greeted,
    SenderSet(Envelope),
    /// At least one recipient was accepted
    RecipientSet(Envelope),
    ReceivingData { envelope: Envelope, body: Body },
    /// End of data seen, waiting for the store
    Delivering,
    Done,
    Closed,
}

/// Phase of the session plus the body size it enforces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    phase: Phase,
    max_message_size: usize,
}

impl Default for State {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

/// Result of checking a recipient against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    Missing,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Stored,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    /// A raw line received while in [`Phase::ReceivingData`]
    BodyLine(Vec<u8>),
    /// More of a body line too long to arrive in one read; never ends the body
    BodyContinuation(Vec<u8>),
    RecipientChecked { recipient: String, lookup: Lookup },
    Delivered(Delivery),
}

impl From<Command> for Event {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply(Reply),
    /// A body line was stored; nothing is sent
    Absorb,
    /// Does the recipient exist; answer with [`Event::RecipientChecked`]
    VerifyRecipient(String),
    /// Hand the message to the store; answer with [`Event::Delivered`]
    Deliver { envelope: Envelope, content: Vec<u8> },
    /// Say goodbye and end the session
    Quit,
}

impl From<CommandError> for Action {
    fn from(error: CommandError) -> Self {
        Self::Reply(Reply::from(error))
    }
}

impl State {
    #[must_use]
    pub const fn new(max_message_size: usize) -> Self {
        Self {
            phase: Phase::Initial,
            max_message_size,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Whether input lines are body content rather than commands
    #[must_use]
    pub const fn is_receiving(&self) -> bool {
        matches!(self.phase, Phase::ReceivingData { .. })
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }
}

impl Phase {
    fn command(self, command: Command) -> (Self, Action) {
        match (self, command) {
            (state @ Self::ReceivingData { .. }, _) => (state, CommandError::Sequence.into()),

            (state, Command::Malformed { error, .. }) => (state, CommandError::from(error).into()),
            (_, Command::Quit) => (Self::Closed, Action::Quit),
            (state, Command::Noop) => (state, Action::Reply(Reply::ok())),
            (state, Command::NotImplemented(_)) => (state, CommandError::NotImplemented.into()),
            (state, Command::Unrecognized(_)) => (state, CommandError::Unrecognized.into()),

            (Self::Initial, Command::Helo(domain)) => {
                (Self::Greeted, Action::Reply(Reply::hello(&domain)))
            }
            (Self::Greeted, Command::MailFrom(sender)) => (
                Self::SenderSet(Envelope::new(sender)),
                Action::Reply(Reply::ok()),
            ),
            (state @ (Self::SenderSet(_) | Self::RecipientSet(_)), Command::RcptTo(recipient)) => {
                (state, Action::VerifyRecipient(recipient))
            }
            (Self::RecipientSet(envelope), Command::Data) => (
                Self::ReceivingData {
                    envelope,
                    body: Body::default(),
                },
                Action::Reply(Reply::start_mail_input()),
            ),

            (state, _) => (state, CommandError::Sequence.into()),
        }
    }

    fn body_line(self, line: &[u8], continuation: bool, limit: usize) -> (Self, Action) {
        let (envelope, mut body) = match self {
            Self::ReceivingData { envelope, body } => (envelope, body),
            state => return (state, CommandError::Sequence.into()),
        };

        if !continuation && line == END_OF_DATA {
            return (
                Self::Delivering,
                Action::Deliver {
                    envelope,
                    content: body.into_content(),
                },
            );
        }

        let appended = if continuation {
            body.extend(line, limit)
        } else {
            body.append(line, limit)
        };

        let action = match appended {
            Ok(()) => Action::Absorb,
            Err(err) => err.into(),
        };

        (Self::ReceivingData { envelope, body }, action)
    }

    fn recipient_checked(self, recipient: String, lookup: Lookup) -> (Self, Action) {
        let (mut envelope, rebuild): (Envelope, fn(Envelope) -> Self) = match self {
            Self::SenderSet(envelope) => (envelope, Self::SenderSet),
            Self::RecipientSet(envelope) => (envelope, Self::RecipientSet),
            state => return (state, CommandError::Sequence.into()),
        };

        match lookup {
            Lookup::Found => {
                envelope.add_recipient(recipient);
                (Self::RecipientSet(envelope), Action::Reply(Reply::ok()))
            }
            Lookup::Missing => (rebuild(envelope), CommandError::UnknownUser(recipient).into()),
            Lookup::Failed => (
                rebuild(envelope),
                CommandError::Storage("verify recipient".to_string()).into(),
            ),
        }
    }
}

impl FiniteStateMachine for State {
    type Input = Event;
    type Action = Action;

    fn transition(self, input: Event) -> (Self, Action) {
        let Self {
            phase,
            max_message_size,
        } = self;

        let (phase, action) = match (phase, input) {
            (phase, Event::Command(command)) => phase.command(command),
            (phase, Event::BodyLine(line)) => phase.body_line(&line, false, max_message_size),
            (phase, Event::BodyContinuation(chunk)) => {
                phase.body_line(&chunk, true, max_message_size)
            }
            (phase, Event::RecipientChecked { recipient, lookup }) => {
                phase.recipient_checked(recipient, lookup)
            }
            (Phase::Delivering, Event::Delivered(Delivery::Stored)) => {
                (Phase::Done, Action::Reply(Reply::ok()))
            }
            (Phase::Delivering, Event::Delivered(Delivery::Failed)) => (
                Phase::Done,
                CommandError::Storage("deliver message".to_string()).into(),
            ),
            (phase, Event::Delivered(_)) => (phase, CommandError::Sequence.into()),
        };

        (
            Self {
                phase,
                max_message_size,
            },
            action,
        )
    }
}

#[cfg(test)]
mod tests {
    use mailbag_common::{error::CommandError, line::SyntaxError, traits::FiniteStateMachine};
    use pretty_assertions::assert_eq;

    use super::{Action, Delivery, Event, Lookup, Phase, State};
    use crate::{command::Command, envelope::Envelope, reply::Reply};

    fn sequence() -> Action {
        Action::Reply(Reply::from(CommandError::Sequence))
    }

    fn feed(state: State, events: impl IntoIterator<Item = Event>) -> (State, Vec<Action>) {
        events
            .into_iter()
            .fold((state, Vec::new()), |(state, mut actions), event| {
                let (state, action) = state.transition(event);
                actions.push(action);
                (state, actions)
            })
    }

    fn with_recipient(limit: usize) -> State {
        let (state, _) = feed(
            State::new(limit),
            [
                Command::Helo("a.com".to_string()).into(),
                Command::MailFrom("bob@a.com".to_string()).into(),
                Command::RcptTo("alice@b.com".to_string()).into(),
                Event::RecipientChecked {
                    recipient: "alice@b.com".to_string(),
                    lookup: Lookup::Found,
                },
            ],
        );
        state
    }

    fn envelope() -> Envelope {
        let mut envelope = Envelope::new("bob@a.com".to_string());
        envelope.add_recipient("alice@b.com".to_string());
        envelope
    }

    #[test]
    fn envelope_then_data() {
        let (state, actions) = feed(
            State::default(),
            [
                Command::Helo("a.com".to_string()).into(),
                Command::MailFrom("bob@a.com".to_string()).into(),
                Command::RcptTo("alice@b.com".to_string()).into(),
                Event::RecipientChecked {
                    recipient: "alice@b.com".to_string(),
                    lookup: Lookup::Found,
                },
                Command::Data.into(),
            ],
        );

        assert_eq!(
            actions,
            [
                Action::Reply(Reply::hello("a.com")),
                Action::Reply(Reply::ok()),
                Action::VerifyRecipient("alice@b.com".to_string()),
                Action::Reply(Reply::ok()),
                Action::Reply(Reply::start_mail_input()),
            ]
        );
        assert!(state.is_receiving());
    }

    #[test]
    fn out_of_order_commands_leave_envelope_alone() {
        for (state, command) in [
            (State::default(), Command::MailFrom("bob@a.com".to_string())),
            (State::default(), Command::RcptTo("alice@b.com".to_string())),
            (State::default(), Command::Data),
        ] {
            let (next, action) = state.clone().transition(command.into());
            assert_eq!(next, state);
            assert_eq!(action, sequence());
        }

        let (greeted, _) = State::default().transition(Command::Helo("a.com".to_string()).into());
        for command in [
            Command::Helo("again.com".to_string()),
            Command::RcptTo("alice@b.com".to_string()),
            Command::Data,
        ] {
            let (next, action) = greeted.clone().transition(command.into());
            assert_eq!(next, greeted);
            assert_eq!(action, sequence());
        }

        let (sender, _) = greeted.transition(Command::MailFrom("bob@a.com".to_string()).into());
        for command in [Command::MailFrom("eve@a.com".to_string()), Command::Data] {
            let (next, action) = sender.clone().transition(command.into());
            assert_eq!(next, sender);
            assert_eq!(action, sequence());
        }
    }

    #[test]
    fn unknown_recipient_keeps_envelope() {
        let state = with_recipient(100);
        let (next, action) = state.clone().transition(Event::RecipientChecked {
            recipient: "eve@b.com".to_string(),
            lookup: Lookup::Missing,
        });

        assert_eq!(next, state);
        assert_eq!(
            action,
            Action::Reply(Reply::from(CommandError::UnknownUser("eve@b.com".to_string())))
        );
    }

    #[test]
    fn missing_first_recipient_stays_sender_set() {
        let (state, _) = feed(
            State::default(),
            [
                Command::Helo("a.com".to_string()).into(),
                Command::MailFrom("bob@a.com".to_string()).into(),
            ],
        );

        let (next, _) = state.clone().transition(Event::RecipientChecked {
            recipient: "eve@b.com".to_string(),
            lookup: Lookup::Failed,
        });
        assert_eq!(next, state);

        let (_, action) = next.transition(Command::Data.into());
        assert_eq!(action, sequence());
    }

    #[test]
    fn body_is_collected_until_end_of_data() {
        let (state, actions) = feed(
            with_recipient(100),
            [
                Command::Data.into(),
                Event::BodyLine(b"Subject: hi\r\n".to_vec()),
                Event::BodyLine(b"\r\n".to_vec()),
                Event::BodyLine(b"QUIT\r\n".to_vec()),
                Event::BodyLine(b"..\r\n".to_vec()),
                Event::BodyLine(b".\r\n".to_vec()),
            ],
        );

        assert_eq!(
            &actions[1..],
            [
                Action::Absorb,
                Action::Absorb,
                Action::Absorb,
                Action::Absorb,
                Action::Deliver {
                    envelope: envelope(),
                    content: b"Subject: hi\r\n\r\nQUIT\r\n.\r\n".to_vec(),
                },
            ]
        );
        assert_eq!(state.phase(), &Phase::Delivering);

        let (state, action) = state.transition(Event::Delivered(Delivery::Stored));
        assert_eq!(state.phase(), &Phase::Done);
        assert_eq!(action, Action::Reply(Reply::ok()));

        let (_, action) = state.transition(Command::MailFrom("bob@a.com".to_string()).into());
        assert_eq!(action, sequence());
    }

    #[test]
    fn oversized_body_keeps_waiting_for_end_of_data() {
        let capacity = Action::Reply(Reply::from(CommandError::Capacity { limit: 8 }));
        let (state, actions) = feed(
            with_recipient(8),
            [
                Command::Data.into(),
                Event::BodyLine(b"1234\r\n".to_vec()),
                Event::BodyLine(b"56789\r\n".to_vec()),
                Event::BodyLine(b"x\n".to_vec()),
                Event::BodyLine(b".\r\n".to_vec()),
            ],
        );

        assert_eq!(
            &actions[1..],
            [
                Action::Absorb,
                capacity.clone(),
                capacity,
                Action::Deliver {
                    envelope: envelope(),
                    content: b"1234\r\n".to_vec(),
                },
            ]
        );
        assert_eq!(state.phase(), &Phase::Delivering);
    }

    #[test]
    fn failed_delivery() {
        let (state, actions) = feed(
            with_recipient(100),
            [
                Command::Data.into(),
                Event::BodyLine(b".\r\n".to_vec()),
                Event::Delivered(Delivery::Failed),
            ],
        );

        assert_eq!(state.phase(), &Phase::Done);
        assert_eq!(
            actions.last(),
            Some(&Action::Reply(Reply::from(CommandError::Storage(
                "deliver message".to_string()
            ))))
        );
    }

    #[test]
    fn syntax_wins_over_sequence() {
        let (state, action) = State::default().transition(
            Command::Malformed {
                verb: "MAIL",
                error: SyntaxError::MissingPrefix(" FROM:<"),
            }
            .into(),
        );

        assert_eq!(state, State::default());
        assert_eq!(
            action,
            Action::Reply(Reply::from(CommandError::Syntax(SyntaxError::MissingPrefix(
                " FROM:<"
            ))))
        );
    }

    #[test]
    fn noop_and_quit_anywhere() {
        for state in [State::default(), with_recipient(10)] {
            let (next, action) = state.clone().transition(Command::Noop.into());
            assert_eq!(next, state);
            assert_eq!(action, Action::Reply(Reply::ok()));

            let (next, action) = state.transition(Command::Quit.into());
            assert!(next.is_closed());
            assert_eq!(action, Action::Quit);
        }
    }

    #[test]
    fn unsupported_anywhere() {
        let state = with_recipient(10);

        let (next, action) = state.clone().transition(Command::NotImplemented("RSET").into());
        assert_eq!(next, state);
        assert_eq!(action, Action::Reply(Reply::from(CommandError::NotImplemented)));

        let (next, action) = state
            .clone()
            .transition(Command::Unrecognized("TURN".to_string()).into());
        assert_eq!(next, state);
        assert_eq!(action, Action::Reply(Reply::from(CommandError::Unrecognized)));
    }
}
