//! The retrieval session state machine.
//!
//! [`State::transition`] decides what a command means in the current state
//! without touching storage. Anything that needs the store is handed back as
//! an [`Action`]; the session performs it and feeds the outcome back in as an
//! [`Event`], so every state change still goes through `transition`.

use mailbag_common::{error::CommandError, traits::FiniteStateMachine};

use crate::{
    command::{Command, MessageNumber, Password},
    reply::Reply,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Unauthenticated,
    /// A valid USER was given
    UserKnown(String),
    /// Authenticated with the maildrop open
    Transaction {
        user: String,
        /// Messages in the maildrop when it was opened
        snapshot: usize,
    },
    Closed,
}

/// Result of checking a USER name against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    Missing,
    Failed,
}

/// Result of a PASS attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Login {
    Opened { snapshot: usize },
    Rejected,
    Locked,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    UserChecked { user: String, lookup: Lookup },
    LoggedIn(Login),
}

impl From<Command> for Event {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

/// Work the session has to carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply(Reply),
    /// Does the user exist; answer with [`Event::UserChecked`]
    LookupUser(String),
    /// Check credentials and open the maildrop; answer with
    /// [`Event::LoggedIn`]
    Authenticate { user: String, password: Password },
    Stat,
    ListAll,
    ListOne { number: MessageNumber, index: usize },
    Retrieve { number: MessageNumber, index: usize },
    Delete { number: MessageNumber, index: usize },
    Reset,
    /// Release the maildrop, expunging deleted messages, and end the session
    Quit,
}

impl From<CommandError> for Action {
    fn from(error: CommandError) -> Self {
        Self::Reply(Reply::from(error))
    }
}

impl State {
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    fn command(self, command: Command) -> (Self, Action) {
        match (self, command) {
            (state, Command::Malformed { error, .. }) => (state, CommandError::from(error).into()),
            (_, Command::Quit) => (Self::Closed, Action::Quit),
            (state, Command::NotImplemented(_)) => (state, CommandError::NotImplemented.into()),
            (state, Command::Unrecognized(_)) => (state, CommandError::Unrecognized.into()),

            (Self::Unauthenticated, Command::User(user)) => {
                (Self::Unauthenticated, Action::LookupUser(user))
            }
            (Self::UserKnown(user), Command::Pass(password)) => (
                Self::UserKnown(user.clone()),
                Action::Authenticate { user, password },
            ),

            (state @ Self::Transaction { .. }, command) => state.transaction(command),

            (state, _) => (state, CommandError::Sequence.into()),
        }
    }

    fn transaction(self, command: Command) -> (Self, Action) {
        let Self::Transaction { snapshot, .. } = self else {
            return (self, CommandError::Sequence.into());
        };

        let resolve = |number: MessageNumber, action: fn(MessageNumber, usize) -> Action| {
            number.index(snapshot).map_or_else(
                || CommandError::NoSuchMessage.into(),
                |index| action(number, index),
            )
        };

        let action = match command {
            Command::Stat => Action::Stat,
            Command::List(None) => Action::ListAll,
            Command::List(Some(number)) => {
                resolve(number, |number, index| Action::ListOne { number, index })
            }
            Command::Retr(number) => {
                resolve(number, |number, index| Action::Retrieve { number, index })
            }
            Command::Dele(number) => {
                resolve(number, |number, index| Action::Delete { number, index })
            }
            Command::Rset => Action::Reset,
            Command::Noop => Action::Reply(Reply::noop()),
            _ => CommandError::Sequence.into(),
        };

        (self, action)
    }
}

impl FiniteStateMachine for State {
    type Input = Event;
    type Action = Action;

    fn transition(self, input: Event) -> (Self, Action) {
        match (self, input) {
            (state, Event::Command(command)) => state.command(command),

            (Self::Unauthenticated, Event::UserChecked { user, lookup }) => match lookup {
                Lookup::Found => {
                    let reply = Reply::user_accepted(&user);
                    (Self::UserKnown(user), Action::Reply(reply))
                }
                Lookup::Missing => (
                    Self::Unauthenticated,
                    CommandError::UnknownUser(user).into(),
                ),
                Lookup::Failed => (
                    Self::Unauthenticated,
                    CommandError::Storage("look up user".to_string()).into(),
                ),
            },

            (Self::UserKnown(user), Event::LoggedIn(login)) => match login {
                Login::Opened { snapshot } => (
                    Self::Transaction { user, snapshot },
                    Action::Reply(Reply::mailbox_open()),
                ),
                Login::Rejected => (
                    Self::UserKnown(user),
                    Action::Reply(Reply::invalid_credentials()),
                ),
                Login::Locked => (Self::UserKnown(user), Action::Reply(Reply::locked())),
                Login::Failed => (
                    Self::UserKnown(user),
                    CommandError::Storage("open maildrop".to_string()).into(),
                ),
            },

            (state, _) => (state, CommandError::Sequence.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use mailbag_common::{error::CommandError, line::SyntaxError, traits::FiniteStateMachine};
    use pretty_assertions::assert_eq;

    use super::{Action, Event, Login, Lookup, State};
    use crate::{
        command::{Command, MessageNumber, Password},
        reply::Reply,
    };

    fn transaction(snapshot: usize) -> State {
        State::Transaction {
            user: "bob".to_string(),
            snapshot,
        }
    }

    fn sequence() -> Action {
        Action::Reply(Reply::from(CommandError::Sequence))
    }

    fn number(n: &str) -> MessageNumber {
        MessageNumber::parse(n)
    }

    #[test]
    fn user_then_pass() {
        let (state, action) = State::default().transition(Command::User("bob".to_string()).into());
        assert_eq!(state, State::Unauthenticated);
        assert_eq!(action, Action::LookupUser("bob".to_string()));

        let (state, action) = state.transition(Event::UserChecked {
            user: "bob".to_string(),
            lookup: Lookup::Found,
        });
        assert_eq!(state, State::UserKnown("bob".to_string()));
        assert_eq!(action, Action::Reply(Reply::user_accepted("bob")));

        let (state, action) = state.transition(Command::Pass(Password::new("secret")).into());
        assert_eq!(
            action,
            Action::Authenticate {
                user: "bob".to_string(),
                password: Password::new("secret")
            }
        );

        let (state, action) = state.transition(Event::LoggedIn(Login::Opened { snapshot: 3 }));
        assert_eq!(state, transaction(3));
        assert_eq!(action, Action::Reply(Reply::mailbox_open()));
    }

    #[test]
    fn unknown_user_stays_unauthenticated() {
        let (state, action) = State::default().transition(Event::UserChecked {
            user: "eve".to_string(),
            lookup: Lookup::Missing,
        });

        assert_eq!(state, State::Unauthenticated);
        assert_eq!(
            action,
            Action::Reply(Reply::from(CommandError::UnknownUser("eve".to_string())))
        );
    }

    #[test]
    fn failed_login_keeps_user() {
        for (login, reply) in [
            (Login::Rejected, Reply::invalid_credentials()),
            (Login::Locked, Reply::locked()),
        ] {
            let (state, action) =
                State::UserKnown("bob".to_string()).transition(Event::LoggedIn(login));

            assert_eq!(state, State::UserKnown("bob".to_string()));
            assert_eq!(action, Action::Reply(reply));
        }
    }

    #[test]
    fn pass_without_user_is_out_of_sequence() {
        let (state, action) = State::default().transition(Command::Pass(Password::new("secret")).into());

        assert_eq!(state, State::Unauthenticated);
        assert_eq!(action, sequence());
    }

    #[test]
    fn transaction_commands_need_transaction() {
        for command in [
            Command::Stat,
            Command::List(None),
            Command::Retr(number("1")),
            Command::Dele(number("1")),
            Command::Rset,
            Command::Noop,
        ] {
            for state in [State::Unauthenticated, State::UserKnown("bob".to_string())] {
                let (next, action) = state.clone().transition(command.clone().into());

                assert_eq!(next, state);
                assert_eq!(action, sequence());
            }
        }
    }

    #[test]
    fn user_after_login_is_out_of_sequence() {
        let (state, action) = transaction(1).transition(Command::User("bob".to_string()).into());

        assert_eq!(state, transaction(1));
        assert_eq!(action, sequence());
    }

    #[test]
    fn syntax_errors_win_over_sequence() {
        let (state, action) = State::default().transition(
            Command::Malformed {
                verb: "STAT",
                error: SyntaxError::UnexpectedArgument,
            }
            .into(),
        );

        assert_eq!(state, State::Unauthenticated);
        assert_eq!(
            action,
            Action::Reply(Reply::from(CommandError::Syntax(
                SyntaxError::UnexpectedArgument
            )))
        );
    }

    #[test]
    fn message_numbers_resolve_against_snapshot() {
        let no_such_message = Action::Reply(Reply::from(CommandError::NoSuchMessage));

        let (_, action) = transaction(2).transition(Command::Retr(number("2")).into());
        assert_eq!(
            action,
            Action::Retrieve {
                number: number("2"),
                index: 1
            }
        );

        for argument in ["0", "3", "x", "-1"] {
            for command in [
                Command::Retr(number(argument)),
                Command::Dele(number(argument)),
                Command::List(Some(number(argument))),
            ] {
                let (state, action) = transaction(2).transition(command.into());

                assert_eq!(state, transaction(2));
                assert_eq!(action, no_such_message);
            }
        }
    }

    #[test]
    fn quit_from_any_state() {
        for state in [
            State::Unauthenticated,
            State::UserKnown("bob".to_string()),
            transaction(0),
        ] {
            let (state, action) = state.transition(Command::Quit.into());

            assert!(state.is_closed());
            assert_eq!(action, Action::Quit);
        }
    }

    #[test]
    fn unsupported_in_any_state() {
        let (state, action) = transaction(1).transition(Command::NotImplemented("TOP").into());
        assert_eq!(state, transaction(1));
        assert_eq!(action, Action::Reply(Reply::from(CommandError::NotImplemented)));

        let (state, action) =
            State::default().transition(Command::Unrecognized("HELO".to_string()).into());
        assert_eq!(state, State::Unauthenticated);
        assert_eq!(action, Action::Reply(Reply::from(CommandError::Unrecognized)));
    }

    #[test]
    fn noop_in_transaction() {
        let (state, action) = transaction(0).transition(Command::Noop.into());

        assert_eq!(state, transaction(0));
        assert_eq!(action, Action::Reply(Reply::noop()));
    }
}
