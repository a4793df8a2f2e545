/// A session state machine driven by one parsed input at a time.
///
/// Transitions are pure: the returned action describes any work (storage
/// lookups, replies, delivery) the session driver has to carry out, so the
/// decision of *what* happens next never touches I/O.
pub trait FiniteStateMachine: Sized {
    type Input;
    type Action;

    #[must_use]
    fn transition(self, input: Self::Input) -> (Self, Self::Action);
}
