use strum::Display;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum EditorPhase {
    Loading,
    Ready,
    Editing,
    Saving,
    Deleted,
    NavigatedAway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum EditorEvent {
    Loaded,
    Input,
    SaveStarted,
    SaveFinished,
    Deleted,
    NavigateAway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {event} while {phase}")]
pub struct TransitionError {
    pub phase: EditorPhase,
    pub event: EditorEvent,
}

impl EditorPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, EditorPhase::Deleted | EditorPhase::NavigatedAway)
    }

    pub fn accepts_input(self) -> bool {
        matches!(self, EditorPhase::Ready | EditorPhase::Editing)
    }

    pub fn transition(self, event: EditorEvent) -> Result<EditorPhase, TransitionError> {
        use EditorEvent as E;
        use EditorPhase as P;
        let next = match (self, event) {
            (P::Loading, E::Loaded) => P::Ready,
            (P::Ready | P::Editing, E::Input) => P::Editing,
            (P::Ready | P::Editing, E::SaveStarted) => P::Saving,
            (P::Saving, E::SaveFinished) => P::Editing,
            (phase, E::Deleted) if !phase.is_terminal() => P::Deleted,
            (phase, E::NavigateAway) if !phase.is_terminal() => P::NavigatedAway,
            (phase, event) => return Err(TransitionError { phase, event }),
        };
        Ok(next)
    }
}
