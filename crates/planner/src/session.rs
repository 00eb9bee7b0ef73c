use thiserror::Error;

/// Per-session plan lifecycle. Generation moves Idle to Generating and then
/// either to Generated or back to Idle on failure; editing toggles between
/// Generated and Editing, and saving an edit lands back in Generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
    Generated,
    Editing,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session transition: {action} from {from:?}")]
pub struct SessionError {
    pub from: Phase,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Session {
    phase: Phase,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    /// Resumes a session at a known phase, e.g. `Generated` when a stored
    /// record already holds a plan.
    pub fn resume_at(phase: Phase) -> Self {
        Self { phase }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn begin_generation(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Idle | Phase::Generated => {
                self.phase = Phase::Generating;
                Ok(())
            }
            from => Err(SessionError {
                from,
                action: "begin_generation",
            }),
        }
    }

    pub fn generation_succeeded(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Generating => {
                self.phase = Phase::Generated;
                Ok(())
            }
            from => Err(SessionError {
                from,
                action: "generation_succeeded",
            }),
        }
    }

    pub fn generation_failed(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Generating => {
                self.phase = Phase::Idle;
                Ok(())
            }
            from => Err(SessionError {
                from,
                action: "generation_failed",
            }),
        }
    }

    pub fn begin_edit(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Generated => {
                self.phase = Phase::Editing;
                Ok(())
            }
            from => Err(SessionError {
                from,
                action: "begin_edit",
            }),
        }
    }

    /// Saving an edit assumes the persistence call already succeeded.
    pub fn save_edit(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Editing => {
                self.phase = Phase::Generated;
                Ok(())
            }
            from => Err(SessionError {
                from,
                action: "save_edit",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_generation_then_edit() {
        let mut session = Session::new();
        session.begin_generation().unwrap();
        session.generation_succeeded().unwrap();
        session.begin_edit().unwrap();
        session.save_edit().unwrap();
        assert_eq!(session.phase(), Phase::Generated);
    }

    #[test]
    fn failed_generation_returns_to_idle() {
        let mut session = Session::new();
        session.begin_generation().unwrap();
        session.generation_failed().unwrap();
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn regeneration_is_allowed_from_generated() {
        let mut session = Session::new();
        session.begin_generation().unwrap();
        session.generation_succeeded().unwrap();
        assert!(session.begin_generation().is_ok());
    }

    #[test]
    fn editing_before_generation_is_rejected() {
        let mut session = Session::new();
        let err = session.begin_edit().unwrap_err();
        assert_eq!(err.from, Phase::Idle);
    }
}
