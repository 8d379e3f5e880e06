use std::fmt;

/// Failure of one step of the application sequence.
///
/// `Fatal` aborts the whole run (the binary restarts the device), while
/// `Retryable` lets the test loop carry on with the next iteration.
#[derive(Debug)]
pub enum StepError {
    Fatal {
        step: &'static str,
        source: anyhow::Error,
    },
    Retryable {
        step: &'static str,
        source: anyhow::Error,
    },
}

pub type StepResult<T> = Result<T, StepError>;

impl StepError {
    pub fn fatal(step: &'static str, source: impl Into<anyhow::Error>) -> Self {
        StepError::Fatal {
            step,
            source: source.into(),
        }
    }

    pub fn retryable(step: &'static str, source: impl Into<anyhow::Error>) -> Self {
        StepError::Retryable {
            step,
            source: source.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StepError::Fatal { .. })
    }

    pub fn step(&self) -> &'static str {
        match self {
            StepError::Fatal { step, .. } | StepError::Retryable { step, .. } => step,
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepError::Fatal { step, source } => write!(f, "fatal error in {}: {:#}", step, source),
            StepError::Retryable { step, source } => {
                write!(f, "recoverable error in {}: {:#}", step, source)
            }
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StepError::Fatal { source, .. } | StepError::Retryable { source, .. } => {
                Some(&**source)
            }
        }
    }
}

/// Tags a collaborator result with the policy of the call site.
pub trait StepResultExt<T> {
    fn fatal(self, step: &'static str) -> StepResult<T>;
    fn retryable(self, step: &'static str) -> StepResult<T>;
}

impl<T, E> StepResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn fatal(self, step: &'static str) -> StepResult<T> {
        self.map_err(|e| StepError::fatal(step, e))
    }

    fn retryable(self, step: &'static str) -> StepResult<T> {
        self.map_err(|e| StepError::retryable(step, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn tags_errors_with_call_site_policy() {
        let err = Err::<(), _>(anyhow!("uart timeout"))
            .fatal("store_profile")
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.step(), "store_profile");
        assert_eq!(err.to_string(), "fatal error in store_profile: uart timeout");

        let err = Err::<(), _>(anyhow!("queue full"))
            .retryable("mqtt_publish")
            .unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "recoverable error in mqtt_publish: queue full");
    }

    #[test]
    fn passes_ok_through() {
        assert_eq!(Ok::<_, anyhow::Error>(7).fatal("get_signal_quality").unwrap(), 7);
    }
}
