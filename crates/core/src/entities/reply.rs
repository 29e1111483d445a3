#[derive(Debug, Clone, PartialEq)]
/// A single-line tracker response: `success <payload>` or `error : <reason>`.
pub enum Reply {
    Success(String),
    Error(String),
}

impl Reply {
    pub fn success(payload: impl Into<String>) -> Self {
        Reply::Success(payload.into())
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Reply::Error(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    pub fn to_wire(&self) -> String {
        match self {
            Reply::Success(payload) => format!("success {payload}"),
            Reply::Error(reason) => format!("error : {reason}"),
        }
    }

    /// Classify a raw response line the way the client does: anything that
    /// does not start with `success` counts as an error.
    pub fn parse(line: &str) -> Reply {
        match line.strip_prefix("success") {
            Some(payload) => Reply::Success(payload.trim_start().to_owned()),
            None => Reply::Error(
                line.strip_prefix("error :")
                    .map(|r| r.trim_start().to_owned())
                    .unwrap_or_else(|| line.to_owned()),
            ),
        }
    }
}
