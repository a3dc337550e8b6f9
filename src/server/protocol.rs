use crate::session::Completion;
use serde::{Deserialize, Serialize};

/// An upload encoded as base 64 (a `data:` header is allowed)
#[derive(Deserialize)]
pub struct B64Upload {
    pub image: String,
}

#[derive(Deserialize)]
pub struct EpsilonRequest {
    pub eps: f64,
}

/// Outcome of `/predict` or `/attack`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RunResponse {
    /// Formatted result, absent when the response was superseded
    pub result: Option<String>,
    pub applied: bool,
}

impl From<Completion> for RunResponse {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Applied(result) => RunResponse {
                result: Some(result.to_string()),
                applied: true,
            },
            Completion::Superseded => RunResponse {
                result: None,
                applied: false,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataUrlResponse {
    pub data_url: String,
}
