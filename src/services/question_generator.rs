//! Client side of the question generation service.

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

use crate::state::room::{Question, QuestionError};

/// Parameters sent to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub difficulty: String,
    pub count: usize,
}

/// Failures while generating a question set.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The generator could not be reached or answered with an error status.
    #[error("question generator request failed: {0}")]
    Request(String),
    /// The response body could not be decoded.
    #[error("question generator returned an unreadable body: {0}")]
    Decode(String),
    /// The generator returned a different number of questions than requested.
    #[error("expected {expected} generated questions, got {actual}")]
    Count { expected: usize, actual: usize },
    /// A generated question does not fit the question schema.
    #[error("generated question {index} is invalid: {source}")]
    InvalidQuestion {
        index: usize,
        #[source]
        source: QuestionError,
    },
}

/// Produces fresh question sets for generated rooms.
pub trait QuestionGenerator: Send + Sync {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>>;
}

/// Reject a generated set unless it has exactly `expected` well-formed questions.
pub fn validate_generated(
    questions: Vec<Question>,
    expected: usize,
) -> Result<Vec<Question>, GenerationError> {
    if questions.len() != expected {
        return Err(GenerationError::Count {
            expected,
            actual: questions.len(),
        });
    }
    for (index, question) in questions.iter().enumerate() {
        question
            .validate()
            .map_err(|source| GenerationError::InvalidQuestion { index, source })?;
    }
    Ok(questions)
}

#[cfg(feature = "question-generator")]
pub use self::http::HttpQuestionGenerator;

#[cfg(feature = "question-generator")]
mod http {
    use std::{sync::Arc, time::Duration};

    use futures::future::BoxFuture;
    use reqwest::Client;
    use serde::Deserialize;
    use tracing::{debug, warn};

    use super::{GenerationError, GenerationRequest, QuestionGenerator};
    use crate::state::room::Question;

    #[derive(Deserialize)]
    struct GenerationResponse {
        questions: Vec<Question>,
    }

    /// Generator reached over HTTP: `POST {endpoint}` with a JSON
    /// [`GenerationRequest`], answered by `{"questions": [...]}`.
    #[derive(Clone)]
    pub struct HttpQuestionGenerator {
        client: Client,
        endpoint: Arc<str>,
    }

    impl HttpQuestionGenerator {
        /// Build a client for `endpoint` with a per-request timeout.
        pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, GenerationError> {
            let client = Client::builder()
                .timeout(request_timeout)
                .build()
                .map_err(|err| GenerationError::Request(err.to_string()))?;
            Ok(Self {
                client,
                endpoint: Arc::from(endpoint),
            })
        }
    }

    impl QuestionGenerator for HttpQuestionGenerator {
        fn generate(
            &self,
            request: GenerationRequest,
        ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>> {
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            Box::pin(async move {
                debug!(topic = %request.topic, count = request.count, "requesting generated questions");
                let response = client
                    .post(endpoint.as_ref())
                    .json(&request)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(|err| {
                        warn!(error = %err, "question generator request failed");
                        GenerationError::Request(err.to_string())
                    })?;

                let body: GenerationResponse = response
                    .json()
                    .await
                    .map_err(|err| GenerationError::Decode(err.to_string()))?;
                Ok(body.questions)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: &[&str], correct: usize) -> Question {
        Question {
            prompt: "pick one".into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_option: correct,
            explanation: None,
        }
    }

    #[test]
    fn generated_sets_must_match_count_and_schema() {
        let good = vec![question(&["a", "b"], 0), question(&["x", "y", "z"], 2)];
        assert_eq!(validate_generated(good.clone(), 2).unwrap().len(), 2);

        assert!(matches!(
            validate_generated(good, 3),
            Err(GenerationError::Count {
                expected: 3,
                actual: 2
            })
        ));

        let bad = vec![question(&["a", "b"], 0), question(&["a", "b"], 5)];
        assert!(matches!(
            validate_generated(bad, 2),
            Err(GenerationError::InvalidQuestion { index: 1, .. })
        ));
    }
}
