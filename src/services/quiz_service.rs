//! Retrieval and validation of quiz documents from an external content
//! source. The fetch always completes before the transactional update that
//! stores the quiz, so no store operation waits on the network.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dao::models::QuestionEntity;

/// One question as published by a quiz source: a JSON array of these makes up
/// a quiz document. The authoring tool serializes the same shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizQuestionDoc {
    /// Question prompt.
    pub question: String,
    /// Optional illustration URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    /// The four answer options.
    pub answers: [String; 4],
    /// Index of the correct option.
    pub correct: u8,
}

/// Failures while fetching or interpreting a quiz document.
#[derive(Debug, Error)]
pub enum QuizFetchError {
    /// Building the HTTP client failed.
    #[error("failed to build quiz source client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The source could not be reached.
    #[error("failed to reach quiz source `{url}`")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The source answered with a non-success status.
    #[error("quiz source `{url}` answered with status {status}")]
    Status { url: String, status: StatusCode },
    /// The response body is not a quiz document.
    #[error("failed to decode quiz document from `{url}`")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The document decoded but its content is unusable.
    #[error("quiz document from `{url}` is invalid: {reason}")]
    Invalid { url: String, reason: String },
}

/// Fetch a quiz document and convert it into session questions.
pub async fn fetch_quiz(url: &str) -> Result<Vec<QuestionEntity>, QuizFetchError> {
    let client = Client::builder()
        .build()
        .map_err(|source| QuizFetchError::ClientBuilder { source })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| QuizFetchError::Request {
            url: url.to_owned(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(QuizFetchError::Status {
            url: url.to_owned(),
            status: response.status(),
        });
    }

    let docs: Vec<QuizQuestionDoc> =
        response
            .json()
            .await
            .map_err(|source| QuizFetchError::Decode {
                url: url.to_owned(),
                source,
            })?;

    into_questions(url, docs)
}

/// Validate fetched questions and convert them to entities.
pub fn into_questions(
    url: &str,
    docs: Vec<QuizQuestionDoc>,
) -> Result<Vec<QuestionEntity>, QuizFetchError> {
    let invalid = |reason: String| QuizFetchError::Invalid {
        url: url.to_owned(),
        reason,
    };

    if docs.is_empty() {
        return Err(invalid("document contains no questions".into()));
    }

    docs.into_iter()
        .enumerate()
        .map(|(index, doc)| {
            if doc.question.trim().is_empty() {
                return Err(invalid(format!("question {index} has an empty prompt")));
            }
            if doc.correct > 3 {
                return Err(invalid(format!(
                    "question {index} declares correct index {} (must be 0..=3)",
                    doc.correct
                )));
            }
            if doc.answers.iter().any(|answer| answer.trim().is_empty()) {
                return Err(invalid(format!("question {index} has an empty option")));
            }

            Ok(QuestionEntity {
                text: doc.question,
                image: doc.img,
                options: doc.answers,
                correct: doc.correct,
            })
        })
        .collect()
}
