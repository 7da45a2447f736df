use url::Url;

use crate::{IngestRequest, IngestSource, QueryRequest};

/// Request rejected before anything is sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported url scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("file {0:?} is empty")]
    EmptyFile(String),
    #[error("file name must not be empty")]
    MissingFileName,
    #[error("job id must not be empty")]
    EmptyJobId,
}

pub fn validate_query(request: &QueryRequest) -> Result<(), ValidationError> {
    if request.text.trim().is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    Ok(())
}

/// Parses an ingestion URL, accepting only absolute http(s) URLs.
pub fn parse_ingest_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|err| ValidationError::InvalidUrl {
        url: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::UnsupportedScheme(other.to_string())),
    }
}

pub fn validate_ingest(request: &IngestRequest) -> Result<(), ValidationError> {
    match &request.source {
        IngestSource::Url(raw) => parse_ingest_url(raw).map(|_| ()),
        IngestSource::File { name, bytes } => {
            if name.trim().is_empty() {
                return Err(ValidationError::MissingFileName);
            }
            if bytes.is_empty() {
                return Err(ValidationError::EmptyFile(name.clone()));
            }
            Ok(())
        }
    }
}

pub fn validate_job_id(job_id: &str) -> Result<(), ValidationError> {
    if job_id.trim().is_empty() {
        return Err(ValidationError::EmptyJobId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_question() {
        assert_eq!(
            validate_query(&QueryRequest::new("  \n")),
            Err(ValidationError::EmptyQuestion)
        );
        assert!(validate_query(&QueryRequest::new("What is X?")).is_ok());
    }

    #[test]
    fn rejects_malformed_and_non_http_urls() {
        assert!(matches!(
            parse_ingest_url("not a url"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert_eq!(
            parse_ingest_url("ftp://example.com/file"),
            Err(ValidationError::UnsupportedScheme("ftp".to_string()))
        );
        assert!(parse_ingest_url(" https://example.com/docs ").is_ok());
    }

    #[test]
    fn rejects_empty_file() {
        let request = IngestRequest::file("doc.pdf", Vec::new());
        assert_eq!(
            validate_ingest(&request),
            Err(ValidationError::EmptyFile("doc.pdf".to_string()))
        );
    }
}
