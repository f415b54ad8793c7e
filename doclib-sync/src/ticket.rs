//! Tickets and the ticket lookup port.

use std::time::Duration;

use serde::Deserialize;

use doclib_core::types::{ProductCode, TicketId};

use crate::error::TicketError;

/// A ticket id with its (possibly user supplied) summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: TicketId,
    summary: String,
}

impl Ticket {
    pub fn new(id: TicketId, summary: impl Into<String>) -> Self {
        let mut ticket = Self {
            id,
            summary: String::new(),
        };
        ticket.set_summary(summary);
        ticket
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn has_summary(&self) -> bool {
        !self.summary.is_empty()
    }

    /// Replace the summary. Blank text is ignored and returns `false`.
    pub fn set_summary(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.summary = trimmed.to_string();
        true
    }

    /// Summary split on whitespace and ASCII punctuation, joined with `sep`,
    /// upper-cased.
    pub fn normalized_summary(&self, sep: &str) -> String {
        self.summary
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>()
            .join(sep)
            .to_uppercase()
    }

    /// `ID + sep + NORMALIZED_SUMMARY + sep + product version`.
    pub fn branch_name(&self, product: &ProductCode, sep: &str) -> String {
        [
            self.id.as_str(),
            &self.normalized_summary(sep),
            product.version(sep),
        ]
        .join(sep)
    }

    /// Commit message used when the ticket's work is staged.
    pub fn commit_message(&self) -> String {
        format!("{}: {}", self.id, self.summary)
    }

    /// The ticket id's first `sep`-delimited segment equals the product's.
    pub fn belongs_to(&self, product: &ProductCode, sep: &str) -> bool {
        first_segment(self.id.as_str(), sep) == first_segment(product.as_str(), sep)
    }
}

/// Commit message of the main-line merge during checkin.
pub fn merge_message(id: &TicketId) -> String {
    format!("[MERGED] JIRA ticket '{id}'")
}

fn first_segment<'a>(code: &'a str, sep: &str) -> &'a str {
    code.split(sep).next().unwrap_or(code)
}

// ---------------------------------------------------------------------------
// Lookup port
// ---------------------------------------------------------------------------

/// Ticket lookup. `Ok(None)` means the ticket does not exist.
pub trait TicketService {
    fn find(&self, id: &TicketId) -> Result<Option<Ticket>, TicketError>;
}

/// Never finds anything; used when remote requests are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTicketService;

impl TicketService for OfflineTicketService {
    fn find(&self, _id: &TicketId) -> Result<Option<Ticket>, TicketError> {
        Ok(None)
    }
}

/// Jira REST lookup (`GET <site>/rest/api/2/issue/<id>?fields=summary`).
#[derive(Debug)]
pub struct JiraTicketService {
    site: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    summary: String,
}

const USER_AGENT: &str = concat!("doclib/", env!("CARGO_PKG_VERSION"));

impl JiraTicketService {
    pub fn new(site: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            site: site.map(|s| s.trim_end_matches('/').to_string()),
            agent,
        }
    }

    fn issue_url(&self, id: &TicketId) -> Result<String, TicketError> {
        let site = self.site.as_deref().ok_or(TicketError::NotConfigured)?;
        Ok(format!("{site}/rest/api/2/issue/{id}?fields=summary"))
    }
}

impl TicketService for JiraTicketService {
    fn find(&self, id: &TicketId) -> Result<Option<Ticket>, TicketError> {
        let url = self.issue_url(id)?;
        tracing::debug!("GET {url}");
        let response = self
            .agent
            .get(&url)
            .set("Accept", "application/json")
            .call();

        match response {
            Ok(resp) => {
                let issue: IssueResponse = resp
                    .into_json()
                    .map_err(|e| TicketError::Parse(e.to_string()))?;
                Ok(Some(Ticket::new(id.clone(), issue.fields.summary)))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(TicketError::Http(format!("HTTP {code}: {body}")))
            }
            Err(e) => Err(TicketError::Http(e.to_string())),
        }
    }
}
