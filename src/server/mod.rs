//! HTTP server for the emergency directory.
//!
//! Three endpoints: `/fetch` (operator-triggered refresh), `/contacts`
//! (cards for the page), and `/download` (vCard export).

mod http;
mod types;

pub use http::{Request, Response};
pub use types::{
    ContactsResponse, ErrorResponse, FetchResponse, RateLimitErrorResponse, MSG_EMPTY_DIRECTORY,
};

use anyhow::Result;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::VcardError;
use crate::models::{Contact, ContactCard};
use crate::ratelimit::{RateDecision, RateLimit, RateLimiter, FETCH_LIMIT, PAGE_LIMIT};
use crate::refresh::Directory;
use crate::security::{client_identifier, constant_time_eq};
use crate::session::{is_valid_download_id, ExpiringStore, Lookup};
use crate::sheets::SheetSource;
use crate::vcard::{VcardFile, CONTENT_TYPE};

const IO_TIMEOUT: Duration = Duration::from_secs(30);
const TOO_MANY_REQUESTS: &str = "Too many requests. Please try again later.";

pub struct DirectoryServer<S: SheetSource> {
    port: u16,
    directory: Directory<S>,
    limiter: Box<dyn RateLimiter>,
    downloads: ExpiringStore<Contact>,
}

impl<S: SheetSource + 'static> DirectoryServer<S> {
    pub fn new(directory: Directory<S>, limiter: Box<dyn RateLimiter>) -> Self {
        let port = directory.config().port;
        let ttl = Duration::from_secs(directory.config().session_ttl_secs);
        Self {
            port,
            directory,
            limiter,
            downloads: ExpiringStore::new(ttl),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Start the server (blocking). Each connection is handled on its own thread.
    pub fn start(self: Arc<Self>, shutdown: Arc<AtomicBool>) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))?;
        listener.set_nonblocking(true)?;

        tracing::info!(port = self.port, "directory server listening");

        while !shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer_addr)) => {
                    let server = Arc::clone(&self);
                    std::thread::spawn(move || {
                        if let Err(e) = server.handle_connection(stream, peer_addr) {
                            tracing::warn!(peer = %peer_addr, error = %e, "request error");
                        }
                    });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                }
            }
        }

        tracing::info!("directory server stopped");
        Ok(())
    }

    fn handle_connection(&self, mut stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let request = match Request::read_from(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::debug!(error = %e, "unreadable request");
                return Response::text(400, "Bad Request").write_to(&mut stream);
            }
        };

        let response = self.route(&request, peer_addr).unwrap_or_else(|e| {
            tracing::error!(path = %request.path, error = %e, "handler failed");
            Response::text(500, "Internal Server Error")
        });
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "request handled"
        );
        response
            .with_header("X-Content-Type-Options", "nosniff")
            .write_to(&mut stream)
    }

    /// Dispatch a parsed request.
    pub fn route(&self, request: &Request, peer_addr: SocketAddr) -> Result<Response> {
        let client = client_identifier(&request.headers, peer_addr);

        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/fetch") => self.handle_fetch(request, &client),
            ("GET", "/contacts") => self.handle_contacts(&client),
            ("GET", "/download") => self.handle_download(request, &client),
            (_, "/fetch" | "/contacts" | "/download") => {
                Ok(Response::text(405, "Method Not Allowed").with_header("Allow", "GET"))
            }
            _ => Ok(Response::text(404, "Not Found")),
        }
    }

    fn rate_limited(&self, identifier: &str, limit: RateLimit) -> Option<u64> {
        match self.limiter.check(identifier, limit) {
            RateDecision::Allowed => None,
            RateDecision::Limited { retry_after_secs } => Some(retry_after_secs),
        }
    }

    /// Manual refresh: rate limit, then key, then URL, then a hash-checked load.
    fn handle_fetch(&self, request: &Request, client: &str) -> Result<Response> {
        if let Some(retry_after) = self.rate_limited(&format!("fetch_{}", client), FETCH_LIMIT) {
            let body = RateLimitErrorResponse {
                success: false,
                error: TOO_MANY_REQUESTS.to_string(),
                retry_after_seconds: retry_after,
            };
            return Ok(Response::json(429, &body)?.with_header("Retry-After", retry_after.to_string()));
        }

        let config = self.directory.config();
        let provided = request.param("key").unwrap_or_default();
        if provided.is_empty()
            || config.fetch_key.is_empty()
            || !constant_time_eq(provided.as_bytes(), config.fetch_key.as_bytes())
        {
            tracing::warn!(client, "refresh rejected: invalid or missing key");
            return Response::json(401, &ErrorResponse::new("Invalid or missing key"));
        }

        if !config.has_sheet_url() {
            return Response::json(400, &ErrorResponse::new("Google Sheet URL not configured"));
        }

        let load = self.directory.load(true);
        match FetchResponse::from_load(&load) {
            Some(body) => {
                tracing::info!(
                    contacts = body.contacts_count,
                    cache_used = body.cache_used,
                    "manual refresh complete"
                );
                Response::json(200, &body)
            }
            None => Response::json(
                503,
                &ErrorResponse::new("Failed to refresh cache. Please try again later."),
            ),
        }
    }

    fn handle_contacts(&self, client: &str) -> Result<Response> {
        if let Some(retry_after) = self.rate_limited(client, PAGE_LIMIT) {
            return Ok(too_many_requests(retry_after));
        }

        let load = self.directory.load(false);
        let config = self.directory.config();
        let cards: Vec<ContactCard> = load
            .contacts
            .iter()
            .enumerate()
            .map(|(index, contact)| {
                let card = ContactCard::from_contact(contact, index, config);
                self.downloads.put(card.download_id.clone(), contact.clone());
                card
            })
            .collect();

        let body = ContactsResponse {
            empty_message: cards.is_empty().then(|| MSG_EMPTY_DIRECTORY.to_string()),
            updated_at: load
                .envelope
                .as_ref()
                .and_then(|e| chrono::DateTime::from_timestamp(e.timestamp, 0))
                .map(|t| t.to_rfc3339()),
            contacts: cards,
        };
        Ok(Response::json(200, &body)?.with_header("Cache-Control", "no-store"))
    }

    fn handle_download(&self, request: &Request, client: &str) -> Result<Response> {
        if let Some(retry_after) = self.rate_limited(client, PAGE_LIMIT) {
            return Ok(too_many_requests(retry_after));
        }

        let kind = request.param_trimmed("type").to_lowercase();
        let file = match kind.as_str() {
            "single" if request.param("id").is_none() && has_raw_params(request) => {
                self.raw_download(request)
            }
            "single" => self.stored_download(request),
            "all" => {
                let load = self.directory.load(false);
                if load.contacts.is_empty() {
                    Err(Response::text(404, "No contacts available."))
                } else {
                    Ok(VcardFile::for_all(&load.contacts))
                }
            }
            _ => Err(Response::text(400, "Invalid request.")),
        };

        Ok(match file {
            Ok(file) => vcard_response(&file),
            Err(response) => response,
        })
    }

    fn stored_download(&self, request: &Request) -> Result<VcardFile, Response> {
        let id = request.param_trimmed("id").to_lowercase();
        if id.is_empty() {
            return Err(Response::text(400, "Missing contact ID."));
        }
        if !is_valid_download_id(&id) {
            return Err(Response::text(400, "Invalid contact ID format."));
        }

        let contact = match self.downloads.get(&id) {
            Lookup::Found(contact) => contact,
            Lookup::Missing => return Err(Response::text(404, "Contact not found. Please try again.")),
            Lookup::Expired => {
                return Err(Response::text(
                    410,
                    "Session expired. Please refresh the page and try again.",
                ))
            }
        };
        VcardFile::for_contact(&contact).map_err(invalid_input)
    }

    fn raw_download(&self, request: &Request) -> Result<VcardFile, Response> {
        let name = request.param_trimmed("name");
        let number = request.param_trimmed("number");
        if name.is_empty() || number.is_empty() {
            return Err(Response::text(400, "Missing number or name."));
        }
        VcardFile::for_raw(name, number).map_err(invalid_input)
    }

    #[cfg(test)]
    fn directory(&self) -> &Directory<S> {
        &self.directory
    }
}

fn has_raw_params(request: &Request) -> bool {
    request.param("name").is_some() || request.param("number").is_some()
}

fn too_many_requests(retry_after: u64) -> Response {
    Response::text(429, TOO_MANY_REQUESTS).with_header("Retry-After", retry_after.to_string())
}

fn vcard_response(file: &VcardFile) -> Response {
    Response {
        status: 200,
        headers: Vec::new(),
        body: file.body.clone().into_bytes(),
    }
    .with_header("Content-Type", CONTENT_TYPE)
    .with_header("Content-Disposition", file.content_disposition())
    .with_header("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0")
    .with_header("Pragma", "no-cache")
    .with_header("Expires", "0")
    .with_header("X-Download-Options", "noopen")
}

fn invalid_input(e: VcardError) -> Response {
    let message = match e {
        VcardError::InvalidName => "Invalid name format.",
        VcardError::InvalidNumber => "Invalid phone number format.",
    };
    Response::text(400, message)
}

/// Install a Ctrl+C handler that flips `shutdown`.
pub fn ctrlc_handler(shutdown: Arc<AtomicBool>) {
    let _ = ctrlc::set_handler(move || {
        tracing::info!("received Ctrl+C, shutting down");
        shutdown.store(true, Ordering::SeqCst);
    });
}
