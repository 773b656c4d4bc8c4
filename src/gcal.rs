//! Google Calendar access: OAuth flow, token refresh, and event fetching.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use google_calendar::types::{EventDateTime, MinAccessRole, OrderBy};
use google_calendar::{AccessToken, Client};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use crate::config::{AccountTokens, GcalConfig};
use crate::error::{ExportError, ExportResult};
use crate::event::{Event, EventStatus, EventTime};

const REDIRECT_PORT: u16 = 8085;
const REDIRECT_URI: &str = "http://localhost:8085/callback";

const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar.readonly"];

/// Parameters for an event fetch, mirroring the events.list query
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub calendar_id: String,
    pub time_min: DateTime<Utc>,
    pub order_by: OrderBy,
}

impl Default for FetchParams {
    fn default() -> Self {
        FetchParams {
            calendar_id: "primary".to_string(),
            time_min: Utc::now(),
            order_by: OrderBy::StartTime,
        }
    }
}

/// Create a Google Calendar client from stored tokens
fn create_client(config: &GcalConfig, tokens: &AccountTokens) -> Client {
    Client::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        REDIRECT_URI.to_string(),
        tokens.access_token.clone(),
        tokens.refresh_token.clone(),
    )
}

/// Create a new client for initial authentication (no tokens yet)
fn create_auth_client(config: &GcalConfig) -> Client {
    Client::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        REDIRECT_URI.to_string(),
        String::new(),
        String::new(),
    )
}

/// Extract code and state from the OAuth callback request line.
/// The request line looks like: GET /callback?code=xxx&state=yyy HTTP/1.1
fn parse_callback(request_line: &str) -> Result<(String, String)> {
    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .context("Invalid callback request")?;

    let url = url::Url::parse(&format!("http://localhost{}", url_part))?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };

    let code = param("code").context("No code in callback")?;
    let state = param("state").context("No state in callback")?;

    Ok((code, state))
}

/// Start a local HTTP server to receive the OAuth callback
fn wait_for_callback() -> Result<(String, String)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
        .with_context(|| format!("Failed to bind to port {}", REDIRECT_PORT))?;

    println!("Waiting for OAuth callback on port {}...", REDIRECT_PORT);

    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let parsed = parse_callback(&request_line)?;

    // Send a response to the browser
    let response = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>\
        <h1>Authentication successful!</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok(parsed)
}

/// Run the full OAuth authentication flow
pub async fn authenticate(config: &GcalConfig) -> Result<AccountTokens> {
    let mut client = create_auth_client(config);

    // Get the authorization URL
    let scopes: Vec<String> = SCOPES.iter().map(|s| s.to_string()).collect();
    let auth_url = client.user_consent_url(&scopes);

    println!("\nOpen this URL in your browser to authenticate:\n");
    println!("{}\n", auth_url);

    // Try to open the browser automatically
    if open::that(&auth_url).is_err() {
        println!("(Could not open browser automatically, please copy the URL above)");
    }

    // Wait for the callback
    let (code, state) = wait_for_callback()?;

    println!("\nReceived authorization code, exchanging for tokens...");

    let access_token = client
        .get_access_token(&code, &state)
        .await
        .context("Failed to exchange code for tokens")?;

    println!("Authentication successful!");

    Ok(tokens_from_response(&access_token, None))
}

/// Build AccountTokens from an OAuth token response.
///
/// Google typically doesn't return a new refresh_token on refresh
/// responses, so the stored one is preserved when the response is empty.
fn tokens_from_response(token: &AccessToken, previous: Option<&AccountTokens>) -> AccountTokens {
    let expires_at = if token.expires_in > 0 {
        Some(Utc::now() + Duration::seconds(token.expires_in))
    } else {
        None
    };

    let refresh_token = if token.refresh_token.is_empty() {
        previous.map(|t| t.refresh_token.clone()).unwrap_or_default()
    } else {
        token.refresh_token.clone()
    };

    AccountTokens {
        access_token: token.access_token.clone(),
        refresh_token,
        expires_at,
    }
}

/// Refresh an expired access token
pub async fn refresh_tokens(config: &GcalConfig, tokens: &AccountTokens) -> Result<AccountTokens> {
    let client = create_client(config, tokens);

    let access_token = client
        .refresh_access_token()
        .await
        .context("Failed to refresh token")?;

    Ok(tokens_from_response(&access_token, Some(tokens)))
}

/// Whether the stored access token is expired or about to expire
pub fn needs_refresh(tokens: &AccountTokens) -> bool {
    match tokens.expires_at {
        Some(expires_at) => expires_at <= Utc::now() + Duration::minutes(1),
        None => false,
    }
}

/// Return tokens valid for use right now, refreshing and persisting if needed
pub async fn ensure_valid_tokens(
    config: &GcalConfig,
    tokens: AccountTokens,
) -> Result<AccountTokens> {
    if !needs_refresh(&tokens) {
        return Ok(tokens);
    }

    println!("Access token expired, refreshing...");
    let refreshed = refresh_tokens(config, &tokens).await?;
    crate::config::save_tokens(&refreshed)?;

    Ok(refreshed)
}

/// A calendar from the user's calendar list
#[derive(Debug)]
pub struct CalendarEntry {
    pub id: String,
    pub name: String,
    pub primary: bool,
}

/// Fetch the list of calendars for the authenticated user
pub async fn fetch_calendars(
    config: &GcalConfig,
    tokens: &AccountTokens,
) -> Result<Vec<CalendarEntry>> {
    let client = create_client(config, tokens);

    let response = client
        .calendar_list()
        .list_all(MinAccessRole::default(), false, false)
        .await
        .context("Failed to fetch calendar list")?;

    Ok(response
        .body
        .into_iter()
        .filter(|c| !c.id.is_empty())
        .map(|c| CalendarEntry {
            id: c.id,
            name: if c.summary.is_empty() {
                "(unnamed)".to_string()
            } else {
                c.summary
            },
            primary: c.primary,
        })
        .collect())
}

/// Fetch upcoming events from a calendar and convert them to neutral records.
///
/// A conversion failure aborts the whole fetch: the formatter never runs on
/// a partially-converted list.
pub async fn fetch_events(
    config: &GcalConfig,
    tokens: &AccountTokens,
    params: &FetchParams,
) -> Result<Vec<Event>> {
    let client = create_client(config, tokens);

    let time_min = params.time_min.to_rfc3339();

    let response = client
        .events()
        .list_all(
            &params.calendar_id,
            "",                      // i_cal_uid
            0,                       // max_attendees
            params.order_by.clone(), // order_by
            &[],                     // private_extended_property
            "",                      // q (search query)
            &[],                     // shared_extended_property
            false,                   // show_deleted
            false,                   // show_hidden_invitations
            true,                    // single_events: expand recurring events
            "",                      // time_max: unbounded
            &time_min,               // time_min
            "",                      // time_zone
            "",                      // updated_min
        )
        .await
        .context("Failed to fetch events")?;

    response
        .body
        .into_iter()
        .map(|e| convert_event(e).map_err(anyhow::Error::from))
        .collect()
}

/// Convert a Google Calendar API event into a neutral Event record.
pub(crate) fn convert_event(event: google_calendar::types::Event) -> ExportResult<Event> {
    let start = convert_boundary(event.start.as_ref(), &event.id)?;
    let end = convert_boundary(event.end.as_ref(), &event.id)?;

    let status = match event.status.as_str() {
        "tentative" => EventStatus::Tentative,
        "cancelled" => EventStatus::Cancelled,
        _ => EventStatus::Confirmed,
    };

    Ok(Event {
        id: event.id,
        // An untitled event still gets a title: the empty string
        summary: event.summary,
        description: if event.description.is_empty() {
            None
        } else {
            Some(event.description)
        },
        location: if event.location.is_empty() {
            None
        } else {
            Some(event.location)
        },
        start,
        end,
        status,
        updated: event.updated,
    })
}

/// Determine the temporal variant of a start/end boundary.
///
/// Checked independently per boundary: a bare `date` stays all-day, a
/// `dateTime` keeps the zone the API reported. A boundary with neither
/// field is a malformed record.
fn convert_boundary(boundary: Option<&EventDateTime>, event_id: &str) -> ExportResult<EventTime> {
    let boundary = match boundary {
        Some(b) => b,
        None => return Err(ExportError::MalformedRecord(event_id.to_string())),
    };

    if let Some(dt) = boundary.date_time {
        if boundary.time_zone.is_empty() {
            return Ok(EventTime::DateTimeUtc(dt));
        }
        match boundary.time_zone.parse::<chrono_tz::Tz>() {
            Ok(tz) => Ok(EventTime::DateTimeZoned {
                datetime: dt.with_timezone(&tz).naive_local(),
                tzid: boundary.time_zone.clone(),
            }),
            // Unrecognized zone name: keep the instant rather than guess a wall time
            Err(_) => Ok(EventTime::DateTimeUtc(dt)),
        }
    } else if let Some(date) = boundary.date {
        Ok(EventTime::Date(date))
    } else {
        Err(ExportError::MalformedRecord(event_id.to_string()))
    }
}
