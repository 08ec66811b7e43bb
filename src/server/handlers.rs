//! Request handlers. Every response is HTTP 200; failures are reported in the JSON body.

use crate::model::{json_text, Entry, NewEntry};
use crate::server::AppState;
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

const ROW_NOT_FOUND: &str = "row not found";

/// The body of a GET response.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub entries: Vec<Entry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The outcome of a POST.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostResponse {
    Ok {
        #[serde(rename = "driveLink", skip_serializing_if = "Option::is_none")]
        drive_link: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        deleted: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Error {
        message: String,
    },
}

impl PostResponse {
    fn ok() -> Self {
        PostResponse::Ok {
            drive_link: None,
            deleted: None,
            note: None,
        }
    }
}

/// What a POST body asks for.
#[derive(Debug)]
enum Action {
    Add(Box<NewEntry>),
    Delete(String),
}

/// Reads a POST body. The content type is ignored; clients often send JSON as `text/plain`.
fn parse_action(body: &[u8]) -> anyhow::Result<Action> {
    let value: Value = serde_json::from_slice(body).context("The request body is not JSON")?;
    anyhow::ensure!(value.is_object(), "The request body must be a JSON object");

    let action = value.get("action").and_then(json_text);
    if action.as_deref() == Some("delete") {
        let id = value
            .get("id")
            .and_then(json_text)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .context("A delete request needs an id")?;
        return Ok(Action::Delete(id));
    }
    let new_entry: NewEntry =
        serde_json::from_value(value).context("The request body is not a valid entry")?;
    Ok(Action::Add(Box::new(new_entry)))
}

/// GET: all entries, newest first.
pub async fn list_entries(State(state): State<AppState>) -> Json<ListResponse> {
    let result = state.store().lock().await.list_entries().await;
    match result {
        Ok(entries) => {
            debug!("Listing {} entries", entries.len());
            Json(ListResponse {
                entries,
                error: None,
            })
        }
        Err(e) => {
            error!("Unable to list entries: {e}");
            Json(ListResponse {
                entries: Vec::new(),
                error: Some(e.to_string()),
            })
        }
    }
}

/// POST: add an entry (with an optional receipt image) or delete one.
pub async fn post_entry(State(state): State<AppState>, body: Bytes) -> Json<PostResponse> {
    let response = match parse_action(&body) {
        Ok(Action::Add(new_entry)) => add_entry(&state, &new_entry).await,
        Ok(Action::Delete(id)) => delete_entry(&state, &id).await,
        Err(e) => Err(format!("{e:#}")),
    };
    Json(response.unwrap_or_else(|message| {
        error!("Request failed: {message}");
        PostResponse::Error { message }
    }))
}

async fn add_entry(state: &AppState, new_entry: &NewEntry) -> Result<PostResponse, String> {
    let entry = state
        .store()
        .lock()
        .await
        .append_entry(new_entry)
        .await
        .map_err(|e| e.to_string())?;

    let Some(image) = new_entry.receipt_image.as_deref() else {
        return Ok(PostResponse::ok());
    };

    // The row is saved. From here on a failure only costs the receipt link.
    let archived = tokio::time::timeout(state.receipt_timeout(), async {
        state
            .archiver()
            .lock()
            .await
            .store(image, &entry.id, &entry.date, &entry.desc)
            .await
    })
    .await;
    let link = match archived {
        Ok(Ok(link)) => link,
        Ok(Err(e)) => {
            warn!("Receipt for entry {} was not archived: {e}", entry.id);
            return Ok(PostResponse::ok());
        }
        Err(_) => {
            warn!(
                "Receipt for entry {} was not archived within {:?}",
                entry.id,
                state.receipt_timeout()
            );
            return Ok(PostResponse::ok());
        }
    };

    let written = state
        .store()
        .lock()
        .await
        .set_receipt_link(&entry.id, &link)
        .await;
    match written {
        Ok(true) => {}
        Ok(false) => warn!("Entry {} vanished before its receipt link was saved", entry.id),
        Err(e) => warn!("Unable to save the receipt link for entry {}: {e}", entry.id),
    }

    Ok(PostResponse::Ok {
        drive_link: Some(link),
        deleted: None,
        note: None,
    })
}

async fn delete_entry(state: &AppState, id: &str) -> Result<PostResponse, String> {
    let deleted = state
        .store()
        .lock()
        .await
        .delete_entry(id)
        .await
        .map_err(|e| e.to_string())?;
    Ok(if deleted {
        PostResponse::Ok {
            drive_link: None,
            deleted: Some(id.to_string()),
            note: None,
        }
    } else {
        PostResponse::Ok {
            drive_link: None,
            deleted: None,
            note: Some(ROW_NOT_FOUND.to_string()),
        }
    })
}

/// GET /healthz: the process is up.
pub async fn healthz() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_delete() {
        let action = parse_action(br#"{"action":"delete","id":42}"#).unwrap();
        assert!(matches!(action, Action::Delete(id) if id == "42"));
    }

    #[test]
    fn test_parse_delete_without_id() {
        let err = parse_action(br#"{"action":"delete"}"#).unwrap_err();
        assert!(err.to_string().contains("needs an id"));
    }

    #[test]
    fn test_parse_add() {
        let action = parse_action(br#"{"id":"7","amount":"1200","desc":"Coffee"}"#).unwrap();
        let Action::Add(new_entry) = action else {
            panic!("expected an add");
        };
        assert_eq!(new_entry.id.as_deref(), Some("7"));
        assert_eq!(new_entry.desc, "Coffee");
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(parse_action(b"not json").is_err());
        assert!(parse_action(b"[1,2]").is_err());
    }

    #[test]
    fn test_post_response_shapes() {
        assert_eq!(
            serde_json::to_value(PostResponse::ok()).unwrap(),
            json!({ "status": "ok" })
        );
        assert_eq!(
            serde_json::to_value(PostResponse::Ok {
                drive_link: Some("https://x".to_string()),
                deleted: None,
                note: None
            })
            .unwrap(),
            json!({ "status": "ok", "driveLink": "https://x" })
        );
        assert_eq!(
            serde_json::to_value(PostResponse::Error {
                message: "boom".to_string()
            })
            .unwrap(),
            json!({ "status": "error", "message": "boom" })
        );
    }
}
