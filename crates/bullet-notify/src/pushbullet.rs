//! Pushbullet REST channel.
//!
//! The watcher registers as a `stream` device, sends notes from it, and
//! treats pushes targeted at that device as remote commands. Requests are
//! made with a blocking ureq agent on tokio's blocking pool; the agent's
//! timeouts bound every call.

use crate::channel::{ChannelError, InboundMessage, NotificationChannel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const API_BASE: &str = "https://api.pushbullet.com/v2";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Device {
    iden: String,
}

#[derive(Debug, Deserialize)]
struct PushList {
    #[serde(default)]
    pushes: Vec<Push>,
}

#[derive(Debug, Deserialize)]
struct Push {
    iden: String,
    body: Option<String>,
    target_device_iden: Option<String>,
    source_device_iden: Option<String>,
}

#[derive(Debug, Serialize)]
struct Note<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'a str,
    body: &'a str,
    source_device_iden: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_iden: Option<&'a str>,
}

struct Api {
    agent: ureq::Agent,
    token: String,
    base_url: String,
}

/// Pushbullet account access with an API token.
#[derive(Clone)]
pub struct PushbulletChannel {
    api: Arc<Api>,
}

impl PushbulletChannel {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, API_BASE)
    }

    /// Talk to a different API root (a proxy or a test server).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build();
        Self {
            api: Arc::new(Api {
                agent,
                token: token.into(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
            }),
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ChannelError>
    where
        T: Send + 'static,
        F: FnOnce(&Api) -> Result<T, ChannelError> + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        tokio::task::spawn_blocking(move || f(&api))
            .await
            .map_err(|e| ChannelError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for PushbulletChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushbulletChannel")
            .field("base_url", &self.api.base_url)
            .finish_non_exhaustive()
    }
}

fn describe(err: ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            format!("HTTP {}: {}", code, body.trim())
        }
        other => other.to_string(),
    }
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &self.url(path))
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "*/*")
    }

    fn register(&self, name: &str) -> Result<String, ChannelError> {
        let registration_error = |reason: String| ChannelError::Registration {
            name: name.to_string(),
            reason,
        };
        let response = self
            .request("POST", "devices")
            .send_form(&[("nickname", name), ("type", "stream")])
            .map_err(|e| registration_error(describe(e)))?;
        let device: Device = response
            .into_json()
            .map_err(|e| registration_error(e.to_string()))?;
        Ok(device.iden)
    }

    fn delete(&self, path: &str) -> Result<(), ChannelError> {
        self.request("DELETE", path)
            .call()
            .map(|_| ())
            .map_err(|e| ChannelError::Http(describe(e)))
    }

    fn send(
        &self,
        listener_id: &str,
        title: &str,
        body: &str,
        target: Option<&str>,
    ) -> Result<(), ChannelError> {
        let note = Note {
            kind: "note",
            title,
            body,
            source_device_iden: listener_id,
            device_iden: target,
        };
        self.request("POST", "pushes")
            .send_json(&note)
            .map(|_| ())
            .map_err(|e| ChannelError::Http(describe(e)))
    }

    fn poll_and_drain(&self, listener_id: &str) -> Result<Vec<InboundMessage>, ChannelError> {
        let response = self
            .request("GET", "pushes")
            .query("active", "true")
            .call()
            .map_err(|e| ChannelError::Http(describe(e)))?;
        let list: PushList = response
            .into_json()
            .map_err(|e| ChannelError::Decode(e.to_string()))?;

        let mine: Vec<Push> = list
            .pushes
            .into_iter()
            .filter(|p| p.target_device_iden.as_deref() == Some(listener_id))
            .collect();
        tracing::debug!("Got {} pushes for {}", mine.len(), listener_id);

        let mut messages = Vec::with_capacity(mine.len());
        // Pushbullet lists newest first. A push that cannot be dismissed
        // would come back next poll, so it is not handed out.
        for push in mine.into_iter().rev() {
            if let Err(e) = self.delete(&format!("pushes/{}", push.iden)) {
                tracing::error!("Failed to dismiss push {}, skipping it: {}", push.iden, e);
                continue;
            }
            match push.body {
                Some(body) => messages.push(InboundMessage::new(body, push.source_device_iden)),
                None => tracing::debug!("No body in push {}", push.iden),
            }
        }
        Ok(messages)
    }
}

impl NotificationChannel for PushbulletChannel {
    async fn register(&self, display_name: &str) -> Result<String, ChannelError> {
        let name = display_name.to_string();
        self.blocking(move |api| api.register(&name)).await
    }

    async fn unregister(&self, listener_id: &str) -> Result<(), ChannelError> {
        let path = format!("devices/{listener_id}");
        self.blocking(move |api| api.delete(&path)).await
    }

    async fn send(
        &self,
        listener_id: &str,
        title: &str,
        body: &str,
        target: Option<&str>,
    ) -> Result<(), ChannelError> {
        let listener_id = listener_id.to_string();
        let title = title.to_string();
        let body = body.to_string();
        let target = target.map(str::to_string);
        self.blocking(move |api| api.send(&listener_id, &title, &body, target.as_deref()))
            .await
    }

    async fn poll_and_drain(&self, listener_id: &str) -> Result<Vec<InboundMessage>, ChannelError> {
        let listener_id = listener_id.to_string();
        self.blocking(move |api| api.poll_and_drain(&listener_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Mutex;
    use std::thread;

    /// Serve the canned responses to consecutive connections, recording
    /// each request.
    fn serve(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let request = read_request(&mut stream);
                seen.lock().unwrap().push(request);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{}", addr), requests)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let mut expected = None;
        loop {
            if let Some(total) = expected {
                if buf.len() >= total {
                    break;
                }
            }
            let n = stream.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if expected.is_none() {
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    expected = Some(end + 4 + body_len);
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn json_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn empty_response(status: &str) -> String {
        format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
    }

    #[tokio::test]
    async fn test_register_returns_iden() {
        let (url, requests) = serve(vec![json_response(r#"{"iden":"ujz1","nickname":"x"}"#)]);
        let channel = PushbulletChannel::with_base_url("tok", url);
        let iden = channel.register("align_reads - 4242").await.unwrap();
        assert_eq!(iden, "ujz1");

        let requests = requests.lock().unwrap();
        assert!(requests[0].starts_with("POST /devices "));
        assert!(requests[0].contains("Bearer tok"));
        assert!(requests[0].contains("type=stream"));
    }

    #[tokio::test]
    async fn test_register_failure_is_registration_error() {
        let (url, _) = serve(vec![empty_response("401 Unauthorized")]);
        let channel = PushbulletChannel::with_base_url("bad", url);
        let err = channel.register("job").await.unwrap_err();
        assert!(matches!(err, ChannelError::Registration { .. }));
    }

    #[tokio::test]
    async fn test_poll_and_drain_filters_dismisses_and_orders() {
        let list = r#"{"pushes":[
            {"iden":"p3","body":"cancel","target_device_iden":"me","source_device_iden":"phone"},
            {"iden":"p2","body":"other","target_device_iden":"someone-else"},
            {"iden":"p1","body":"showstart","target_device_iden":"me"}
        ]}"#;
        let (url, requests) = serve(vec![
            json_response(list),
            json_response("{}"),
            json_response("{}"),
        ]);
        let channel = PushbulletChannel::with_base_url("tok", url);
        let messages = channel.poll_and_drain("me").await.unwrap();

        assert_eq!(
            messages,
            vec![
                InboundMessage::new("showstart", None),
                InboundMessage::new("cancel", Some("phone".to_string())),
            ]
        );

        let requests = requests.lock().unwrap();
        assert!(requests[0].starts_with("GET /pushes?active=true "));
        assert!(requests[1].starts_with("DELETE /pushes/p1 "));
        assert!(requests[2].starts_with("DELETE /pushes/p3 "));
    }

    #[tokio::test]
    async fn test_undismissed_push_is_not_returned() {
        let list = r#"{"pushes":[
            {"iden":"p2","body":"freemem","target_device_iden":"me"},
            {"iden":"p1","body":"cancel","target_device_iden":"me"}
        ]}"#;
        let (url, requests) = serve(vec![
            json_response(list),
            empty_response("500 Internal Server Error"),
            json_response("{}"),
        ]);
        let channel = PushbulletChannel::with_base_url("tok", url);
        let messages = channel.poll_and_drain("me").await.unwrap();

        assert_eq!(messages, vec![InboundMessage::new("freemem", None)]);
        let requests = requests.lock().unwrap();
        assert!(requests[1].starts_with("DELETE /pushes/p1 "));
        assert!(requests[2].starts_with("DELETE /pushes/p2 "));
    }

    #[tokio::test]
    async fn test_send_targets_device() {
        let (url, requests) = serve(vec![json_response("{}")]);
        let channel = PushbulletChannel::with_base_url("tok", url);
        channel
            .send("me", "Job done", "body", Some("phone"))
            .await
            .unwrap();

        let requests = requests.lock().unwrap();
        assert!(requests[0].starts_with("POST /pushes "));
        let (_, body) = requests[0].split_once("\r\n\r\n").unwrap();
        let note: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            note,
            serde_json::json!({
                "type": "note",
                "title": "Job done",
                "body": "body",
                "source_device_iden": "me",
                "device_iden": "phone",
            })
        );
    }

    #[tokio::test]
    async fn test_broadcast_omits_device_iden() {
        let (url, requests) = serve(vec![json_response("{}")]);
        let channel = PushbulletChannel::with_base_url("tok", url);
        channel.send("me", "Job done", "", None).await.unwrap();

        let requests = requests.lock().unwrap();
        assert!(!requests[0].contains("\"device_iden\""));
    }
}
