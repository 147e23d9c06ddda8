//! WebSocket transport layer.
//!
//! Each accepted socket gets its own task. The first text frame must be
//! an `auth` event; once the token resolves to an identity the task
//! registers with the session actor and then just shovels frames: client
//! events inbound over the session channel, server events outbound from
//! this connection's private channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use shared::protocol::{ClientEvent, ServerEvent};

use crate::session::SessionMessage;

/// How long a fresh socket may sit unauthenticated.
const AUTH_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

/// Maps an auth token to a player identity.
pub trait TokenResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<Identity>;
}

/// Development resolver: the token itself carries `user_id:username`.
pub struct DevTokenResolver;

impl TokenResolver for DevTokenResolver {
    fn resolve(&self, token: &str) -> Option<Identity> {
        let (user_id, username) = token.split_once(':')?;
        if user_id.is_empty() || username.is_empty() {
            return None;
        }
        Some(Identity {
            user_id: user_id.to_string(),
            username: username.to_string(),
        })
    }
}

pub struct NetworkServer {
    listener: TcpListener,
    session_tx: mpsc::UnboundedSender<SessionMessage>,
    resolver: Arc<dyn TokenResolver>,
}

impl NetworkServer {
    pub async fn bind(
        addr: &str,
        session_tx: mpsc::UnboundedSender<SessionMessage>,
        resolver: Arc<dyn TokenResolver>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on {}", addr);
        Ok(NetworkServer {
            listener,
            session_tx,
            resolver,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener fails.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let session_tx = self.session_tx.clone();
            let resolver = self.resolver.clone();
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, addr, session_tx, resolver).await {
                    debug!("connection {} closed: {}", addr, err);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    session_tx: mpsc::UnboundedSender<SessionMessage>,
    resolver: Arc<dyn TokenResolver>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ws = accept_async(stream).await?;
    let (mut writer, mut reader) = ws.split();

    let identity = match authenticate(&mut reader, resolver.as_ref()).await {
        Ok(identity) => identity,
        Err(reason) => {
            warn!("auth failed for {}: {}", addr, reason);
            let event = ServerEvent::Error {
                message: reason.to_string(),
            };
            let _ = writer.send(Message::Text(serde_json::to_string(&event)?)).await;
            let _ = writer.send(Message::Close(None)).await;
            return Ok(());
        }
    };
    debug!("{} authenticated as {}", addr, identity.user_id);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    session_tx.send(SessionMessage::Connected {
        user_id: identity.user_id.clone(),
        username: identity.username.clone(),
        sender: event_tx,
    })?;

    loop {
        tokio::select! {
            outbound = event_rx.recv() => {
                let Some(event) = outbound else { break };
                let text = serde_json::to_string(&event)?;
                if writer.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            inbound = reader.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                session_tx.send(SessionMessage::Event {
                                    user_id: identity.user_id.clone(),
                                    event,
                                })?;
                            }
                            Err(err) => {
                                let event = ServerEvent::Error {
                                    message: format!("Malformed event: {}", err),
                                };
                                let _ = writer
                                    .send(Message::Text(serde_json::to_string(&event)?))
                                    .await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = writer.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary frames are ignored
                    Some(Err(err)) => {
                        debug!("read error from {}: {}", addr, err);
                        break;
                    }
                }
            }
        }
    }

    session_tx.send(SessionMessage::Disconnected {
        user_id: identity.user_id,
    })?;
    Ok(())
}

async fn authenticate<S>(
    reader: &mut S,
    resolver: &dyn TokenResolver,
) -> Result<Identity, &'static str>
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let frame = tokio::time::timeout(AUTH_DEADLINE, reader.next())
        .await
        .map_err(|_| "Authentication timed out")?
        .ok_or("Connection closed before authentication")?
        .map_err(|_| "Socket error during authentication")?;

    let Message::Text(text) = frame else {
        return Err("Expected a text auth frame");
    };
    let Ok(ClientEvent::Authenticate { token }) = serde_json::from_str::<ClientEvent>(&text) else {
        return Err("First event must be auth");
    };
    resolver.resolve(&token).ok_or("Invalid token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_resolver_splits_token() {
        let identity = DevTokenResolver.resolve("u1:alice").unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn test_dev_resolver_rejects_bad_tokens() {
        assert!(DevTokenResolver.resolve("").is_none());
        assert!(DevTokenResolver.resolve("nocolon").is_none());
        assert!(DevTokenResolver.resolve(":alice").is_none());
        assert!(DevTokenResolver.resolve("u1:").is_none());
    }

    #[test]
    fn test_usernames_may_contain_colons() {
        let identity = DevTokenResolver.resolve("u1:a:b").unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.username, "a:b");
    }
}
