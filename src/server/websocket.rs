use crate::dispatcher::Dispatcher;
use crate::models::chat::SESSION_TIMESTAMP_FORMAT;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::Session;
use chrono::Local;
use futures::{ Sink, SinkExt, StreamExt };
use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use log::{ debug, error, info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response };
use tokio_tungstenite::tungstenite::http::response::Response as HttpResponse;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

type ConnectionLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct SessionSettings {
    pub api_key: Option<String>,
    pub reply_prefix: Option<String>,
}

pub struct SessionServer {
    addr: String,
    dispatcher: Dispatcher,
    settings: SessionSettings,
    limiter: Arc<ConnectionLimiter>,
    tls_acceptor: Option<TlsAcceptor>,
}

impl SessionServer {
    pub fn new(
        addr: String,
        dispatcher: Dispatcher,
        settings: SessionSettings,
        connections_per_second: NonZeroU32,
        tls_acceptor: Option<TlsAcceptor>
    ) -> Self {
        let mut settings = settings;
        settings.api_key = settings.api_key.filter(|k| !k.trim().is_empty());
        if settings.api_key.is_some() {
            info!("Session server configured with API Key authentication.");
        } else {
            warn!("Session server configured WITHOUT API Key authentication. Connections are open.");
        }

        Self {
            addr,
            dispatcher,
            settings,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(connections_per_second))),
            tls_acceptor,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.addr).await?;
        let protocol = if self.tls_acceptor.is_some() { "WSS" } else { "WS" };
        info!("{} session server listening on: {}", protocol, self.addr);

        loop {
            let (stream, peer) = listener.accept().await?;

            if self.limiter.check().is_err() {
                warn!("Session connection rate limit exceeded for {}. Dropping connection.", peer);
                continue;
            }

            info!("Incoming session connection from: {}", peer);
            let dispatcher = self.dispatcher.clone();
            let settings = self.settings.clone();
            let tls_acceptor = self.tls_acceptor.clone();

            tokio::spawn(async move {
                let result = match tls_acceptor {
                    Some(acceptor) =>
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => {
                                debug!("TLS handshake successful for {}", peer);
                                process_connection(peer, tls_stream, dispatcher, settings).await
                            }
                            Err(e) => {
                                error!("TLS handshake error for {}: {}", peer, e);
                                Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                            }
                        }
                    None => process_connection(peer, stream, dispatcher, settings).await,
                };

                if let Err(e) = result {
                    error!("Failed to process session connection for {}: {}", peer, e);
                }
            });
        }
    }
}

/// Looks for the key in the `X-API-Key` header first, then in the `api_key`
/// query parameter.
pub(crate) fn provided_api_key(req: &Request) -> Option<String> {
    let header = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if header.is_some() {
        return header;
    }

    req.uri()
        .query()?
        .split('&')
        .find_map(|pair| {
            let mut kv = pair.splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("api_key"), Some(value)) => Some(value.to_string()),
                _ => None,
            }
        })
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    dispatcher: Dispatcher,
    settings: SessionSettings
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let required_api_key = settings.api_key.clone();
    let auth_callback = |
        req: &Request,
        response: Response
    | -> Result<Response, HttpResponse<Option<String>>> {
        let Some(required) = required_api_key.as_deref() else {
            return Ok(response);
        };
        if provided_api_key(req).as_deref() != Some(required) {
            warn!("{}: bad or missing API key", peer);
            let mut resp = HttpResponse::new(Some("Unauthorized".to_string()));
            *resp.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(resp);
        }
        info!("{} authenticated", peer);
        Ok(response)
    };

    let ws = accept_hdr_async(stream, auth_callback).await.map_err(|e| {
        error!("Handshake failed for {}: {}", peer, e);
        Box::new(e) as Box<dyn Error + Send + Sync>
    })?;
    handle_session(peer, ws, dispatcher, settings.reply_prefix).await;
    Ok(())
}

async fn send_frame<T>(tx: &mut T, frame: &ServerMessage) -> bool
    where T: Sink<Message> + Unpin, T::Error: std::fmt::Display
{
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to encode session frame: {}", e);
            return false;
        }
    };
    match tx.send(Message::Text(json)).await {
        Ok(()) => true,
        Err(e) => {
            error!("Error sending session frame: {}", e);
            false
        }
    }
}

pub async fn handle_session<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    dispatcher: Dispatcher,
    reply_prefix: Option<String>
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    let mut session = Session::start(reply_prefix);
    info!("Assigned session {} to {}", session.id(), peer);

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                info!("Session connection for {} ended: {}", peer, e);
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!("Message from {} exceeds size limit ({} > {})", peer, message.len(), MAX_MESSAGE_SIZE);
            let frame = ServerMessage::Error { message: "Message too large".to_string() };
            send_frame(&mut tx, &frame).await;
            break;
        }

        match message {
            Message::Text(text) => {
                let client_message = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        let frame = ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        };
                        if !send_frame(&mut tx, &frame).await {
                            break;
                        }
                        continue;
                    }
                };

                let frame = match client_message {
                    ClientMessage::Chat { content } if content.trim().is_empty() => {
                        ServerMessage::Error { message: "Message is empty".to_string() }
                    }
                    ClientMessage::Chat { content } => {
                        if !send_frame(&mut tx, &ServerMessage::Processing).await {
                            break;
                        }
                        let (next, reply) = session.exchange(&dispatcher, &content).await;
                        session = next;
                        match reply {
                            Some(content) =>
                                ServerMessage::Response {
                                    content,
                                    timestamp: Local::now().format(SESSION_TIMESTAMP_FORMAT).to_string(),
                                },
                            None => ServerMessage::Error { message: "Message is empty".to_string() },
                        }
                    }
                    ClientMessage::Reset => {
                        session = session.reset();
                        ServerMessage::Cleared
                    }
                    ClientMessage::History =>
                        ServerMessage::History { messages: session.messages().to_vec() },
                };

                if !send_frame(&mut tx, &frame).await {
                    break;
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                if tx.send(Message::Pong(ping_data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
            }
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
            }
            Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    info!("Session {} closed for {}", session.id(), peer);
}
