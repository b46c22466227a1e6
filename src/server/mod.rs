pub mod api;
pub mod tls;
pub mod websocket;

use crate::cli::Args;
use crate::dispatcher::Dispatcher;
use crate::error::ConfigError;
use crate::history::ConversationLog;
use self::api::AppState;
use self::tls::{ load_tls_config, TlsPaths };
use self::websocket::{ SessionServer, SessionSettings };
use log::info;
use std::error::Error;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

pub struct Server {
    args: Args,
    api_dispatcher: Dispatcher,
    session_dispatcher: Dispatcher,
    conversation_log: Arc<dyn ConversationLog>,
}

impl Server {
    pub fn new(
        args: Args,
        api_dispatcher: Dispatcher,
        session_dispatcher: Dispatcher,
        conversation_log: Arc<dyn ConversationLog>
    ) -> Self {
        Self {
            args,
            api_dispatcher,
            session_dispatcher,
            conversation_log,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let tls = TlsPaths::from_args(&self.args)?;

        let state = AppState {
            dispatcher: self.api_dispatcher.clone(),
            conversation_log: Arc::clone(&self.conversation_log),
            page_size: self.args.history_page_size,
        };
        let app = api::router(state, &self.args.cors_origin)?;
        let http = api::serve_http(&self.args.http_addr, app, tls.clone());

        match &self.args.session_addr {
            Some(session_addr) => {
                let session_server = self.session_server(session_addr, tls.as_ref())?;
                tokio::try_join!(http, session_server.run())?;
            }
            None => {
                info!("Interactive session server disabled (no --session-addr).");
                http.await?;
            }
        }

        Ok(())
    }

    fn session_server(
        &self,
        addr: &str,
        tls: Option<&TlsPaths>
    ) -> Result<SessionServer, ConfigError> {
        let rate = NonZeroU32::new(self.args.session_connections_per_second).ok_or_else(||
            ConfigError::Invalid("--session-connections-per-second must be at least 1".into())
        )?;
        let tls_acceptor = match tls {
            Some(paths) => Some(TlsAcceptor::from(load_tls_config(paths)?)),
            None => None,
        };
        let settings = SessionSettings {
            api_key: self.args.server_api_key.clone(),
            reply_prefix: Some(self.args.session_reply_prefix.clone()),
        };

        Ok(
            SessionServer::new(
                addr.to_string(),
                self.session_dispatcher.clone(),
                settings,
                rate,
                tls_acceptor
            )
        )
    }
}
