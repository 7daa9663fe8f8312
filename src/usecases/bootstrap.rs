use std::{
    path::Path,
    sync::{
        mpsc::{self, Receiver},
        Arc,
    },
};

use tokio::runtime::Handle;

use crate::{
    api::{http::HttpTransport, ApiClient, ApiTransport},
    domain::{events::RealtimeEvent, ids::UserId},
    infra::{
        self,
        clock::{Clock, SystemClock},
        config::FileConfigAdapter,
        contracts::ConfigAdapter,
        error::AppError,
    },
    realtime::{RealtimeError, RealtimeSubscriber, RealtimeTransport, TypingNotifier},
    usecases::{context::AppContext, session::MessagingSession, store::MessagingStore},
};

/// Push side of a running session: keep `subscriber` alive and feed `events` to
/// [`MessagingSession::drain_realtime`].
#[derive(Debug)]
pub struct RealtimeLink {
    pub subscriber: RealtimeSubscriber,
    pub events: Receiver<RealtimeEvent>,
}

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let context = build_context(config_path)?;
    let guard = infra::logging::init(&context.config.logging)?;

    Ok(context.with_log_guard(guard))
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config_adapter = FileConfigAdapter::new(config_path);
    let config = config_adapter.load()?;

    Ok(AppContext::new(config))
}

/// Wires the HTTP transport, API client and store for the configured user.
pub fn compose_session(context: &AppContext) -> Result<MessagingSession<HttpTransport>, AppError> {
    let user_id = configured_user(context)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let transport = HttpTransport::new(&context.config.api)?;
    let api = ApiClient::new(transport, context.config.cache.clone(), Arc::clone(&clock));
    let store = MessagingStore::new(user_id, context.config.realtime.typing_expiry());

    Ok(MessagingSession::new(api, store, clock))
}

/// Subscribes the session's user to push events and attaches a typing notifier
/// debounced by `realtime.typing_debounce_ms`.
pub fn connect_realtime<T: ApiTransport>(
    context: &AppContext,
    session: MessagingSession<T>,
    transport: Arc<dyn RealtimeTransport>,
    runtime: Handle,
) -> Result<(MessagingSession<T>, RealtimeLink), RealtimeError> {
    let user_id = session.current_user().clone();
    let user_name = context
        .config
        .session
        .user_name
        .clone()
        .unwrap_or_else(|| user_id.to_string());

    let (sender, events) = mpsc::channel();
    let subscriber =
        RealtimeSubscriber::start(Arc::clone(&transport), user_id.clone(), Arc::new(sender))?;
    let notifier = TypingNotifier::new(
        transport,
        runtime,
        context.config.realtime.typing_debounce(),
        user_id,
        user_name,
    );

    Ok((
        session.with_typing_notifier(notifier),
        RealtimeLink { subscriber, events },
    ))
}

fn configured_user(context: &AppContext) -> Result<UserId, AppError> {
    context
        .config
        .session
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(UserId::from)
        .ok_or_else(|| AppError::ConfigInvalid {
            details: "session.user_id must be set".to_owned(),
        })
}
