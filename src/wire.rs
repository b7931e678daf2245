use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use futures::{Sink, SinkExt};
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::response::NotificationResponse;
use pgwire::messages::PgWireBackendMessage;
use ulid::Ulid;

use crate::auth::HearthAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

/// Per-connection handler. LISTEN subscriptions live here: each LISTEN
/// spawns a forwarder task that buffers broadcast payloads, and every
/// query drains the buffer to the client as NotificationResponse frames
/// before returning its own result.
pub struct HearthHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<HearthQueryParser>,
    pending: Arc<Mutex<Vec<(String, String)>>>,
    subscriptions: Mutex<HashMap<String, tokio::task::JoinHandle<()>>>,
}

impl HearthHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(HearthQueryParser),
            pending: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    fn listen(&self, engine: &Engine, channel: String) -> PgWireResult<()> {
        let key = parse_channel(&channel)?;
        let mut rx = engine.notify.subscribe(key);
        let pending = self.pending.clone();
        let chan = channel.clone();
        let task = tokio::spawn(async move {
            while let Ok(payload) = rx.recv().await {
                pending.lock().unwrap().push((chan.clone(), payload));
            }
        });
        if let Some(old) = self.subscriptions.lock().unwrap().insert(channel, task) {
            old.abort();
        }
        Ok(())
    }

    fn unlisten(&self, channel: &str) {
        if let Some(task) = self.subscriptions.lock().unwrap().remove(channel) {
            task.abort();
        }
    }

    fn unlisten_all(&self) {
        for (_, task) in self.subscriptions.lock().unwrap().drain() {
            task.abort();
        }
    }

    /// Forward buffered notifications before the next query result.
    async fn flush_notifications<C>(&self, client: &mut C) -> PgWireResult<()>
    where
        C: Sink<PgWireBackendMessage> + Unpin + Send,
        PgWireError: From<C::Error>,
    {
        let drained: Vec<(String, String)> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain(..).collect()
        };
        for (channel, payload) in drained {
            client
                .send(PgWireBackendMessage::NotificationResponse(
                    NotificationResponse::new(0, channel, payload),
                ))
                .await?;
        }
        Ok(())
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = std::time::Instant::now();
        let result = self.dispatch(engine, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertProperty {
                host,
                title,
                price_per_night,
                max_guests,
                category,
                available_from,
                available_to,
            } => {
                let id = engine
                    .list_property(
                        host,
                        title,
                        price_per_night,
                        max_guests,
                        category,
                        available_from,
                        available_to,
                    )
                    .await
                    .map_err(engine_err)?;
                Ok(vec![id_response(id)])
            }
            Command::UpdateProperty { id, actor, patch } => {
                engine
                    .update_property(id, actor, patch)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteProperty { id, actor } => {
                engine.delist_property(id, actor).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertBlockedDates { property_id, actor, dates } => {
                let count = dates.len();
                engine
                    .block_dates(property_id, actor, dates)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(count))])
            }
            Command::DeleteBlockedDates { property_id, actor, dates } => {
                let count = dates.len();
                engine
                    .unblock_dates(property_id, actor, dates)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(count))])
            }
            Command::InsertBooking {
                property_id,
                guest,
                range,
                payment_method,
            } => {
                let (id, session) = engine
                    .create_booking(property_id, guest, range, payment_method)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(booking_created_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&id.to_string())?;
                encoder.encode_field(&session.as_ref().map(|s| s.session_id.as_str()))?;
                encoder.encode_field(&session.as_ref().map(|s| s.redirect_url.as_str()))?;
                let rows = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::ConfirmPayment { session_ref } => {
                let id = engine
                    .confirm_payment(&session_ref)
                    .await
                    .map_err(engine_err)?;
                let _ = id;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::CancelBooking { id, actor } => {
                engine.cancel_booking(id, actor).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::InsertWaitlist { property_id, guest } => {
                let id = engine
                    .join_waitlist(property_id, guest)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![id_response(id)])
            }
            Command::ConfirmWaitlist { id, actor } => {
                engine.confirm_waitlist(id, actor).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::WithdrawWaitlist { id, actor } => {
                engine
                    .withdraw_waitlist(id, actor)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertConversation { property_id, guest } => {
                let id = engine
                    .open_conversation(property_id, guest)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![id_response(id)])
            }
            Command::InsertMessage {
                conversation_id,
                sender,
                content,
            } => {
                let id = engine
                    .send_message(conversation_id, sender, content)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![id_response(id)])
            }
            Command::SelectProperties { filter } => {
                let properties = engine.search_properties(&filter).await;
                let schema = Arc::new(properties_schema());
                let rows: Vec<PgWireResult<_>> = properties
                    .into_iter()
                    .map(|p| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&p.id.to_string())?;
                        encoder.encode_field(&p.host.to_string())?;
                        encoder.encode_field(&p.title)?;
                        encoder.encode_field(&p.price_per_night.to_string())?;
                        encoder.encode_field(&(p.max_guests as i64))?;
                        encoder.encode_field(&p.category)?;
                        encoder.encode_field(&p.is_available)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectAvailability { property_id, range } => {
                let verdict = engine
                    .check_property(property_id, &range)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(availability_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&property_id.to_string())?;
                encoder.encode_field(&verdict.available)?;
                encoder.encode_field(&verdict.reason.map(|r| r.to_string()))?;
                let rows = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectBookings {
                property_id,
                guest,
                session_ref,
            } => {
                let bookings = if let Some(s) = session_ref {
                    vec![engine.booking_by_session(&s).await.map_err(engine_err)?]
                } else if let Some(pid) = property_id {
                    let mut all = engine.property_bookings(pid).await.map_err(engine_err)?;
                    if let Some(g) = guest {
                        all.retain(|b| b.guest == g);
                    }
                    all
                } else if let Some(g) = guest {
                    engine.guest_bookings(g).await
                } else {
                    Vec::new()
                };

                let schema = Arc::new(bookings_schema());
                let rows: Vec<PgWireResult<_>> = bookings
                    .into_iter()
                    .map(|b| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.id.to_string())?;
                        encoder.encode_field(&b.property_id.to_string())?;
                        encoder.encode_field(&b.guest.to_string())?;
                        encoder.encode_field(&b.check_in.to_string())?;
                        encoder.encode_field(&b.check_out.to_string())?;
                        encoder.encode_field(&b.total_price.to_string())?;
                        encoder.encode_field(&status_label(b.status))?;
                        encoder.encode_field(&b.is_paid)?;
                        encoder.encode_field(&b.session_ref)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectWaitlist { property_id } => {
                let entries = engine
                    .property_waitlist(property_id)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(waitlist_schema());
                let rows: Vec<PgWireResult<_>> = entries
                    .into_iter()
                    .map(|e| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&e.id.to_string())?;
                        encoder.encode_field(&e.property_id.to_string())?;
                        encoder.encode_field(&e.guest.to_string())?;
                        encoder.encode_field(&e.created_at)?;
                        encoder.encode_field(&e.notified_at)?;
                        encoder.encode_field(&e.deadline)?;
                        encoder.encode_field(&waitlist_status_label(e.status))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectMessages {
                conversation_id,
                actor,
            } => {
                let messages = engine
                    .conversation_messages(conversation_id, actor)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(messages_schema());
                let rows: Vec<PgWireResult<_>> = messages
                    .into_iter()
                    .map(|m| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&m.id.to_string())?;
                        encoder.encode_field(&m.conversation_id.to_string())?;
                        encoder.encode_field(&m.sender.to_string())?;
                        encoder.encode_field(&m.content)?;
                        encoder.encode_field(&m.created_at)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::Listen { channel } => {
                self.listen(engine, channel)?;
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
            Command::Unlisten { channel } => {
                self.unlisten(&channel);
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
            Command::UnlistenAll => {
                self.unlisten_all();
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
        }
    }
}

impl Drop for HearthHandler {
    fn drop(&mut self) {
        for (_, task) in self.subscriptions.lock().unwrap().drain() {
            task.abort();
        }
    }
}

/// Channels are `guest_<ulid>`, `property_<ulid>` or `conversation_<ulid>`.
fn parse_channel(channel: &str) -> PgWireResult<Ulid> {
    let id_str = channel
        .strip_prefix("guest_")
        .or_else(|| channel.strip_prefix("property_"))
        .or_else(|| channel.strip_prefix("conversation_"))
        .ok_or_else(|| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "42000".into(),
                format!(
                    "invalid channel: {channel} (expected guest_/property_/conversation_{{id}})"
                ),
            )))
        })?;
    Ulid::from_string(id_str).map_err(|e| {
        PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".into(),
            "42000".into(),
            format!("bad ULID in channel: {e}"),
        )))
    })
}

fn id_response(id: Ulid) -> Response {
    let schema = Arc::new(id_schema());
    let mut encoder = DataRowEncoder::new(schema.clone());
    let row = encoder
        .encode_field(&id.to_string())
        .map(|()| encoder.take_row());
    Response::Query(QueryResponse::new(schema, stream::iter(vec![row])))
}

fn status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "pending",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Canceled => "canceled",
    }
}

fn waitlist_status_label(status: WaitlistStatus) -> &'static str {
    match status {
        WaitlistStatus::Enqueued => "enqueued",
        WaitlistStatus::Notified => "notified",
        WaitlistStatus::Confirmed => "confirmed",
        WaitlistStatus::Expired => "expired",
        WaitlistStatus::Withdrawn => "withdrawn",
    }
}

// ── Result schemas ───────────────────────────────────────────────

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn bool_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::BOOL, FieldFormat::Text)
}

fn id_schema() -> Vec<FieldInfo> {
    vec![text_field("id")]
}

fn booking_created_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("session_ref"),
        text_field("redirect_url"),
    ]
}

fn properties_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("host"),
        text_field("title"),
        text_field("price_per_night"),
        int_field("max_guests"),
        text_field("category"),
        bool_field("is_available"),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        text_field("property_id"),
        bool_field("available"),
        text_field("reason"),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("property_id"),
        text_field("guest"),
        text_field("check_in"),
        text_field("check_out"),
        text_field("total_price"),
        text_field("status"),
        bool_field("is_paid"),
        text_field("session_ref"),
    ]
}

fn waitlist_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("property_id"),
        text_field("guest"),
        int_field("created_at"),
        int_field("notified_at"),
        int_field("deadline"),
        text_field("status"),
    ]
}

fn messages_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("conversation_id"),
        text_field("sender"),
        text_field("content"),
        int_field("created_at"),
    ]
}

/// Best-effort schema guess for Describe before execution.
fn schema_for_sql(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if !upper.contains("SELECT") {
        return vec![];
    }
    if upper.contains("AVAILABILITY") {
        availability_schema()
    } else if upper.contains("PROPERTIES") {
        properties_schema()
    } else if upper.contains("BOOKINGS") {
        bookings_schema()
    } else if upper.contains("WAITLIST") {
        waitlist_schema()
    } else if upper.contains("MESSAGES") {
        messages_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for HearthHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.flush_notifications(client).await?;
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct HearthQueryParser;

#[async_trait]
impl QueryParser for HearthQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for_sql(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for HearthHandler {
    type Statement = String;
    type QueryParser = HearthQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.flush_notifications(client).await?;
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_command(&engine, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for_sql(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for_sql(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct HearthFactory {
    handler: Arc<HearthHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<HearthAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl HearthFactory {
    /// One factory per connection: the handler carries that connection's
    /// LISTEN subscriptions.
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = HearthAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(HearthHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for HearthFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one pgwire connection to completion. The factory (and with it the
/// connection's LISTEN subscriptions) is dropped when the socket closes.
pub async fn process_connection(
    socket: tokio::net::TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<pgwire::tokio::TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(HearthFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    let code = match &e {
        EngineError::NotFound(_) | EngineError::UnknownSession(_) => "P0002",
        EngineError::AlreadyExists(_) | EngineError::AlreadyEnqueued(_) => "23505",
        EngineError::Unavailable(_) => "23P01",
        EngineError::NotOwner(_) | EngineError::NotParticipant(_) => "42501",
        EngineError::InvalidRange | EngineError::InvalidPrice(_) => "22000",
        EngineError::AlreadyConfirmed(_) | EngineError::Expired(_) | EngineError::NotNotified(_) => {
            "55000"
        }
        EngineError::PaymentInitFailed(_) | EngineError::PaymentIncomplete(_) => "58000",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::WalError(_) => "58030",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
