use salvo::{
    catcher::Catcher,
    cors::{Any, Cors},
    http::Method,
    oapi::{
        Contact, Info, SecurityRequirement, SecurityScheme,
        security::{Http, HttpAuthScheme},
    },
    prelude::*,
    rate_limiter::{BasicQuota, FixedGuard, MokaStore, RateLimiter, RemoteIpIssuer},
};

use crate::{
    core::{
        audit::{AuditSink, run_audit_worker},
        database::db::establish_connection,
        env::app_env::AppEnv,
        socket::{gateway::RoomGateway, get_socket_router},
        types::app_channel::AppEvent,
        utils::{bcrypt_utils::PasswordHasher, crypto_utils::MessageCipher, jwt_utils::JwtUtils},
    },
    features::{
        chat::{
            flood_guard::FloodGuard, repository::ChatRepositoryImpl, router::get_chat_router,
            service::ChatServiceImpl,
        },
        presence::tracker::PresenceTracker,
        recording::{
            repository::RecordingRepositoryImpl, router::get_recording_router,
            service::RecordingServiceImpl,
        },
        room::{
            repository::RoomRepositoryImpl,
            router::get_room_router,
            seats::SeatLedger,
            service::{RoomService, RoomServiceImpl},
        },
    },
};

#[endpoint(tags("system"))]
async fn health_check(res: &mut Response) {
    res.render("[v1] Classroom signalling service");
}

/// Wires every service once so the seat ledger, presence, flood windows and
/// connection grants are shared by all requests and sockets.
pub async fn get_salvo_service(env: &AppEnv) -> Result<Service, anyhow::Error> {
    let pool = establish_connection(env)?;
    let jwt_utils = JwtUtils::new(&env.jwt);
    let cipher = MessageCipher::from_hex(&env.message_encryption_key)?;

    let (audit, audit_receiver) = AuditSink::new(env.audit_queue_capacity);
    tokio::spawn(run_audit_worker(audit_receiver));

    let room_repository = RoomRepositoryImpl::new(pool.clone());
    let chat_repository = ChatRepositoryImpl::new(pool.clone());
    let recording_repository = RecordingRepositoryImpl::new(pool);

    let presence = PresenceTracker::new();

    let room_service = RoomServiceImpl::new(
        room_repository.clone(),
        jwt_utils.clone(),
        PasswordHasher::new(env.bcrypt_cost),
        env.rooms.clone(),
        SeatLedger::new(),
        presence.clone(),
        audit.clone(),
    );
    // Nothing is connected yet, so any open participant row is stale.
    room_service.release_stale_seats().await?;

    let flood_guard = FloodGuard::new(&env.flood);
    flood_guard.spawn_sweeper();

    let chat_service = ChatServiceImpl::new(
        chat_repository,
        room_repository.clone(),
        cipher,
        flood_guard,
        audit.clone(),
    );
    let recording_service =
        RecordingServiceImpl::new(recording_repository, room_repository, audit);

    let (event_sender, event_receiver) = async_channel::unbounded::<AppEvent>();

    let gateway = RoomGateway::new(
        room_service.clone(),
        chat_service.clone(),
        recording_service.clone(),
        jwt_utils.clone(),
        presence,
        event_sender.clone(),
        env.stop_recording_on_last_leave,
    );
    let (socket_router, io) = get_socket_router(gateway.clone(), event_receiver);

    let limiter = RateLimiter::new(
        FixedGuard::new(),
        MokaStore::new(),
        RemoteIpIssuer,
        BasicQuota::per_second(env.http_rate_limit_per_second),
    );

    let cors = Cors::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PUT,
            Method::OPTIONS,
        ])
        .allow_headers(vec!["Authorization", "Content-Type"])
        .into_handler();

    let health_router = Router::new().path("/health-check").get(health_check);
    let room_router = get_room_router(jwt_utils.clone());
    let chat_router = get_chat_router(jwt_utils.clone());
    let recording_router = get_recording_router(jwt_utils.clone());

    // Recording paths are more specific than `rooms/{room_id}`.
    let router = Router::new()
        .hoop(Logger::new())
        .hoop(affix_state::inject(jwt_utils))
        .hoop(affix_state::inject(env.clone()))
        .hoop(affix_state::inject(event_sender))
        .hoop(affix_state::inject(room_service))
        .hoop(affix_state::inject(chat_service))
        .hoop(affix_state::inject(recording_service))
        .hoop(affix_state::inject(gateway))
        .hoop(affix_state::inject(io))
        .hoop(CatchPanic::new())
        .hoop(CachingHeaders::new())
        .hoop(Compression::new().min_length(1024))
        .hoop(limiter)
        .push(recording_router)
        .push(room_router)
        .push(chat_router)
        .push(health_router);

    let router = Router::new().push(router).push(socket_router);

    let doc_info = Info::new("[v1] Classroom Signalling API", "1.0.0")
        .description("Password-protected rooms, encrypted chat and recording coordination")
        .contact(Contact::new().name("Classroom"));
    let http_auth_schema = Http::new(HttpAuthScheme::Bearer)
        .bearer_format("JWT")
        .description("jsonwebtoken");
    let security_scheme = SecurityScheme::Http(http_auth_schema);
    let security_requirement = SecurityRequirement::new("BearerAuth", ["*"]);
    let doc = OpenApi::new("[v1] Classroom Signalling API", "1.0.0")
        .info(doc_info)
        .add_security_scheme("BearerAuth", security_scheme)
        .security([security_requirement])
        .merge_router(&router);

    let router = Router::new()
        .push(doc.into_router("/api-doc/openapi.json"))
        .push(SwaggerUi::new("/api-doc/openapi.json").into_router("docs"))
        .push(router);

    Ok(Service::new(router)
        .hoop(cors)
        .catcher(Catcher::default().hoop(handle404)))
}

#[handler]
async fn handle404(res: &mut Response, ctrl: &mut FlowCtrl) {
    if StatusCode::NOT_FOUND == res.status_code.unwrap_or(StatusCode::NOT_FOUND) {
        res.render("[v1] Not Found");
        ctrl.skip_rest();
    }
}
