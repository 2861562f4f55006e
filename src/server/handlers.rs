use std::net::IpAddr;
use std::sync::Arc;

use rocket::config::LogLevel;
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::AdHoc;
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::{catch, catchers, get, post, routes, Build, Request, Rocket, State};

use crate::create_paste_store;

use super::config::ServerConfig;
use super::cors::{self, CorsPolicy};
use super::credentials::CredentialGuard;
use super::lifecycle::{AuthFailure, GoneReason, LifecycleError, NewPaste, PasteService};
use super::models::{CreatePasteRequest, CreatedPaste, Envelope, PasteView, UnlockRequest};
use super::sweeper::spawn_expiry_sweeper;

type Reply<T> = (Status, Json<Envelope<T>>);
type Failure = Reply<()>;

pub fn build_rocket(service: PasteService, cors: CorsPolicy) -> Rocket<Build> {
    rocket::build()
        .manage(service)
        .attach(cors)
        .mount("/", routes![create, quick, show, unlock, cors::preflight])
        .register("/", catchers![default_catcher])
}

pub async fn launch(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = create_paste_store(&config.backend)?;
    let cipher = config.cipher.map(Arc::new);
    if cipher.is_none() {
        log::warn!("SECRET_KEY not set, pastes will be stored without encryption");
    }
    let service = PasteService::new(Arc::clone(&store), cipher, CredentialGuard::new());

    let limits = Limits::default()
        .limit("json", config.body_limit_bytes.bytes())
        .limit("string", config.body_limit_bytes.bytes());
    let rocket_config = rocket::Config {
        address: config.address,
        port: config.port,
        limits,
        log_level: LogLevel::Off,
        ..rocket::Config::release_default()
    };

    log::info!(
        "pastebin {} listening on {}:{} ({:?})",
        env!("PASTEBIN_VERSION"),
        config.address,
        config.port,
        config.backend
    );

    let sweep_interval = config.sweep_interval;
    build_rocket(service, CorsPolicy::new(config.cors_origin))
        .configure(rocket_config)
        .attach(AdHoc::on_liftoff("Expiry sweeper", move |_| {
            Box::pin(async move {
                spawn_expiry_sweeper(store, sweep_interval);
            })
        }))
        .launch()
        .await?;

    Ok(())
}

#[post("/pastes", data = "<body>")]
async fn create(
    service: &State<PasteService>,
    ip: Option<IpAddr>,
    body: Result<Json<CreatePasteRequest>, json::Error<'_>>,
) -> Result<Reply<CreatedPaste>, Failure> {
    let body = body
        .map_err(|err| {
            log::debug!("rejected paste body: {err}");
            failure(Status::BadRequest, "Invalid request body")
        })?
        .into_inner();

    let expires_at = match body.expires_at {
        Some(input) => input
            .resolve()
            .map_err(|e| failure(Status::BadRequest, format!("Invalid expiresAt: {e}")))?,
        None => None,
    };

    let request = NewPaste {
        content: body.content,
        password: body.password,
        expires_at,
        expire_after_viewing: body.expire_after_viewing,
        creator_ip: ip.map(|ip| ip.to_string()),
    };

    let id = service
        .create(request)
        .await
        .map_err(|err| lifecycle_failure(err, "Failed to create paste"))?;
    Ok(created(id))
}

#[post("/quick", data = "<body>")]
async fn quick(
    service: &State<PasteService>,
    ip: Option<IpAddr>,
    body: String,
) -> Result<Reply<CreatedPaste>, Failure> {
    let id = service
        .create_quick(body, ip.map(|ip| ip.to_string()))
        .await
        .map_err(|err| lifecycle_failure(err, "Failed to create paste"))?;
    Ok(created(id))
}

#[get("/pastes/<id>")]
async fn show(service: &State<PasteService>, id: &str) -> Result<Reply<PasteView>, Failure> {
    retrieve(service, id, None).await
}

#[post("/pastes/<id>", data = "<body>")]
async fn unlock(
    service: &State<PasteService>,
    id: &str,
    body: Result<Json<UnlockRequest>, json::Error<'_>>,
) -> Result<Reply<PasteView>, Failure> {
    let password = match body {
        Ok(body) => body.into_inner().password,
        Err(err) => {
            // An unreadable body only matters once the paste turns out to be protected.
            let paste = service
                .check_available(id)
                .await
                .map_err(|gate| lifecycle_failure(gate, "Failed to retrieve paste"))?;
            if paste.is_protected() {
                log::debug!("rejected unlock body for paste {id}: {err}");
                return Err(failure(Status::BadRequest, "Invalid authentication request"));
            }
            None
        }
    };
    retrieve(service, id, password.as_deref()).await
}

async fn retrieve(
    service: &PasteService,
    id: &str,
    password: Option<&str>,
) -> Result<Reply<PasteView>, Failure> {
    let paste = service
        .retrieve(id, password)
        .await
        .map_err(|err| lifecycle_failure(err, "Failed to retrieve paste"))?;
    Ok((
        Status::Ok,
        Json(Envelope::success(
            Status::Ok,
            "Paste retrieved successfully",
            PasteView::from(paste),
        )),
    ))
}

#[catch(default)]
fn default_catcher(status: Status, _request: &Request<'_>) -> Json<Envelope<()>> {
    Json(Envelope::failure(
        status,
        status.reason().unwrap_or("Unexpected error"),
    ))
}

fn created(id: String) -> Reply<CreatedPaste> {
    (
        Status::Created,
        Json(Envelope::success(
            Status::Created,
            "Paste created successfully",
            CreatedPaste { id },
        )),
    )
}

fn failure(status: Status, message: impl Into<String>) -> Failure {
    (status, Json(Envelope::failure(status, message)))
}

fn lifecycle_failure(err: LifecycleError, internal_message: &str) -> Failure {
    match err {
        LifecycleError::Validation(message) => failure(Status::BadRequest, message),
        LifecycleError::NotFound => failure(Status::NotFound, "This paste does not exist."),
        LifecycleError::Gone(GoneReason::Consumed) => failure(
            Status::Gone,
            "This paste has been viewed and is no longer available.",
        ),
        LifecycleError::Gone(GoneReason::Expired) => {
            failure(Status::Gone, "This paste has expired.")
        }
        LifecycleError::Unauthorized(AuthFailure::MissingPassword) => {
            failure(Status::Unauthorized, "This paste is password protected.")
        }
        LifecycleError::Unauthorized(AuthFailure::WrongPassword) => failure(
            Status::Unauthorized,
            "The password you entered is incorrect.",
        ),
        LifecycleError::Internal(detail) => {
            log::error!("{internal_message}: {detail}");
            failure(Status::InternalServerError, internal_message)
        }
    }
}
