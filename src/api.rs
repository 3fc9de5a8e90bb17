// src/api.rs
use crate::accounts;
use crate::auth::{with_auth, Claims, TokenService};
use crate::error::ApiError;
use crate::models::{LoginRequest, LoginResponse, MessageResponse, Order, SignupRequest};
use crate::store::Store;
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

pub const LIVENESS_MESSAGE: &str = "INVESTA backend is running!";

/// Largest JSON body accepted on any route.
pub const MAX_BODY_BYTES: u64 = 100 * 1024;

pub fn routes(
    store: Arc<dyn Store>,
    tokens: Arc<TokenService>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let root = warp::path::end()
        .and(warp::get())
        .map(|| LIVENESS_MESSAGE);

    let signup = warp::path!("signup")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(json_body())
        .and_then(signup_handler);

    let login = warp::path!("login")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(with_tokens(tokens.clone()))
        .and(json_body())
        .and_then(login_handler);

    let holdings = warp::path!("allHoldings")
        .and(warp::get())
        .and(with_auth(tokens.clone()))
        .and(with_store(store.clone()))
        .and_then(all_holdings_handler);

    let positions = warp::path!("allPositions")
        .and(warp::get())
        .and(with_auth(tokens.clone()))
        .and(with_store(store.clone()))
        .and_then(all_positions_handler);

    let new_order = warp::path!("newOrder")
        .and(warp::post())
        .and(with_auth(tokens))
        .and(with_store(store))
        .and(json_body())
        .and_then(new_order_handler);

    root.or(signup)
        .or(login)
        .or(holdings)
        .or(positions)
        .or(new_order)
        .recover(handle_rejection)
}

pub fn cors(origins: &[String]) -> warp::cors::Builder {
    warp::cors()
        .allow_origins(origins.iter().map(String::as_str))
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_headers(vec!["Content-Type", "Authorization"])
        .allow_credentials(true)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn with_store(
    store: Arc<dyn Store>,
) -> impl Filter<Extract = (Arc<dyn Store>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_tokens(
    tokens: Arc<TokenService>,
) -> impl Filter<Extract = (Arc<TokenService>,), Error = Infallible> + Clone {
    warp::any().map(move || tokens.clone())
}

async fn signup_handler(
    store: Arc<dyn Store>,
    request: SignupRequest,
) -> Result<impl Reply, Rejection> {
    accounts::signup(store.as_ref(), request)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&MessageResponse::ok("Account created successfully!")),
        StatusCode::CREATED,
    ))
}

async fn login_handler(
    store: Arc<dyn Store>,
    tokens: Arc<TokenService>,
    request: LoginRequest,
) -> Result<impl Reply, Rejection> {
    let session = accounts::login(store.as_ref(), &tokens, request)
        .await
        .map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        token: session.token,
        user: session.user,
    }))
}

async fn all_holdings_handler(
    claims: Claims,
    store: Arc<dyn Store>,
) -> Result<impl Reply, Rejection> {
    let holdings = store
        .all_holdings()
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    debug!("Listed {} holdings for {}", holdings.len(), claims.user_id);
    Ok(warp::reply::json(&holdings))
}

async fn all_positions_handler(
    claims: Claims,
    store: Arc<dyn Store>,
) -> Result<impl Reply, Rejection> {
    let positions = store
        .all_positions()
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    debug!("Listed {} positions for {}", positions.len(), claims.user_id);
    Ok(warp::reply::json(&positions))
}

async fn new_order_handler(
    claims: Claims,
    store: Arc<dyn Store>,
    order: Order,
) -> Result<impl Reply, Rejection> {
    let summary = format!("{} {} x {} @ {}", order.mode, order.name, order.qty, order.price);
    store
        .insert_order(order)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    info!("Order saved for {}: {}", claims.user_id, summary);
    Ok("Order saved!")
}

/// Turns every rejection into `{success: false, message}` with a fixed
/// message. Internal detail only goes to the log.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api_error) = err.find::<ApiError>() {
        if api_error.status().is_server_error() {
            error!("Request failed: {}", api_error);
        }
        (api_error.status(), api_error.public_message())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large".to_string(),
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "Content-Length required".to_string(),
        )
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid request body".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected a JSON body".to_string(),
        )
    } else if err.find::<warp::reject::InvalidHeader>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid request header".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&MessageResponse::failed(message)),
        status,
    ))
}
