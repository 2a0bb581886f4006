use actix_web::{web, HttpResponse};

use super::{checked_page, ok, paged, validated, ApiError, AppState, OrNotFound};
use crate::auth::AuthUser;
use crate::models::*;
use crate::social::{annotate_users, resolve_single};
use crate::store::StoreError;

// ==================== Auth Endpoints ====================

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    validated(body.validate(), "Register Error")?;
    let username = body.username.trim();
    let email = body.email.trim().to_lowercase();

    if state.store.user_exists(username, &email)? {
        return Err(ApiError::conflict("Register Error", "Username or email is already taken"));
    }

    let password_hash = state.auth_service.hash_password(&body.password)?;
    let mut user = User::new(username, body.display_name.trim(), &email, password_hash);
    state.store.create_user(&mut user).map_err(|e| match e {
        e if e.is_unique_violation() => ApiError::conflict("Register Error", "Username or email is already taken"),
        e => ApiError::from(e),
    })?;

    let access_token = state.auth_service.generate_token(&user.id)?;
    log::info!("Registered user {}", user.username);

    Ok(HttpResponse::Created().json(ApiResponse::success(
        LoginResponse { user, access_token },
        "Registered successfully",
    )))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = match state.store.get_user_by_email(&body.email.trim().to_lowercase()) {
        Ok(user) => user,
        Err(StoreError::NotFound(_)) => {
            return Err(ApiError::validation("Invalid Credentials", "No account with this email"));
        }
        Err(e) => return Err(e.into()),
    };

    let valid = state
        .auth_service
        .verify_password(&body.password, &user.password_hash)
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::validation("Wrong Password", "The password is incorrect"));
    }

    let access_token = state.auth_service.generate_token(&user.id)?;
    Ok(ok(LoginResponse { user, access_token }, "Logged in successfully"))
}

// ==================== User Endpoints ====================

pub async fn list_users(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<UsersQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = checked_page(query.pagination(), "Get Users Error")?;
    let (users, count) = state.store.list_users(query.search_text.as_deref(), &page)?;
    let users = annotate_users(&state.store, &auth.user_id, users)?;
    Ok(ok(paged("users", users, count, &page)?, "Users fetched"))
}

pub async fn current_user(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let user = state
        .store
        .get_user(&auth.user_id)
        .or_not_found("Get User Error", "User not found")?;
    Ok(ok(user, "User fetched"))
}

pub async fn get_user(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = state
        .store
        .get_user_by_username(&path)
        .or_not_found("Get User Error", "User not found")?;
    let relationship = resolve_single(&state.store, &auth.user_id, &user.id)?;
    Ok(ok(AuthorView { user, relationship }, "User fetched"))
}

pub async fn update_profile(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if id != auth.user_id {
        return Err(ApiError::forbidden("Update User Error", "You can only update your own profile"));
    }
    if matches!(&body.display_name, Some(name) if name.trim().is_empty()) {
        return Err(ApiError::validation("Update User Error", "displayName must not be empty"));
    }
    let user = state
        .store
        .update_profile(&id, &body)
        .or_not_found("Update User Error", "User not found")?;
    Ok(ok(user, "Profile updated"))
}
