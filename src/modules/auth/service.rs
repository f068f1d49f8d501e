use super::dto::{AuthResponse, LoginRequest, RegisterRequest, TokenClaims, UserResponse};
use super::repository::AuthRepository;
use crate::common::security;
use crate::state::AppState;
use anyhow::{Result, anyhow};
use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
use uuid::Uuid;

const ACCESS_TOKEN_TTL_SECS: usize = 24 * 60 * 60;

pub struct AuthService;

impl AuthService {
    pub async fn register(state: AppState, req: RegisterRequest) -> Result<UserResponse> {
        if AuthRepository::find_user_by_email(&state.db, &req.email)
            .await?
            .is_some()
        {
            return Err(anyhow!("Email already exists"));
        }

        if AuthRepository::find_user_by_username(&state.db, &req.username)
            .await?
            .is_some()
        {
            return Err(anyhow!("Username already exists"));
        }

        let password_hash = security::hash_password(&req.password)?;

        let user =
            AuthRepository::create_user(&state.db, &req.username, &req.email, &password_hash)
                .await?;

        Ok(user.into())
    }

    pub async fn login(state: AppState, req: LoginRequest) -> Result<AuthResponse> {
        let user = AuthRepository::find_user_by_email(&state.db, &req.email)
            .await?
            .ok_or_else(|| anyhow!("Invalid credentials"))?;

        security::verify_password(&req.password, &user.password_hash)
            .map_err(|_| anyhow!("Invalid credentials"))?;

        let access_token = Self::create_access_token(user.id, &state.config.jwt_secret)?;

        Ok(AuthResponse {
            access_token,
            user: user.into(),
        })
    }

    pub async fn get_me(state: AppState, user_id: Uuid) -> Result<UserResponse> {
        let user = AuthRepository::find_user_by_id(&state.db, user_id)
            .await?
            .ok_or_else(|| anyhow!("User not found"))?;
        Ok(user.into())
    }

    fn create_access_token(user_id: Uuid, secret: &str) -> Result<String> {
        let now = get_current_timestamp() as usize;
        let claims = TokenClaims {
            sub: user_id,
            exp: now + ACCESS_TOKEN_TTL_SECS,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| anyhow!(e.to_string()))
    }
}
