use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use salvo::Handler;
use salvo::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::{
    entities::{models::ParticipantRole, principal::Principal},
    env::app_env::JwtConfig,
    types::errors::{ErrorKind, auth_error::AuthError, render_error},
};

/// Claims of the bearer token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
}

/// Claims of a room-scoped capability token minted on a successful join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomTokenClaims {
    pub user_id: i32,
    pub room_id: i32,
    pub username: String,
    pub role: ParticipantRole,
    pub exp: i64,
}

impl RoomTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp <= OffsetDateTime::now_utc().unix_timestamp()
    }

    /// Fails with an integrity error unless the token was minted for `room_id`.
    pub fn ensure_room(&self, room_id: i32) -> Result<(), AuthError> {
        if self.room_id != room_id {
            return Err(AuthError::RoomMismatch {
                token_room: self.room_id,
                requested_room: room_id,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct JwtUtils {
    secret_key: String,
    room_secret_key: String,
    room_token_duration: time::Duration,
}

impl JwtUtils {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            secret_key: config.jwt_token.clone(),
            room_secret_key: config.room_token.clone(),
            room_token_duration: time::Duration::seconds(config.room_token_expires_in_seconds),
        }
    }

    pub fn decode_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let token_data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.secret_key.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn decode_principal(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.decode_token(token)?;
        let user_id = claims
            .id
            .parse::<i32>()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(Principal::new(user_id, &claims.username, claims.roles.as_slice()))
    }

    /// Returns the signed token and its expiry as a unix timestamp.
    pub fn generate_room_token(
        &self,
        user_id: i32,
        room_id: i32,
        username: &str,
        role: ParticipantRole,
    ) -> Result<(String, i64), AuthError> {
        let exp = (OffsetDateTime::now_utc() + self.room_token_duration).unix_timestamp();

        let claims = RoomTokenClaims {
            user_id,
            room_id,
            username: username.to_owned(),
            role,
            exp,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.room_secret_key.as_bytes()),
        )
        .map_err(|_| AuthError::TokenIssueFailed)?;

        Ok((token, exp))
    }

    pub fn decode_room_token(&self, token: &str) -> Result<RoomTokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<RoomTokenClaims>(
            token,
            &DecodingKey::from_secret(self.room_secret_key.as_bytes()),
            &validation,
        )?;
        Ok(token_data.claims)
    }

    pub fn auth_middleware(&self) -> impl Handler {
        #[handler]
        async fn middleware(
            req: &mut Request,
            depot: &mut Depot,
            res: &mut Response,
            ctrl: &mut FlowCtrl,
        ) {
            let Ok(jwt_utils) = depot.obtain::<JwtUtils>() else {
                ctrl.skip_rest();
                return render_error(
                    res,
                    ErrorKind::Internal.status_code(),
                    "An unexpected error occurred".to_string(),
                );
            };

            let token = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(|h| h.trim_start_matches("Bearer ").trim());

            let principal = match token {
                Some(token) if !token.is_empty() => jwt_utils.decode_principal(token),
                _ => Err(AuthError::MissingToken),
            };

            match principal {
                Ok(principal) => {
                    depot.inject(principal);
                }
                Err(err) => {
                    ctrl.skip_rest();
                    render_error(res, err.kind().status_code(), err.to_string());
                }
            }
        }
        middleware
    }
}

/// The principal placed in the depot by [`JwtUtils::auth_middleware`].
pub fn current_principal(depot: &Depot) -> Result<Principal, AuthError> {
    depot
        .obtain::<Principal>()
        .cloned()
        .map_err(|_| AuthError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::identity_token;

    fn jwt_utils(room_token_ttl: i64) -> JwtUtils {
        JwtUtils::new(&JwtConfig {
            jwt_token: "test-identity-secret".to_string(),
            room_token: "room-secret".to_string(),
            room_token_expires_in_seconds: room_token_ttl,
        })
    }

    #[test]
    fn room_token_carries_its_scope() {
        let jwt = jwt_utils(300);
        let (token, exp) = jwt
            .generate_room_token(7, 42, "kai", ParticipantRole::Moderator)
            .unwrap();

        let claims = jwt.decode_room_token(&token).unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.room_id, 42);
        assert_eq!(claims.role, ParticipantRole::Moderator);
        assert_eq!(claims.exp, exp);
        assert!(claims.ensure_room(42).is_ok());
        assert!(matches!(
            claims.ensure_room(43),
            Err(AuthError::RoomMismatch {
                token_room: 42,
                requested_room: 43
            })
        ));
    }

    #[test]
    fn expired_room_token_is_rejected() {
        let jwt = jwt_utils(-10);
        let (token, _) = jwt
            .generate_room_token(7, 42, "kai", ParticipantRole::Participant)
            .unwrap();

        assert_eq!(jwt.decode_room_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn identity_and_room_tokens_are_not_interchangeable() {
        let jwt = jwt_utils(300);
        let identity = identity_token(7, "kai", &["teacher"]);
        let (room, _) = jwt
            .generate_room_token(7, 42, "kai", ParticipantRole::Participant)
            .unwrap();

        assert_eq!(jwt.decode_room_token(&identity), Err(AuthError::InvalidToken));
        assert_eq!(jwt.decode_token(&room).err(), Some(AuthError::InvalidToken));
    }

    #[test]
    fn identity_token_yields_principal() {
        let jwt = jwt_utils(300);
        let token = identity_token(7, "kai", &["Admin"]);

        let principal = jwt.decode_principal(&token).unwrap();

        assert_eq!(principal.user_id, 7);
        assert_eq!(principal.username, "kai");
        assert!(principal.has(crate::core::entities::principal::Capability::ManageRooms));
    }
}
