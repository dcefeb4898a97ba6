//! Authenticated request context definitions.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use common::DateTime;
use service::{
    command::{self, Command as _},
    domain::user::{self, session},
};

use crate::{define_error, AsError, Error, Service};

/// Identity of the authenticated caller, resolved from the
/// `Authorization: Bearer` header of the current request.
///
/// Constructed at the start of a protected request and discarded at its
/// end; never persisted. Extraction rejects the request with a
/// 401-equivalent [`Error`] when the header is missing or the token does
/// not verify.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    /// ID of the authenticated [`User`].
    ///
    /// [`User`]: service::domain::User
    pub user_id: user::Id,

    /// Email claim of the presented token (not authoritative).
    pub email: String,

    /// Display name claim of the presented token (not authoritative).
    pub name: String,

    /// [`session::Token`] the caller presented.
    pub token: session::Token,

    /// [`DateTime`] when the presented token expires.
    pub expires_at: DateTime,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service =
            parts.extensions.get::<Service>().cloned().ok_or_else(|| {
                Error::internal(&"missing `Service` extension")
            })?;

        let res = parts.extract::<TypedHeader<Authorization<Bearer>>>().await;
        match res {
            Ok(TypedHeader(Authorization(bearer))) => {
                #[expect(unsafe_code, reason = "specified in correct header")]
                let token = unsafe {
                    session::Token::new_unchecked(bearer.token().to_owned())
                };
                service
                    .execute(command::AuthorizeUserSession {
                        token: token.clone(),
                    })
                    .await
                    .map(|s| Self {
                        user_id: s.user_id,
                        email: s.email,
                        name: s.name,
                        token,
                        expires_at: s.expires_at.coerce(),
                    })
                    .map_err(AsError::into_error)
            }
            Err(e) => {
                if e.is_missing() {
                    Err(AuthError::TokenRequired.into())
                } else {
                    Err(e.into_error())
                }
            }
        }
    }
}

impl AsError for command::authorize_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::JsonWebTokenDecodeError(_) => {
                Some(AuthError::InvalidToken.into())
            }
            Self::UserNotExists(_) => Some(AuthError::UserNotFound.into()),
            Self::AccountDisabled => Some(AuthError::AccountDisabled.into()),
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "TOKEN_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Token de acceso requerido"]
        TokenRequired,

        #[code = "INVALID_TOKEN"]
        #[status = UNAUTHORIZED]
        #[message = "Token inválido"]
        InvalidToken,

        #[code = "USER_NOT_FOUND"]
        #[status = UNAUTHORIZED]
        #[message = "Usuario no encontrado"]
        UserNotFound,

        #[code = "ACCOUNT_DISABLED"]
        #[status = UNAUTHORIZED]
        #[message = "Cuenta desactivada. Contacta al administrador"]
        AccountDisabled,
    }
}
