//! REST API endpoints for registration, login and token verification.

use axum::{
    response::{IntoResponse as _, Response},
    Extension, Json,
};
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{user, User},
    query,
};

use crate::{
    context::{AuthError, CurrentUser},
    define_error, AsError, Error, Service,
};

use super::Envelope;

/// `POST /api/auth/register` request body.
///
/// All fields are declared optional so that a missing one is reported with
/// the required-fields message instead of a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Display name of the new account.
    #[serde(rename = "nombre")]
    pub name: Option<String>,

    /// Email of the new account.
    pub email: Option<String>,

    /// Phone number of the new account.
    #[serde(rename = "telefono")]
    pub phone: Option<String>,

    /// Plaintext password of the new account.
    pub password: Option<String>,

    /// URL of the profile image, if one was uploaded.
    #[serde(rename = "foto_perfil")]
    pub avatar_url: Option<String>,
}

impl RegisterRequest {
    /// Validates this [`RegisterRequest`] into a [`command::CreateUser`].
    ///
    /// An invalid `avatar_url` is dropped rather than rejected: the image
    /// is decorative and optional.
    fn into_command(self) -> Result<command::CreateUser, Error> {
        let Self {
            name,
            email,
            phone,
            password,
            avatar_url,
        } = self;

        let (Some(name), Some(email), Some(phone), Some(password)) =
            (name, email, phone, password)
        else {
            return Err(ValidationError::FieldsRequired.into());
        };
        let name = user::Name::new(name)
            .ok_or(ValidationError::FieldsRequired)?;
        let phone = user::Phone::new(phone)
            .ok_or(ValidationError::FieldsRequired)?;
        let password = user::Password::new(password)
            .ok_or(ValidationError::FieldsRequired)?;
        if email.is_empty() {
            return Err(ValidationError::FieldsRequired.into());
        }
        let email =
            user::Email::new(email).ok_or(ValidationError::EmailFormat)?;

        Ok(command::CreateUser {
            name,
            email,
            phone,
            password: SecretBox::new(Box::new(password)),
            avatar_url: avatar_url.and_then(user::AvatarUrl::new),
        })
    }
}

/// `POST /api/auth/login` request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email of the account.
    pub email: Option<String>,

    /// Plaintext password of the account.
    pub password: Option<String>,
}

impl LoginRequest {
    /// Validates this [`LoginRequest`] into a [`command::CreateUserSession`].
    ///
    /// An email that cannot belong to any registered account, or a password
    /// no account could have been created with, short-circuit to the same
    /// errors a lookup would have produced.
    fn into_command(self) -> Result<command::CreateUserSession, Error> {
        let Self { email, password } = self;

        let (Some(email), Some(password)) = (email, password) else {
            return Err(ValidationError::CredentialsRequired.into());
        };
        if email.is_empty() || password.is_empty() {
            return Err(ValidationError::CredentialsRequired.into());
        }
        let email =
            user::Email::new(email).ok_or(LoginError::UnknownAccount)?;
        let password =
            user::Password::new(password).ok_or(LoginError::WrongPassword)?;

        Ok(command::CreateUserSession::ByCredentials {
            email,
            password: SecretBox::new(Box::new(password)),
        })
    }
}

/// [`User`] representation of the REST API.
#[derive(Debug, Serialize)]
pub struct UserBody {
    /// ID of the [`User`].
    pub id: user::Id,

    /// Display name of the [`User`].
    #[serde(rename = "nombre")]
    pub name: String,

    /// Email of the [`User`].
    pub email: String,

    /// Phone number of the [`User`].
    #[serde(rename = "telefono")]
    pub phone: String,

    /// Status of the [`User`] account.
    #[serde(rename = "estado")]
    pub status: &'static str,

    /// URL of the [`User`]'s profile image, if any.
    #[serde(rename = "foto_perfil", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// [RFC 3339] timestamp of when the [`User`] was created.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    #[serde(rename = "creadoEn")]
    pub created_at: String,
}

impl From<&User> for UserBody {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.to_string(),
            email: user.email.to_string(),
            phone: user.phone.to_string(),
            status: match user.status {
                user::Status::Active => "active",
                user::Status::Disabled => "disabled",
            },
            avatar_url: user.avatar_url.as_ref().map(ToString::to_string),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Payload of a successful registration or login.
#[derive(Debug, Serialize)]
pub struct SessionBody {
    /// [`User`] the session belongs to.
    pub user: UserBody,

    /// Issued access token.
    pub token: String,
}

impl From<&command::create_user_session::Output> for SessionBody {
    fn from(out: &command::create_user_session::Output) -> Self {
        Self {
            user: UserBody::from(&out.user),
            token: out.token.to_string(),
        }
    }
}

/// Payload of a successful token verification.
#[derive(Debug, Serialize)]
pub struct VerifyBody {
    /// [`User`] the verified token belongs to.
    pub user: UserBody,
}

/// `POST /api/auth/register` handler.
///
/// Registers a new [`User`] and immediately issues a session token for it,
/// so a freshly registered client is logged in without a second request.
///
/// # Errors
///
/// - 400 with [`ValidationError`] if the body is malformed.
/// - 409 with [`RegisterError::EmailOccupied`] if the email is taken.
/// - 500 otherwise.
pub async fn register(
    Extension(service): Extension<Service>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, Error> {
    let cmd = req.into_command()?;
    let user = service.execute(cmd).await.map_err(AsError::into_error)?;
    let session = service
        .execute(command::CreateUserSession::ByUserId(user.id))
        .await
        .map_err(AsError::into_error)?;

    Ok((
        http::StatusCode::CREATED,
        Json(Envelope::with_message(
            "Usuario registrado exitosamente",
            SessionBody::from(&session),
        )),
    )
        .into_response())
}

/// `POST /api/auth/login` handler.
///
/// # Errors
///
/// - 400 with [`ValidationError::CredentialsRequired`] if a credential is
///   missing.
/// - 401 with [`LoginError`] if the credentials do not authenticate.
/// - 500 otherwise.
pub async fn login(
    Extension(service): Extension<Service>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, Error> {
    let cmd = req.into_command()?;
    let session = service.execute(cmd).await.map_err(AsError::into_error)?;

    Ok((
        http::StatusCode::OK,
        Json(Envelope::with_message(
            "Login exitoso",
            SessionBody::from(&session),
        )),
    )
        .into_response())
}

/// `GET /api/auth/verify` handler.
///
/// The token itself is verified by the [`CurrentUser`] extractor; this
/// handler additionally re-queries the [`User`] record so the client
/// receives its current state rather than the claims frozen at issuance.
///
/// # Errors
///
/// - 401 with [`AuthError`] if the token is missing, invalid, or the
///   [`User`] no longer exists.
/// - 500 otherwise.
pub async fn verify(
    Extension(service): Extension<Service>,
    current: CurrentUser,
) -> Result<Response, Error> {
    let user = service
        .execute(query::user::ById::by(current.user_id))
        .await
        .map_err(AsError::into_error)?
        .ok_or(AuthError::UserNotFound)?;

    Ok((
        http::StatusCode::OK,
        Json(Envelope::new(VerifyBody {
            user: UserBody::from(&user),
        })),
    )
        .into_response())
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::create_user::ExecutionError as E;

        match self {
            E::Db(e) => e.try_as_error(),
            E::EmailOccupied(_) => Some(RegisterError::EmailOccupied.into()),
            E::HashPassword(_) => None,
        }
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use command::create_user_session::ExecutionError as E;

        match self {
            E::AccountDisabled => Some(LoginError::AccountDisabled.into()),
            E::Db(e) => e.try_as_error(),
            E::UnknownAccount => Some(LoginError::UnknownAccount.into()),
            E::WrongPassword => Some(LoginError::WrongPassword.into()),
            E::CorruptedHash(_)
            | E::JsonWebTokenEncodeError(_)
            | E::UserNotExists(_) => None,
        }
    }
}

define_error! {
    enum ValidationError {
        #[code = "FIELDS_REQUIRED"]
        #[status = BAD_REQUEST]
        #[message = "Todos los campos son requeridos"]
        FieldsRequired,

        #[code = "EMAIL_FORMAT"]
        #[status = BAD_REQUEST]
        #[message = "El formato del email no es válido"]
        EmailFormat,

        #[code = "CREDENTIALS_REQUIRED"]
        #[status = BAD_REQUEST]
        #[message = "Email y contraseña son requeridos"]
        CredentialsRequired,
    }
}

define_error! {
    enum RegisterError {
        #[code = "EMAIL_OCCUPIED"]
        #[status = CONFLICT]
        #[message = "El email ya está registrado"]
        EmailOccupied,
    }
}

define_error! {
    enum LoginError {
        #[code = "UNKNOWN_ACCOUNT"]
        #[status = UNAUTHORIZED]
        #[message = "No existe una cuenta con este email"]
        UnknownAccount,

        #[code = "WRONG_PASSWORD"]
        #[status = UNAUTHORIZED]
        #[message = "Contraseña incorrecta"]
        WrongPassword,

        #[code = "ACCOUNT_DISABLED"]
        #[status = UNAUTHORIZED]
        #[message = "Cuenta desactivada. Contacta al administrador"]
        AccountDisabled,
    }
}

#[cfg(test)]
mod spec {
    use common::DateTime;
    use service::{
        command::create_user_session,
        domain::{user, User},
    };

    use super::{
        Envelope, LoginRequest, RegisterRequest, SessionBody, UserBody,
    };

    fn sample_user() -> User {
        User {
            id: user::Id::new(),
            name: user::Name::new("Ana").unwrap(),
            email: user::Email::new("ana@x.com").unwrap(),
            phone: user::Phone::new("5550000").unwrap(),
            password_hash: user::PasswordHash::new(
                &user::Password::new("secret1").unwrap(),
                4,
            )
            .unwrap(),
            status: user::Status::Active,
            avatar_url: None,
            created_at: DateTime::from_unix_timestamp(1_700_000_000)
                .unwrap()
                .coerce(),
        }
    }

    #[test]
    fn register_request_requires_all_fields() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "nombre": "Ana",
            "email": "ana@x.com",
        }))
        .unwrap();

        let err = req.into_command().unwrap_err();

        assert_eq!(err.message, "Todos los campos son requeridos");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn register_request_rejects_malformed_email() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "nombre": "Ana",
            "email": "not-an-email",
            "telefono": "5550000",
            "password": "secret1",
        }))
        .unwrap();

        let err = req.into_command().unwrap_err();

        assert_eq!(err.message, "El formato del email no es válido");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn register_request_accepts_valid_body() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "nombre": "Ana",
            "email": "ana@x.com",
            "telefono": "5550000",
            "password": "secret1",
            "foto_perfil": "https://cdn.example.org/ana.png",
        }))
        .unwrap();

        let cmd = req.into_command().unwrap();

        assert_eq!(AsRef::<str>::as_ref(&cmd.email), "ana@x.com");
        assert_eq!(
            AsRef::<str>::as_ref(&cmd.avatar_url.unwrap()),
            "https://cdn.example.org/ana.png",
        );
    }

    #[test]
    fn register_request_accepts_freeform_phone_and_short_password() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "nombre": "Ana ",
            "email": "ana@x.com",
            "telefono": "casa-555",
            "password": "a",
        }))
        .unwrap();

        let cmd = req.into_command().unwrap();

        assert_eq!(AsRef::<str>::as_ref(&cmd.phone), "casa-555");
    }

    #[test]
    fn login_request_requires_credentials() {
        let req: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "ana@x.com",
        }))
        .unwrap();

        let err = req.into_command().unwrap_err();

        assert_eq!(err.message, "Email y contraseña son requeridos");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn user_body_uses_wire_field_names() {
        let user = sample_user();
        let body = serde_json::to_value(UserBody::from(&user)).unwrap();

        assert_eq!(body["nombre"], "Ana");
        assert_eq!(body["email"], "ana@x.com");
        assert_eq!(body["telefono"], "5550000");
        assert_eq!(body["estado"], "active");
        assert_eq!(body["creadoEn"], "2023-11-14T22:13:20Z");
        assert!(body.get("foto_perfil").is_none());
    }

    #[test]
    fn session_envelope_carries_user_and_token() {
        let user = sample_user();
        #[expect(unsafe_code, reason = "opaque in this assertion")]
        let token = unsafe {
            user::session::Token::new_unchecked("a.b.c".to_owned())
        };
        let out = create_user_session::Output {
            token,
            user,
            expires_at: DateTime::from_unix_timestamp(1_700_003_600)
                .unwrap()
                .coerce(),
        };

        let envelope = serde_json::to_value(Envelope::with_message(
            "Login exitoso",
            SessionBody::from(&out),
        ))
        .unwrap();

        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["message"], "Login exitoso");
        assert_eq!(envelope["data"]["token"], "a.b.c");
        assert_eq!(envelope["data"]["user"]["estado"], "active");
    }
}
