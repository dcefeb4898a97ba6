//! [`Command`] for creating a [`Session`].

use std::time::Duration;

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{session::Token, Email, Password};
use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a [`Session`].
#[derive(Clone, Debug, From)]
pub enum CreateUserSession {
    /// Create a new [`Session`] by [`User`] credentials.
    ByCredentials {
        /// [`Email`] of a [`User`].
        email: user::Email,

        /// [`Password`] of a [`User`].
        password: SecretBox<user::Password>,
    },

    /// Create a new [`Session`] by [`User`] ID.
    ///
    /// Used right after registration, where the [`User`] has just proven
    /// ownership of the credentials by creating them.
    ByUserId(user::Id),
}

impl CreateUserSession {
    /// [`Duration`] of [`Session`] expiration.
    ///
    /// Fixed lifetime, no refresh mechanism: an issued [`Token`] is
    /// trusted until it expires or the signing secret is rotated.
    const EXPIRATION_DURATION: Duration = Duration::from_secs(60 * 60);
}

/// Output of [`CreateUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Token`] of the created [`Session`].
    pub token: session::Token,

    /// [`User`] whose [`Session`] has been created.
    pub user: User,

    /// [`DateTime`] when the [`Session`] expires.
    pub expires_at: session::ExpirationDateTime,
}

impl<Db> Command<CreateUserSession> for Service<Db>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + for<'e> Database<
            Select<By<Option<User>, &'e user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use CreateUserSession as Cmd;
        use ExecutionError as E;

        let user = match cmd {
            Cmd::ByCredentials { email, password } => {
                let user = self
                    .database()
                    .execute(Select(By::new(&email)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::UnknownAccount)
                    .map_err(tracerr::wrap!())?;

                if user.status != user::Status::Active {
                    return Err(tracerr::new!(E::AccountDisabled));
                }

                let matches = user
                    .password_hash
                    .verify(password.expose_secret())
                    .map_err(tracerr::from_and_wrap!(=> E))?;
                if !matches {
                    return Err(tracerr::new!(E::WrongPassword));
                }

                user
            }
            Cmd::ByUserId(user_id) => {
                let user = self
                    .database()
                    .execute(Select(By::new(user_id)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?
                    .ok_or(E::UserNotExists(user_id))
                    .map_err(tracerr::wrap!())?;

                if user.status != user::Status::Active {
                    return Err(tracerr::new!(E::AccountDisabled));
                }

                user
            }
        };

        let issued_at = DateTime::now();
        let expires_at = (issued_at + Cmd::EXPIRATION_DURATION).coerce();
        let token = jsonwebtoken::encode::<Session>(
            &jsonwebtoken::Header::default(),
            &Session {
                user_id: user.id,
                email: user.email.to_string(),
                name: user.name.to_string(),
                issued_at: issued_at.coerce(),
                expires_at,
            },
            &self.config().jwt_encoding_key,
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        // SAFETY: `jsonwebtoken::encode` always returns a valid
        //         `session::Token`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        let token = unsafe { session::Token::new_unchecked(token) };

        Ok(Output {
            token,
            user,
            expires_at,
        })
    }
}

/// Error of [`CreateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`User`] account is not [`user::Status::Active`].
    #[display("`User` account is disabled")]
    AccountDisabled,

    /// Stored [`user::PasswordHash`] is malformed.
    #[display("{_0}")]
    CorruptedHash(user::IntegrityError),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// No [`User`] is registered with the provided [`user::Email`].
    #[display("No account with the provided email")]
    UnknownAccount,

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),

    /// Provided [`Password`] does not match the stored
    /// [`user::PasswordHash`].
    #[display("Wrong `User` password")]
    WrongPassword,
}

#[cfg(test)]
mod spec {
    use secrecy::SecretBox;

    use crate::{
        command::Command as _,
        domain::user,
        infra::database::mock::Mock,
        Service,
    };

    use super::{CreateUserSession, ExecutionError};

    fn credentials(email: &str, password: &str) -> CreateUserSession {
        CreateUserSession::ByCredentials {
            email: user::Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(
                user::Password::new(password).unwrap(),
            )),
        }
    }

    #[tokio::test]
    async fn issues_token_for_valid_credentials() {
        let db = Mock::default();
        let user = db.add_user("ana@x.com", "secret1", user::Status::Active);
        let service = Service::new(Mock::config(), db);

        let out = service
            .execute(credentials("ana@x.com", "secret1"))
            .await
            .unwrap();

        assert_eq!(out.user.id, user.id);
        assert!(!out.token.as_ref().is_empty());
        assert!(out.expires_at.coerce() > common::DateTime::now());
    }

    #[tokio::test]
    async fn unknown_email_is_unknown_account() {
        let service = Service::new(Mock::config(), Mock::default());

        let err = service
            .execute(credentials("ghost@x.com", "secret1"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UnknownAccount));
    }

    #[tokio::test]
    async fn wrong_password_is_not_unknown_account() {
        let db = Mock::default();
        drop(db.add_user("ana@x.com", "secret1", user::Status::Active));
        let service = Service::new(Mock::config(), db);

        let err = service
            .execute(credentials("ana@x.com", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::WrongPassword));
    }

    #[tokio::test]
    async fn disabled_account_is_rejected_before_password_check() {
        let db = Mock::default();
        drop(db.add_user("ana@x.com", "secret1", user::Status::Disabled));
        let service = Service::new(Mock::config(), db);

        let err = service
            .execute(credentials("ana@x.com", "secret1"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AccountDisabled));
    }

    #[tokio::test]
    async fn by_user_id_issues_token_for_existing_user() {
        let db = Mock::default();
        let user = db.add_user("ana@x.com", "secret1", user::Status::Active);
        let service = Service::new(Mock::config(), db);

        let out = service
            .execute(CreateUserSession::ByUserId(user.id))
            .await
            .unwrap();

        assert_eq!(out.user.id, user.id);
    }

    #[tokio::test]
    async fn by_user_id_rejects_missing_user() {
        let service = Service::new(Mock::config(), Mock::default());

        let err = service
            .execute(CreateUserSession::ByUserId(user::Id::new()))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UserNotExists(_)));
    }

    #[tokio::test]
    async fn corrupted_stored_hash_is_integrity_error() {
        let db = Mock::default();
        db.add_user_with_corrupted_hash("ana@x.com");
        let service = Service::new(Mock::config(), db);

        let err = service
            .execute(credentials("ana@x.com", "secret1"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::CorruptedHash(_)));
    }
}
