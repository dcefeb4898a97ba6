//! [`Command`] for authorizing a [`User`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`User`].
///
/// Decoding applies the default [`Validation`] of [`jsonwebtoken`], which
/// tolerates up to 60 seconds of clock skew on the expiration claim.
///
/// By default this [`Command`] performs no [`Database`] access: an issued
/// token is trusted until its expiration. With
/// [`Config::recheck_user_status`] enabled, the [`User`]'s existence and
/// [`Status`] are re-checked on every authorization instead.
///
/// [`Config::recheck_user_status`]: crate::Config::recheck_user_status
/// [`Status`]: user::Status
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

impl<Db> Command<AuthorizeUserSession> for Service<Db>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config().jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        if self.config().recheck_user_status {
            let user = self
                .database()
                .execute(Select(By::new(session.user_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::UserNotExists(session.user_id))
                .map_err(tracerr::wrap!())?;
            if user.status != user::Status::Active {
                return Err(tracerr::new!(E::AccountDisabled));
            }
        }

        Ok(session)
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`User`] account is disabled.
    #[display("`User` account is disabled")]
    AccountDisabled,

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`User`] the [`Session`] belongs to does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::DateTime;

    use crate::{
        command::{Command as _, CreateUserSession},
        domain::{
            user::{self, session, Session},
            User,
        },
        infra::database::mock::Mock,
        Service,
    };

    use super::{AuthorizeUserSession, ExecutionError};

    fn token_of(user: &User, expires_in: i64) -> session::Token {
        let now = DateTime::now();
        let expires_at = if expires_in >= 0 {
            now + Duration::from_secs(expires_in.unsigned_abs())
        } else {
            now - Duration::from_secs(expires_in.unsigned_abs())
        };
        let raw = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Session {
                user_id: user.id,
                email: user.email.to_string(),
                name: user.name.to_string(),
                issued_at: now.coerce(),
                expires_at: expires_at.coerce(),
            },
            &Mock::config().jwt_encoding_key,
        )
        .unwrap();
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn accepts_freshly_issued_token() {
        let db = Mock::default();
        let user = db.add_user("ana@x.com", "secret1", user::Status::Active);
        let service = Service::new(Mock::config(), db);

        let issued = service
            .execute(CreateUserSession::ByUserId(user.id))
            .await
            .unwrap();
        let session = service
            .execute(AuthorizeUserSession {
                token: issued.token,
            })
            .await
            .unwrap();

        assert_eq!(session.user_id, user.id);
        assert_eq!(session.email, "ana@x.com");
    }

    #[tokio::test]
    async fn rejects_tampered_token() {
        let db = Mock::default();
        let user = db.add_user("ana@x.com", "secret1", user::Status::Active);
        let service = Service::new(Mock::config(), db);

        let token = token_of(&user, 3600).to_string();
        let (head, rest) = token.split_once('.').unwrap();
        let (payload, signature) = rest.split_once('.').unwrap();
        let mut altered = payload.to_owned();
        // Flip a single byte of the payload.
        let flipped = if altered.remove(0) == 'A' { 'B' } else { 'A' };
        altered.insert(0, flipped);
        let tampered: session::Token =
            format!("{head}.{altered}.{signature}").parse().unwrap();

        let err = service
            .execute(AuthorizeUserSession { token: tampered })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let db = Mock::default();
        let user = db.add_user("ana@x.com", "secret1", user::Status::Active);
        let service = Service::new(Mock::config(), db);

        // Beyond the 60-second decoding leeway.
        let expired = token_of(&user, -120);

        let err = service
            .execute(AuthorizeUserSession { token: expired })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }

    #[tokio::test]
    async fn trusts_token_of_disabled_user_by_default() {
        let db = Mock::default();
        let user = db.add_user("ana@x.com", "secret1", user::Status::Disabled);
        let service = Service::new(Mock::config(), db);

        let session = service
            .execute(AuthorizeUserSession {
                token: token_of(&user, 3600),
            })
            .await
            .unwrap();

        assert_eq!(session.user_id, user.id);
    }

    #[tokio::test]
    async fn recheck_mode_rejects_disabled_user() {
        let db = Mock::default();
        let user = db.add_user("ana@x.com", "secret1", user::Status::Disabled);
        let mut config = Mock::config();
        config.recheck_user_status = true;
        let service = Service::new(config, db);

        let err = service
            .execute(AuthorizeUserSession {
                token: token_of(&user, 3600),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AccountDisabled));
    }

    #[tokio::test]
    async fn recheck_mode_rejects_missing_user() {
        let db = Mock::default();
        let user = db.add_user("ana@x.com", "secret1", user::Status::Active);
        let token = token_of(&user, 3600);
        db.remove_user(user.id);
        let mut config = Mock::config();
        config.recheck_user_status = true;
        let service = Service::new(config, db);

        let err = service
            .execute(AuthorizeUserSession { token })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UserNotExists(_)));
    }
}
