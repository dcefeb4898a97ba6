//! [`Command`] for creating a new [`User`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::user::{AvatarUrl, Email, Name, Password, Phone};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// Name of the storage-level uniqueness constraint guarding [`Email`]s.
///
/// The pre-insert lookup below is not atomic under concurrent
/// registrations with the same [`Email`], so this constraint is the
/// actual safety net: its violation is translated into
/// [`ExecutionError::EmailOccupied`].
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

/// [`Command`] for creating a new [`User`].
#[derive(Clone, Debug)]
pub struct CreateUser {
    /// Display [`Name`] of a new [`User`].
    pub name: user::Name,

    /// [`Email`] of a new [`User`].
    pub email: user::Email,

    /// [`Phone`] of a new [`User`].
    pub phone: user::Phone,

    /// [`Password`] of a new [`User`].
    pub password: SecretBox<user::Password>,

    /// [`AvatarUrl`] of a new [`User`], if an image was supplied.
    pub avatar_url: Option<user::AvatarUrl>,
}

impl<Db> Command<CreateUser> for Service<Db>
where
    Db: for<'e> Database<
            Select<By<Option<User>, &'e user::Email>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Insert<User>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUser {
            name,
            email,
            phone,
            password,
            avatar_url,
        } = cmd;

        let u = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if u.is_some() {
            return Err(tracerr::new!(E::EmailOccupied(email)));
        }

        let user = User {
            id: user::Id::new(),
            name,
            email,
            phone,
            password_hash: user::PasswordHash::new(
                password.expose_secret(),
                self.config().password_cost,
            )
            .map_err(tracerr::from_and_wrap!(=> E))?,
            status: user::Status::Active,
            avatar_url,
            created_at: DateTime::now().coerce(),
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(user.clone()))
            .await
            .map(drop)
            .map_err(|e| {
                if e.as_ref()
                    .is_unique_violation(Some(EMAIL_UNIQUE_CONSTRAINT))
                {
                    tracerr::new!(E::EmailOccupied(user.email.clone()))
                } else {
                    tracerr::map_from_and_wrap!(=> E)(e)
                }
            })?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(user)
    }
}

/// Error of [`CreateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`user::Email`] is already occupied.
    #[display("`{_0}` email is occupied")]
    EmailOccupied(#[error(not(source))] user::Email),

    /// Hashing the [`Password`] failed.
    #[display("Failed to hash `Password`: {_0}")]
    #[from]
    HashPassword(bcrypt::BcryptError),
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

    use super::{CreateUser, ExecutionError};

    fn cmd(email: &str) -> CreateUser {
        CreateUser {
            name: user::Name::new("Ana").unwrap(),
            email: user::Email::new(email).unwrap(),
            phone: user::Phone::new("5550000123").unwrap(),
            password: SecretBox::new(Box::new(
                user::Password::new("secret1").unwrap(),
            )),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn creates_active_user_with_hashed_password() {
        let service = Service::new(Mock::config(), Mock::default());

        let user = service.execute(cmd("ana@x.com")).await.unwrap();

        assert_eq!(AsRef::<str>::as_ref(&user.email), "ana@x.com");
        assert_eq!(user.status, user::Status::Active);
        assert!(user
            .password_hash
            .verify(&user::Password::new("secret1").unwrap())
            .unwrap());
        assert!(!user
            .password_hash
            .verify(&user::Password::new("wrong").unwrap())
            .unwrap());
    }

    #[tokio::test]
    async fn rejects_occupied_email() {
        let service = Service::new(Mock::config(), Mock::default());

        drop(service.execute(cmd("ana@x.com")).await.unwrap());
        let err = service.execute(cmd("ana@x.com")).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::EmailOccupied(_)));
    }

    #[tokio::test]
    async fn occupied_email_check_is_case_insensitive() {
        let service = Service::new(Mock::config(), Mock::default());

        drop(service.execute(cmd("ana@x.com")).await.unwrap());
        let err = service.execute(cmd("ANA@X.COM")).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::EmailOccupied(_)));
    }
}
