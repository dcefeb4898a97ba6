//! In-memory [`Database`] used by tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use common::{
    operations::{By, Commit, Insert, Select, Transact},
    DateTime,
};
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{database, Database},
    Config,
};

/// In-memory [`Database`] mirroring the case-insensitive email collation
/// of the real storage.
#[derive(Clone, Debug, Default)]
pub(crate) struct Mock {
    /// Stored [`User`]s.
    users: Arc<Mutex<HashMap<user::Id, User>>>,
}

impl Mock {
    /// Lowest cost factor bcrypt accepts, keeping test hashing fast.
    pub(crate) const PASSWORD_COST: u32 = 4;

    /// Returns a [`Config`] suitable for tests.
    pub(crate) fn config() -> Config {
        Config {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                b"test-secret",
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                b"test-secret",
            ),
            password_cost: Self::PASSWORD_COST,
            recheck_user_status: false,
        }
    }

    /// Stores a new [`User`] with the provided credentials.
    pub(crate) fn add_user(
        &self,
        email: &str,
        password: &str,
        status: user::Status,
    ) -> User {
        let user = User {
            id: user::Id::new(),
            name: user::Name::new("Ana").unwrap(),
            email: user::Email::new(email).unwrap(),
            phone: user::Phone::new("5550000123").unwrap(),
            password_hash: user::PasswordHash::new(
                &user::Password::new(password).unwrap(),
                Self::PASSWORD_COST,
            )
            .unwrap(),
            status,
            avatar_url: None,
            created_at: DateTime::now().coerce(),
        };
        drop(self.users.lock().unwrap().insert(user.id, user.clone()));
        user
    }

    /// Stores a new active [`User`] whose stored hash is not a valid
    /// bcrypt hash.
    pub(crate) fn add_user_with_corrupted_hash(&self, email: &str) {
        let mut user =
            self.add_user(email, "irrelevant", user::Status::Active);
        #[expect(unsafe_code, reason = "intentionally malformed")]
        let corrupted =
            unsafe { user::PasswordHash::new_unchecked("not-a-bcrypt-hash") };
        user.password_hash = corrupted;
        drop(self.users.lock().unwrap().insert(user.id, user));
    }

    /// Removes the [`User`] with the provided ID.
    pub(crate) fn remove_user(&self, id: user::Id) {
        drop(self.users.lock().unwrap().remove(&id));
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Mock {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.users.lock().unwrap().get(&by.into_inner()).cloned())
    }
}

impl<'e> Database<Select<By<Option<User>, &'e user::Email>>> for Mock {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &'e user::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email: &str = by.into_inner().as_ref();
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| {
                AsRef::<str>::as_ref(&u.email).eq_ignore_ascii_case(email)
            })
            .cloned())
    }
}

impl Database<Insert<User>> for Mock {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.users.lock().unwrap().insert(user.id, user));
        Ok(())
    }
}

impl Database<Transact> for Mock {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Mock {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}
